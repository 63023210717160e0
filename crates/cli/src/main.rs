//! House Price Predictor CLI
//!
//! A command-line tool for querying predictions, managing the served model
//! and training bundles offline.

mod client;
mod commands;
mod config;
mod output;
mod tools;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{local, model, predict};
use price_lib::{FeatureMap, ModelKind, TrainOptions};
use std::path::PathBuf;

/// House Price Predictor CLI
#[derive(Parser)]
#[command(name = "hpp")]
#[command(author, version, about = "CLI for the House Price Predictor", long_about = None)]
pub struct Cli {
    /// API endpoint URL (also HPP_API_URL, then ~/.config/hpp/config.json)
    #[arg(long, env = "HPP_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict the price of one house
    Predict(PredictArgs),

    /// Predict prices for every row of a JSON or CSV file
    PredictBulk {
        /// Path to a .json (array or {"data": [...]}) or .csv file
        file: PathBuf,
    },

    /// Show the served model's features and metrics
    Info,

    /// Train a new model on the server's base dataset
    Train {
        /// Model type (random_forest or linear)
        #[arg(long)]
        model_type: Option<ModelKind>,
    },

    /// Upload a CSV with a `target` column and retrain on base plus upload
    Retrain {
        /// CSV file to upload
        file: PathBuf,

        /// Model type (random_forest or linear)
        #[arg(long)]
        model_type: Option<ModelKind>,
    },

    /// Predict the average home price some years from now
    Trend {
        /// Years in the future
        #[arg(allow_hyphen_values = true)]
        years: i64,
    },

    /// Check server health
    Health,

    /// Plain-text tool answers for chat front ends
    #[command(subcommand)]
    Tool(ToolCommands),

    /// Save the API URL or default output format to ~/.config/hpp/config.json
    Configure {
        /// API URL to store
        #[arg(long = "set-api-url")]
        set_api_url: Option<String>,

        /// Default output format to store (table or json)
        #[arg(long = "set-format")]
        set_format: Option<output::OutputFormat>,
    },

    /// Train locally and write the bundle to a models directory
    TrainLocal {
        /// Training CSV with a `target` column
        #[arg(long)]
        data: PathBuf,

        /// Models directory to save into
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,

        /// Model type (random_forest or linear)
        #[arg(long, default_value_t = ModelKind::RandomForest)]
        model_type: ModelKind,

        /// Number of trees for random forests
        #[arg(long, default_value_t = price_lib::predictor::DEFAULT_N_ESTIMATORS)]
        n_estimators: usize,
    },
}

#[derive(Subcommand)]
pub enum ToolCommands {
    /// Describe the predicted price for one house
    PredictHousingPrice(PredictArgs),

    /// Describe the average home price some years from now
    PredictFutureHomePrice {
        #[arg(allow_hyphen_values = true)]
        years: i64,
    },

    /// Summarize the served model
    ModelInfo,
}

#[derive(clap::Args)]
pub struct PredictArgs {
    /// Median income in the block group (tens of thousands of dollars)
    #[arg(long, default_value_t = 3.0, allow_hyphen_values = true)]
    pub med_inc: f64,

    /// Median house age in years
    #[arg(long, default_value_t = 20.0, allow_hyphen_values = true)]
    pub house_age: f64,

    /// Average rooms per household
    #[arg(long, default_value_t = 5.0, allow_hyphen_values = true)]
    pub ave_rooms: f64,

    /// Average bedrooms per household
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    pub ave_bedrms: f64,

    /// Block group population
    #[arg(long, default_value_t = 1000.0, allow_hyphen_values = true)]
    pub population: f64,

    /// Average household members
    #[arg(long, default_value_t = 3.0, allow_hyphen_values = true)]
    pub ave_occup: f64,

    #[arg(long, default_value_t = 34.0, allow_hyphen_values = true)]
    pub latitude: f64,

    #[arg(long, default_value_t = -118.0, allow_hyphen_values = true)]
    pub longitude: f64,

    /// Extra or overriding feature as NAME=VALUE (repeatable)
    #[arg(long = "feature", value_parser = predict::parse_feature)]
    pub features: Vec<(String, f64)>,
}

impl PredictArgs {
    fn into_features(self) -> FeatureMap {
        let housing = tools::HousingFeatures {
            med_inc: self.med_inc,
            house_age: self.house_age,
            ave_rooms: self.ave_rooms,
            ave_bedrms: self.ave_bedrms,
            population: self.population,
            ave_occup: self.ave_occup,
            latitude: self.latitude,
            longitude: self.longitude,
        };
        let mut features = housing.to_feature_map();
        features.extend(self.features);
        features
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let format = cli
        .format
        .or_else(|| config.default_format.as_deref().and_then(output::OutputFormat::parse_name))
        .unwrap_or_default();

    let api_url = config.resolve_api_url(cli.api_url);
    let connect = || client::ApiClient::new(&api_url);

    match cli.command {
        Commands::Predict(args) => predict::predict(&connect()?, args.into_features(), format).await?,
        Commands::PredictBulk { file } => predict::predict_bulk(&connect()?, &file, format).await?,
        Commands::Info => model::info(&connect()?, format).await?,
        Commands::Train { model_type } => model::train(&connect()?, model_type, format).await?,
        Commands::Retrain { file, model_type } => {
            model::retrain(&connect()?, &file, model_type, format).await?
        }
        Commands::Trend { years } => predict::trend(&connect()?, years, format).await?,
        Commands::Health => model::health(&connect()?, format).await?,
        Commands::Tool(tool) => {
            let client = connect()?;
            let answer = match tool {
                ToolCommands::PredictHousingPrice(args) => {
                    tools::predict_housing_price(&client, &args.into_features()).await
                }
                ToolCommands::PredictFutureHomePrice { years } => {
                    tools::predict_future_home_price(&client, years).await
                }
                ToolCommands::ModelInfo => tools::get_model_info(&client).await,
            };
            println!("{}", answer.trim_end());
        }
        Commands::Configure {
            set_api_url,
            set_format,
        } => configure(config, set_api_url, set_format)?,
        Commands::TrainLocal {
            data,
            models_dir,
            model_type,
            n_estimators,
        } => {
            let options = TrainOptions {
                model_kind: model_type,
                n_estimators,
                ..TrainOptions::default()
            };
            local::run(data, models_dir, options, format).await?
        }
    }

    Ok(())
}

fn configure(
    mut config: config::Config,
    api_url: Option<String>,
    format: Option<output::OutputFormat>,
) -> Result<()> {
    let path = config::Config::config_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    if let Some(url) = api_url {
        url::Url::parse(&url).with_context(|| format!("Invalid API URL '{}'", url))?;
        config.api_url = Some(url);
    }
    if let Some(format) = format {
        config.default_format = Some(format!("{:?}", format).to_lowercase());
    }
    config.save_to(&path)?;
    output::print_success(&format!("Saved configuration to {}", path.display()));
    Ok(())
}
