//! Toy price trend model
//!
//! A linear fit of average home price against years from now, trained on
//! synthetic data: a base price, a fixed yearly increase and seeded Gaussian
//! noise. Used for quick demos that do not need a trained housing bundle.

use super::{LinearRegression, Regressor};
use crate::error::Result;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub const BASE_PRICE: f64 = 300_000.0;
pub const YEARLY_INCREASE: f64 = 15_000.0;
const NOISE_STD: f64 = 5_000.0;
const SYNTHETIC_YEARS: usize = 11;
const SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPrediction {
    pub years_from_now: i64,
    pub predicted_price: f64,
}

#[derive(Debug, Clone)]
pub struct PriceTrendModel {
    model: LinearRegression,
}

impl PriceTrendModel {
    /// Fit on the synthetic series for years 0 through 10
    pub fn train() -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(SEED);
        let x = Array2::from_shape_fn((SYNTHETIC_YEARS, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..SYNTHETIC_YEARS)
            .map(|year| BASE_PRICE + year as f64 * YEARLY_INCREASE + gaussian(&mut rng) * NOISE_STD)
            .collect();

        let mut model = LinearRegression::new();
        model.fit(x.view(), y.view())?;
        Ok(Self { model })
    }

    /// Wrap existing parameters
    pub fn from_model(model: LinearRegression) -> Self {
        Self { model }
    }

    /// Predicted average price; negative horizons are treated as today
    pub fn predict(&self, years_from_now: i64) -> TrendPrediction {
        let years = years_from_now.max(0) as f64;
        let price = self.model.intercept()
            + self.model.coefficients().first().copied().unwrap_or(0.0) * years;
        TrendPrediction {
            years_from_now,
            predicted_price: (price * 100.0).round() / 100.0,
        }
    }

    pub fn yearly_increase(&self) -> f64 {
        self.model.coefficients().first().copied().unwrap_or(0.0)
    }
}

/// Standard normal sample via Box-Muller
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
