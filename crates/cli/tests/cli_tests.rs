//! CLI integration tests

use std::process::Command;
use tempfile::TempDir;

fn hpp() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_hpp"));
    command.env_remove("HPP_API_URL");
    command
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = hpp().arg("--help").output().expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("House Price Predictor"), "Should show app name");
    for command in ["predict", "predict-bulk", "info", "train", "retrain", "trend", "health", "train-local", "tool"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = hpp().arg("--version").output().expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("hpp"), "Should show binary name");
}

/// Test predict subcommand help lists the housing features
#[test]
fn test_predict_help() {
    let output = hpp()
        .args(["predict", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    for flag in ["--med-inc", "--house-age", "--latitude", "--longitude", "--feature"] {
        assert!(stdout.contains(flag), "Should show {} option", flag);
    }
}

/// Test retrain requires a file argument
#[test]
fn test_retrain_requires_file() {
    let output = hpp().arg("retrain").output().expect("Failed to execute command");

    assert!(!output.status.success(), "Retrain without a file should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("<FILE>"), "Should name the missing argument");
}

/// Test invalid command
#[test]
fn test_invalid_command() {
    let output = hpp().arg("invalid-command").output().expect("Failed to execute command");

    assert!(!output.status.success(), "Invalid command should fail");
}

/// Test an unreachable server is reported without a panic
#[test]
fn test_unreachable_server() {
    let home = TempDir::new().unwrap();
    let output = hpp()
        .env("HOME", home.path())
        .args(["--api-url", "http://127.0.0.1:9", "health"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Health against a dead server should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Could not connect to the prediction API"),
        "Should explain the connection failure: {}",
        stderr
    );
}

/// Test offline training writes a bundle
#[test]
fn test_train_local() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("train.csv");
    let mut csv = String::from("MedInc,HouseAge,target\n");
    for i in 0..25 {
        csv.push_str(&format!("{},{},{}\n", i, i % 7, 0.2 * i as f64));
    }
    std::fs::write(&data, csv).unwrap();
    let models_dir = dir.path().join("models");

    let output = hpp()
        .env("HOME", dir.path())
        .args(["--format", "json", "train-local", "--model-type", "linear", "--data"])
        .arg(&data)
        .arg("--models-dir")
        .arg(&models_dir)
        .output()
        .expect("Failed to execute command");

    assert!(
        output.status.success(),
        "train-local should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["version"], "v0001");
    assert_eq!(summary["model_type"], "linear");
    assert_eq!(
        std::fs::read_to_string(models_dir.join("CURRENT")).unwrap().trim(),
        "v0001"
    );
}

/// Test tool answers are plain text even when the server is down
#[test]
fn test_tool_reports_connection_error_as_text() {
    let home = TempDir::new().unwrap();
    let output = hpp()
        .env("HOME", home.path())
        .args(["--api-url", "http://127.0.0.1:9", "tool", "model-info"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Tool commands always answer");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Error: Could not connect to the prediction API"));
}
