//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{AlignmentPolicy, RigBlueprint, SourceConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    camera_count: usize,
    target_fps: f64,
    alignment: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    camera_count: blueprint.cameras.len(),
                    target_fps: blueprint.sync.target_fps,
                    alignment: format!("{:?}", blueprint.sync.alignment),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &RigBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let target = blueprint.sync.target_fps;

    for camera in &blueprint.cameras {
        if camera.fps < target {
            warnings.push(format!(
                "Camera {} runs at {} fps, below the target {} fps - expect missing frames",
                camera.port, camera.fps, target
            ));
        }
        if let SourceConfig::Playback { directory, .. } = &camera.source {
            if !directory.exists() {
                warnings.push(format!(
                    "Camera {} plays back from missing folder {}",
                    camera.port,
                    directory.display()
                ));
            }
        }
    }

    if let AlignmentPolicy::NearestTimestamp { window_ms } = blueprint.sync.alignment {
        let period_ms = 1000.0 / target;
        if window_ms > period_ms * 2.0 {
            warnings.push(format!(
                "Alignment window {window_ms} ms spans more than two cycles ({period_ms:.1} ms each)"
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Cameras: {}", summary.camera_count);
            println!("  Target fps: {}", summary.target_fps);
            println!("  Alignment: {}", summary.alignment);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
