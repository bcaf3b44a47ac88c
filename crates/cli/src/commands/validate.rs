//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DeliveryMode, SynchronizerConfig};
use serde::Serialize;
use tracing::info;

use super::load_config;
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
    channel_count: usize,
    max_buffered_pulses: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_pulse_age_ms: Option<u64>,
    send_incomplete: bool,
    send_first_complete: bool,
    delivery: String,
}

impl ConfigSummary {
    fn from_config(config: &SynchronizerConfig) -> Self {
        Self {
            channel_count: config.channels.len(),
            max_buffered_pulses: config.max_buffered_pulses,
            max_pulse_age_ms: config.max_pulse_age_ms,
            send_incomplete: config.send_incomplete,
            send_first_complete: config.send_first_complete,
            delivery: describe_delivery(&config.delivery),
        }
    }
}

pub(crate) fn describe_delivery(delivery: &DeliveryMode) -> String {
    match delivery {
        DeliveryMode::Push { queue_capacity } => format!("push (queue {})", queue_capacity),
        DeliveryMode::Pull => "pull".to_string(),
    }
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

    match load_config(&args.config) {
        Ok(config) => {
            let warnings = config_loader::warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary::from_config(&config)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("{:#}", e)),
            warnings: None,
            summary: None,
        },
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Channels: {}", summary.channel_count);
            println!("  Max buffered pulses: {}", summary.max_buffered_pulses);
            match summary.max_pulse_age_ms {
                Some(ms) => println!("  Max pulse age: {} ms", ms),
                None => println!("  Max pulse age: unlimited"),
            }
            println!("  Send incomplete: {}", summary.send_incomplete);
            println!("  Send first complete: {}", summary.send_first_complete);
            println!("  Delivery: {}", summary.delivery);
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
