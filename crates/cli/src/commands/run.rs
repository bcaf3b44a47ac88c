//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use super::load_config;
use super::validate::describe_delivery;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Replay, ReplayConfig};

/// Execute the `run` command
pub async fn run_replay(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let config = load_config(&args.config)?;
    for warning in config_loader::warnings(&config) {
        warn!("{}", warning);
    }

    info!(
        channels = config.channels.len(),
        max_buffered_pulses = config.max_buffered_pulses,
        max_pulse_age_ms = ?config.max_pulse_age_ms,
        delivery = %describe_delivery(&config.delivery),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    let replay = Replay::new(ReplayConfig {
        sync: config,
        pulses: args.pulses,
        start_pulse: args.start_pulse,
        drop_rate: args.drop_rate,
        shuffle: args.shuffle,
        seed,
        interval: Duration::from_micros(args.interval_us),
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    info!(
        pulses = args.pulses,
        drop_rate = args.drop_rate,
        shuffle = args.shuffle,
        seed,
        "Starting replay..."
    );

    let run = async {
        if args.timeout == 0 {
            replay.run().await
        } else {
            tokio::time::timeout(Duration::from_secs(args.timeout), replay.run())
                .await
                .map_err(|_| CliError::Timeout { secs: args.timeout })?
        }
    };

    tokio::select! {
        result = run => {
            let stats = result.context("Replay failed")?;
            info!(
                bundles = stats.bundles.summary().total_bundles,
                duration_secs = stats.duration.as_secs_f64(),
                bundles_per_sec = format!("{:.2}", stats.bundles_per_sec()),
                "Replay completed"
            );
            stats.print_summary();
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping replay...");
        }
    }

    info!("Pulse Syncer finished");
    Ok(())
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
