//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::SynchronizerConfig;
use serde::Serialize;
use sync_engine::ScheduleSet;
use tracing::info;

use super::load_config;
use super::validate::describe_delivery;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    channels: Vec<ChannelInfo>,
    settings: SettingsInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pulses: Vec<PulseInfo>,
}

#[derive(Serialize)]
struct ChannelInfo {
    name: String,
    period: i64,
    phase: i64,
}

#[derive(Serialize)]
struct SettingsInfo {
    max_buffered_pulses: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_pulse_age_ms: Option<u64>,
    send_incomplete: bool,
    send_first_complete: bool,
    delivery: String,
}

/// Channels expected at one pulse
#[derive(Serialize)]
struct PulseInfo {
    pulse_id: i64,
    expected: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(&args.config)?;
    let schedules =
        ScheduleSet::new(config.channels.clone()).context("Invalid channel schedules")?;

    let info = build_config_info(&config, &schedules, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(
    config: &SynchronizerConfig,
    schedules: &ScheduleSet,
    args: &InfoArgs,
) -> ConfigInfo {
    let channels = schedules
        .iter()
        .map(|s| ChannelInfo {
            name: s.name.clone(),
            period: s.period,
            phase: s.phase,
        })
        .collect();

    let pulses = match args.from {
        Some(from) => (0..args.count)
            .map_while(|offset| from.checked_add(offset as i64))
            .map(|pulse_id| PulseInfo {
                pulse_id,
                expected: schedules
                    .expected_channels(pulse_id)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
            .collect(),
        None => Vec::new(),
    };

    ConfigInfo {
        channels,
        settings: SettingsInfo {
            max_buffered_pulses: config.max_buffered_pulses,
            max_pulse_age_ms: config.max_pulse_age_ms,
            send_incomplete: config.send_incomplete,
            send_first_complete: config.send_first_complete,
            delivery: describe_delivery(&config.delivery),
        },
        pulses,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Pulse Syncer Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Channels ({})", info.channels.len());
    for (i, channel) in info.channels.iter().enumerate() {
        let prefix = if i == info.channels.len() - 1 { "└─" } else { "├─" };
        if channel.period == 1 {
            println!("   {} {} (every pulse)", prefix, channel.name);
        } else {
            println!(
                "   {} {} (period {}, phase {})",
                prefix, channel.name, channel.period, channel.phase
            );
        }
    }

    let settings = &info.settings;
    println!("\n⚙️  Sync Settings");
    println!("   ├─ Max buffered pulses: {}", settings.max_buffered_pulses);
    match settings.max_pulse_age_ms {
        Some(ms) => println!("   ├─ Max pulse age: {} ms", ms),
        None => println!("   ├─ Max pulse age: unlimited"),
    }
    println!("   ├─ Send incomplete: {}", settings.send_incomplete);
    println!("   ├─ Send first complete: {}", settings.send_first_complete);
    println!("   └─ Delivery: {}", settings.delivery);

    if !info.pulses.is_empty() {
        println!("\n🔢 Expected Channels");
        for (i, pulse) in info.pulses.iter().enumerate() {
            let prefix = if i == info.pulses.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {:>12}: [{}]",
                prefix,
                pulse.pulse_id,
                pulse.expected.join(", ")
            );
        }
    }

    println!();
}
