//! Synchronizer configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::Validate;

use crate::ContractError;

/// Publication schedule of one channel.
///
/// A pulse `p` is expected on the channel iff `(p - phase) mod period == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct ChannelSchedule {
    /// Channel name
    #[validate(length(min = 1))]
    pub name: String,

    /// Publication period in pulses
    #[serde(default = "default_period")]
    #[validate(range(min = 1))]
    pub period: i64,

    /// Offset of the first publishing pulse within a period
    #[serde(default)]
    #[validate(range(min = 0))]
    pub phase: i64,
}

fn default_period() -> i64 {
    1
}

impl ChannelSchedule {
    /// Channel publishing on every pulse
    pub fn every_pulse(name: impl Into<String>) -> Self {
        Self::new(name, 1, 0)
    }

    pub fn new(name: impl Into<String>, period: i64, phase: i64) -> Self {
        Self {
            name: name.into(),
            period,
            phase,
        }
    }
}

/// Synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SynchronizerConfig {
    /// Channel schedules, fixed for the lifetime of a synchronizer
    #[validate(nested)]
    pub channels: Vec<ChannelSchedule>,

    /// Maximum number of pulses held before the oldest is force-resolved
    #[serde(default = "default_max_buffered_pulses")]
    #[validate(range(min = 1))]
    pub max_buffered_pulses: usize,

    /// Maximum age of the oldest pulse before it is force-resolved (None = no limit)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub max_pulse_age_ms: Option<u64>,

    /// Deliver force-resolved bundles even when channels are missing
    #[serde(default)]
    pub send_incomplete: bool,

    /// Discard older pending pulses as soon as the first pulse completes
    #[serde(default)]
    pub send_first_complete: bool,

    /// How resolved bundles reach consumers
    #[serde(default)]
    pub delivery: DeliveryMode,
}

fn default_max_buffered_pulses() -> usize {
    100
}

impl SynchronizerConfig {
    /// Push-mode configuration with default limits
    pub fn new(channels: Vec<ChannelSchedule>) -> Self {
        Self {
            channels,
            max_buffered_pulses: default_max_buffered_pulses(),
            max_pulse_age_ms: None,
            send_incomplete: false,
            send_first_complete: false,
            delivery: DeliveryMode::default(),
        }
    }

    pub fn with_max_buffered_pulses(mut self, max: usize) -> Self {
        self.max_buffered_pulses = max;
        self
    }

    pub fn with_max_pulse_age_ms(mut self, max_age_ms: u64) -> Self {
        self.max_pulse_age_ms = Some(max_age_ms);
        self
    }

    pub fn with_send_incomplete(mut self, enabled: bool) -> Self {
        self.send_incomplete = enabled;
        self
    }

    pub fn with_send_first_complete(mut self, enabled: bool) -> Self {
        self.send_first_complete = enabled;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    /// Run field checks and cross-field checks.
    ///
    /// # Errors
    /// Returns `ContractError::ConfigValidation` on the first violated rule.
    pub fn ensure_valid(&self) -> Result<(), ContractError> {
        if self.channels.is_empty() {
            return Err(ContractError::config_validation(
                "channels",
                "at least one channel schedule is required",
            ));
        }

        self.validate()?;
        validate_channels(&self.channels)?;

        if let DeliveryMode::Push { queue_capacity: 0 } = self.delivery {
            return Err(ContractError::config_validation(
                "delivery.queue_capacity",
                "queue_capacity must be > 0",
            ));
        }

        Ok(())
    }
}

/// Check channel schedules: positive period, phase in `0..period`, unique names.
///
/// # Errors
/// Returns `ContractError::ConfigValidation` naming the offending channel.
pub fn validate_channels(channels: &[ChannelSchedule]) -> Result<(), ContractError> {
    let mut seen = HashSet::with_capacity(channels.len());
    for (idx, channel) in channels.iter().enumerate() {
        if channel.period <= 0 {
            return Err(ContractError::config_validation(
                format!("channels[{idx}].period"),
                format!(
                    "period must be > 0 for channel '{}', got {}",
                    channel.name, channel.period
                ),
            ));
        }
        if channel.phase < 0 || channel.phase >= channel.period {
            return Err(ContractError::config_validation(
                format!("channels[{idx}].phase"),
                format!(
                    "phase must be in 0..{} for channel '{}', got {}",
                    channel.period, channel.name, channel.phase
                ),
            ));
        }
        if !seen.insert(channel.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("channels[{idx}].name"),
                format!("duplicate channel name '{}'", channel.name),
            ));
        }
    }
    Ok(())
}

/// Consumer hand-off model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Producers enqueue resolved bundles onto a bounded queue (drop on full)
    Push {
        #[serde(default = "default_queue_capacity")]
        queue_capacity: usize,
    },
    /// Consumers block in `next_message` until a bundle resolves
    Pull,
}

fn default_queue_capacity() -> usize {
    1000
}

impl Default for DeliveryMode {
    fn default() -> Self {
        Self::Push {
            queue_capacity: default_queue_capacity(),
        }
    }
}
