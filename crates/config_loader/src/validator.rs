//! Configuration validation
//!
//! Hard rules (delegated to the contract):
//! - at least one channel, unique non-empty names
//! - period > 0, 0 <= phase < period
//! - buffer and queue capacities > 0, age limit > 0 when set
//!
//! Soft rules only produce warnings.

use contracts::{ContractError, DeliveryMode, SynchronizerConfig};

/// Validate a synchronizer configuration.
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &SynchronizerConfig) -> Result<(), ContractError> {
    config.ensure_valid()
}

/// Non-fatal issues worth reporting to an operator
pub fn warnings(config: &SynchronizerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.max_pulse_age_ms.is_none() {
        warnings.push(
            "max_pulse_age_ms not set - incomplete pulses are only evicted by buffer size"
                .to_string(),
        );
    }

    if config.send_first_complete {
        warnings.push(
            "send_first_complete enabled - pending pulses older than the first complete pulse are discarded"
                .to_string(),
        );
    }

    let max_period = config.channels.iter().map(|c| c.period).max().unwrap_or(1);
    if (config.max_buffered_pulses as i64) < max_period {
        warnings.push(format!(
            "max_buffered_pulses ({}) is smaller than the longest channel period ({max_period}) - \
             pulses of that channel may be evicted before it publishes",
            config.max_buffered_pulses
        ));
    }

    if let DeliveryMode::Push { queue_capacity } = config.delivery {
        if queue_capacity < config.max_buffered_pulses {
            warnings.push(format!(
                "delivery.queue_capacity ({queue_capacity}) is smaller than max_buffered_pulses ({}) - \
                 a slow consumer will lose bundles",
                config.max_buffered_pulses
            ));
        }
    }

    warnings
}
