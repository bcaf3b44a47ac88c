//! SyncedBundle - synchronizer output
//!
//! All channel values collected for one pulse id.

use std::collections::HashMap;

/// Resolved bundle for a single pulse
#[derive(Debug, Clone)]
pub struct SyncedBundle<M> {
    /// Pulse id shared by every value in the bundle
    pub pulse_id: i64,

    /// Channel values (channel name -> message)
    pub values: HashMap<String, M>,

    /// Number of channels expected on this pulse
    pub expected: usize,
}

impl<M> SyncedBundle<M> {
    /// Whether every expected channel delivered a value
    pub fn is_complete(&self) -> bool {
        self.values.len() >= self.expected
    }

    /// Number of collected channel values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value published by `channel`, if present
    pub fn get(&self, channel: &str) -> Option<&M> {
        self.values.get(channel)
    }

    /// Names of the channels present in this bundle, sorted
    pub fn channels(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Ratio of collected to expected channels (1.0 when nothing was expected)
    pub fn fill_ratio(&self) -> f64 {
        if self.expected == 0 {
            1.0
        } else {
            self.values.len() as f64 / self.expected as f64
        }
    }
}

/// Buffer occupancy snapshot (for diagnostics)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Buffered pulses
    pub buffered_pulses: usize,

    /// Oldest buffered pulse id
    pub oldest_pulse_id: Option<i64>,

    /// Newest buffered pulse id
    pub newest_pulse_id: Option<i64>,
}
