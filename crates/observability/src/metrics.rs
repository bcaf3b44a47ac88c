//! Synchronizer output metrics
//!
//! Records per-bundle metrics for Prometheus and keeps running statistics in
//! memory for end-of-run summaries.

use std::collections::HashMap;

use contracts::SyncedBundle;
use metrics::{counter, gauge, histogram};

/// Record metrics for one delivered bundle
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_bundle_metrics;
///
/// while let Ok(bundle) = rx.recv_blocking() {
///     record_bundle_metrics(&bundle);
/// }
/// ```
pub fn record_bundle_metrics<M>(bundle: &SyncedBundle<M>) {
    let status = if bundle.is_complete() {
        "complete"
    } else {
        "incomplete"
    };
    counter!("pulse_syncer_bundles_consumed_total", "status" => status).increment(1);

    gauge!("pulse_syncer_last_pulse_id").set(bundle.pulse_id as f64);
    histogram!("pulse_syncer_bundle_fill_ratio").record(bundle.fill_ratio());
    histogram!("pulse_syncer_bundle_channels").record(bundle.len() as f64);
}

/// Record a message entering the synchronizer
pub fn record_pulse_received(channel: &str) {
    counter!(
        "pulse_syncer_messages_received_total",
        "channel" => channel.to_string()
    )
    .increment(1);
}

/// Record resolved bundles not yet taken by a consumer
pub fn record_consumer_lag(pending: usize) {
    gauge!("pulse_syncer_pending_bundles").set(pending as f64);
}

/// In-memory aggregation of delivered bundles
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsAggregator {
    pub total_bundles: u64,

    pub complete_bundles: u64,

    pub incomplete_bundles: u64,

    /// Pulses skipped between consecutive bundles
    pub skipped_pulses: u64,

    /// Bundles whose pulse id did not increase (should stay 0)
    pub order_violations: u64,

    pub fill_stats: RunningStats,

    /// Distance between consecutive delivered pulse ids
    pub gap_stats: RunningStats,

    /// Bundles each channel contributed to
    pub channel_counts: HashMap<String, u64>,

    last_pulse_id: Option<i64>,
}

impl SyncMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update<M>(&mut self, bundle: &SyncedBundle<M>) {
        self.total_bundles += 1;
        if bundle.is_complete() {
            self.complete_bundles += 1;
        } else {
            self.incomplete_bundles += 1;
        }

        self.fill_stats.push(bundle.fill_ratio());

        if let Some(last) = self.last_pulse_id {
            let gap = bundle.pulse_id.saturating_sub(last);
            if gap <= 0 {
                self.order_violations += 1;
            } else {
                self.gap_stats.push(gap as f64);
                self.skipped_pulses += (gap - 1) as u64;
            }
        }
        self.last_pulse_id = Some(bundle.pulse_id);

        for channel in bundle.values.keys() {
            *self.channel_counts.entry(channel.clone()).or_insert(0) += 1;
        }
    }

    pub fn last_pulse_id(&self) -> Option<i64> {
        self.last_pulse_id
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_bundles: self.total_bundles,
            complete_bundles: self.complete_bundles,
            incomplete_bundles: self.incomplete_bundles,
            skipped_pulses: self.skipped_pulses,
            order_violations: self.order_violations,
            incomplete_rate: if self.total_bundles > 0 {
                self.incomplete_bundles as f64 / self.total_bundles as f64 * 100.0
            } else {
                0.0
            },
            fill_ratio: StatsSummary::from(&self.fill_stats),
            pulse_gap: StatsSummary::from(&self.gap_stats),
            channel_counts: self.channel_counts.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Aggregated report
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_bundles: u64,
    pub complete_bundles: u64,
    pub incomplete_bundles: u64,
    pub skipped_pulses: u64,
    pub order_violations: u64,
    pub incomplete_rate: f64,
    pub fill_ratio: StatsSummary,
    pub pulse_gap: StatsSummary,
    pub channel_counts: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Pulse Sync Summary ===")?;
        writeln!(f, "Total bundles: {}", self.total_bundles)?;
        writeln!(f, "Complete bundles: {}", self.complete_bundles)?;
        writeln!(
            f,
            "Incomplete bundles: {} ({:.2}%)",
            self.incomplete_bundles, self.incomplete_rate
        )?;
        writeln!(f, "Skipped pulses: {}", self.skipped_pulses)?;
        writeln!(f, "Order violations: {}", self.order_violations)?;
        writeln!(f, "Fill ratio: {}", self.fill_ratio)?;
        writeln!(f, "Pulse gap: {}", self.pulse_gap)?;

        if !self.channel_counts.is_empty() {
            writeln!(f, "Channel counts:")?;
            let mut channels: Vec<_> = self.channel_counts.iter().collect();
            channels.sort();
            for (channel, count) in channels {
                writeln!(f, "  {}: {}", channel, count)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
