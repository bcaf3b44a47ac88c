//! Replay driver - one producer per channel, one consumer.
//!
//! Producers run on blocking threads and emit a value for every pulse on
//! their channel's schedule, optionally dropping and reordering them. The
//! consumer drains the synchronizer with the configured delivery model.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{ChannelMessage, ChannelSchedule, DeliveryMode, SynchronizerConfig};
use observability::{
    record_bundle_metrics, record_consumer_lag, record_pulse_received, SyncMetricsAggregator,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sync_engine::{is_expected, AddOutcome, PulseSynchronizer};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ReplayStats;
use crate::error::CliError;

/// Replay configuration
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Synchronizer under test
    pub sync: SynchronizerConfig,

    /// Number of pulses to generate
    pub pulses: u64,

    /// First pulse id
    pub start_pulse: i64,

    /// Probability of dropping each expected value
    pub drop_rate: f64,

    /// Reorder window in pulses (0 or 1 = in order)
    pub shuffle: usize,

    /// Seed for dropping and reordering
    pub seed: u64,

    /// Delay between values from one producer
    pub interval: Duration,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// What one producer did
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ProducerReport {
    pub sent: u64,
    pub dropped: u64,
    pub rejected: u64,
}

/// Replay driver
pub struct Replay {
    config: ReplayConfig,
}

impl Replay {
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }

    /// Run every producer to completion, drain the synchronizer and report
    pub async fn run(self) -> Result<ReplayStats> {
        let start_time = Instant::now();
        let config = self.config;

        if let Some(port) = config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let sync = Arc::new(
            PulseSynchronizer::<ChannelMessage>::new(config.sync.clone())
                .context("Failed to create synchronizer")?,
        );

        let consumer = spawn_consumer(&sync);

        let mut producers = Vec::with_capacity(sync.schedules().len());
        for (idx, schedule) in sync.schedules().iter().enumerate() {
            let plan = producer_plan(
                schedule,
                config.start_pulse,
                config.pulses,
                config.drop_rate,
                config.shuffle,
                config.seed.wrapping_add(idx as u64),
            );
            let sync = Arc::clone(&sync);
            let channel = schedule.name.clone();
            let interval = config.interval;
            producers.push(tokio::task::spawn_blocking(move || {
                produce(&sync, &channel, plan, interval)
            }));
        }
        info!(producers = producers.len(), pulses = config.pulses, "Producers started");

        let mut totals = ProducerReport::default();
        for producer in producers {
            let report = producer
                .await
                .map_err(|e| CliError::replay(format!("producer task failed: {e}")))?;
            totals.sent += report.sent;
            totals.dropped += report.dropped;
            totals.rejected += report.rejected;
        }
        info!(sent = totals.sent, dropped = totals.dropped, "Producers finished");

        flush_aged(&sync).await;
        drain_ready(&sync).await;
        let leftover = sync.buffer_stats();
        if leftover.buffered_pulses > 0 {
            warn!(
                buffered = leftover.buffered_pulses,
                oldest = ?leftover.oldest_pulse_id,
                newest = ?leftover.newest_pulse_id,
                "Pulses still unresolved at shutdown"
            );
        }
        sync.close();

        let aggregator = consumer
            .await
            .map_err(|e| CliError::replay(format!("consumer task failed: {e}")))?;

        Ok(ReplayStats {
            duration: start_time.elapsed(),
            seed: config.seed,
            channels: sync.schedules().len(),
            messages_sent: totals.sent,
            messages_dropped: totals.dropped,
            messages_rejected: totals.rejected,
            left_buffered: leftover.buffered_pulses,
            sync: sync.stats().snapshot(),
            bundles: aggregator,
        })
    }
}

/// Pulses a producer will emit, in emission order
pub(crate) fn producer_plan(
    schedule: &ChannelSchedule,
    start_pulse: i64,
    pulses: u64,
    drop_rate: f64,
    shuffle: usize,
    seed: u64,
) -> (Vec<i64>, u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut dropped = 0;

    let mut plan: Vec<i64> = (0..pulses)
        .map_while(|offset| start_pulse.checked_add(offset as i64))
        .filter(|&pulse_id| is_expected(schedule, pulse_id))
        .filter(|_| {
            let keep = drop_rate <= 0.0 || !rng.random_bool(drop_rate);
            if !keep {
                dropped += 1;
            }
            keep
        })
        .collect();

    if shuffle > 1 {
        for window in plan.chunks_mut(shuffle) {
            window.shuffle(&mut rng);
        }
    }

    (plan, dropped)
}

fn produce(
    sync: &PulseSynchronizer<ChannelMessage>,
    channel: &str,
    (plan, dropped): (Vec<i64>, u64),
    interval: Duration,
) -> ProducerReport {
    let mut report = ProducerReport {
        dropped,
        ..Default::default()
    };

    for pulse_id in plan {
        let message = ChannelMessage::new(channel, pulse_id, pulse_id.to_le_bytes().to_vec());
        record_pulse_received(channel);
        match sync.add_message(message) {
            AddOutcome::Buffered => report.sent += 1,
            AddOutcome::Closed => break,
            other => {
                debug!(channel, pulse_id, outcome = ?other, "value rejected");
                report.sent += 1;
                report.rejected += 1;
            }
        }
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    debug!(channel, sent = report.sent, "producer done");
    report
}

fn spawn_consumer(
    sync: &Arc<PulseSynchronizer<ChannelMessage>>,
) -> JoinHandle<SyncMetricsAggregator> {
    match sync.receiver() {
        Some(rx) => {
            let sync = Arc::clone(sync);
            tokio::spawn(async move {
                let mut aggregator = SyncMetricsAggregator::new();
                while let Ok(bundle) = rx.recv().await {
                    record_bundle_metrics(&bundle);
                    record_consumer_lag(sync.pending_bundles());
                    aggregator.update(&bundle);
                }
                aggregator
            })
        }
        None => {
            let sync = Arc::clone(sync);
            tokio::task::spawn_blocking(move || {
                let mut aggregator = SyncMetricsAggregator::new();
                while let Some(bundle) = sync.next_message() {
                    record_bundle_metrics(&bundle);
                    record_consumer_lag(sync.pending_bundles());
                    aggregator.update(&bundle);
                }
                aggregator
            })
        }
    }
}

/// Give aged pulses a chance to leave once producers are quiet
async fn flush_aged(sync: &PulseSynchronizer<ChannelMessage>) {
    let Some(max_age_ms) = sync.config().max_pulse_age_ms else {
        return;
    };
    if sync.buffered_pulse_count() == 0 {
        return;
    }

    let deadline = Instant::now() + Duration::from_millis(max_age_ms.saturating_mul(2));
    let tick = Duration::from_millis(max_age_ms.clamp(1, 100));
    while sync.buffered_pulse_count() > 0 && Instant::now() < deadline {
        tokio::time::sleep(tick).await;
        sync.evict_expired();
    }
}

/// Wait for the consumer to take every resolved bundle before closing
async fn drain_ready(sync: &PulseSynchronizer<ChannelMessage>) {
    if !matches!(sync.config().delivery, DeliveryMode::Pull) {
        return;
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while sync.pending_bundles() > 0 {
        if Instant::now() >= deadline {
            warn!(pending = sync.pending_bundles(), "consumer did not drain in time");
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
