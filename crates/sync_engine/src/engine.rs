//! Pulse-id synchronizer.
//!
//! Producers call [`PulseSynchronizer::add_message`] from any number of
//! threads. Each call stores the value under its pulse id and then runs a
//! resolution pass that hands every resolvable pulse, oldest first, to the
//! configured delivery model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    BufferStats, ContractError, DeliveryMode, PulseMessage, SyncedBundle, SynchronizerConfig,
};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use crate::buffer::PulseBuffer;
use crate::clock::{Clock, SystemClock};
use crate::delivery::{BundleReceiver, Delivery, Handoff, Pop};
use crate::missing::is_pulse_missing;
use crate::schedule::{is_expected, ScheduleSet};
use crate::stats::SyncStats;
use crate::watermark::Watermarks;

/// What happened to a message passed to `add_message`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Stored under its pulse id
    Buffered,
    /// Pulse already resolved
    Stale,
    /// Channel has no configured schedule
    UnknownChannel,
    /// Pulse is not on the channel's schedule
    OffSchedule,
    /// Synchronizer was closed
    Closed,
}

/// Why a pulse was resolved regardless of completeness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForcedBy {
    /// Buffer exceeded `max_buffered_pulses`
    Size,
    /// Oldest pulse exceeded `max_pulse_age_ms`
    Age,
}

impl ForcedBy {
    fn as_str(self) -> &'static str {
        match self {
            ForcedBy::Size => "size",
            ForcedBy::Age => "age",
        }
    }
}

/// A pulse removed from the buffer, waiting to be delivered or dropped
struct Resolution<M> {
    bundle: SyncedBundle<M>,
    forced: Option<ForcedBy>,
}

/// Multi-channel pulse synchronizer
///
/// Share it between threads with `Arc`. All operations take `&self`.
pub struct PulseSynchronizer<M> {
    config: SynchronizerConfig,
    schedules: ScheduleSet,
    buffer: Mutex<PulseBuffer<M>>,
    watermarks: Watermarks,
    /// Serializes resolution passes so bundles leave in pulse order
    resolving: Mutex<()>,
    delivery: Delivery<M>,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
    stats: SyncStats,
}

impl<M> std::fmt::Debug for PulseSynchronizer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseSynchronizer")
            .field("channels", &self.schedules.len())
            .field("buffer", &*self.buffer.lock())
            .field("boundary", &self.last_resolved_boundary())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<M: PulseMessage> PulseSynchronizer<M> {
    /// Create a synchronizer driven by the wall clock.
    ///
    /// # Errors
    /// Fails on malformed configuration (empty or duplicate channels,
    /// non-positive period, phase outside `0..period`, zero capacities).
    pub fn new(config: SynchronizerConfig) -> Result<Self, ContractError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a synchronizer with a custom time source for age eviction
    pub fn with_clock(
        config: SynchronizerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ContractError> {
        config.ensure_valid()?;
        let schedules = ScheduleSet::new(config.channels.clone())?;

        let delivery = match config.delivery {
            DeliveryMode::Push { queue_capacity } => Delivery::push(queue_capacity),
            DeliveryMode::Pull => Delivery::pull(),
        };

        info!(
            channels = schedules.len(),
            max_buffered_pulses = config.max_buffered_pulses,
            max_pulse_age_ms = ?config.max_pulse_age_ms,
            send_incomplete = config.send_incomplete,
            send_first_complete = config.send_first_complete,
            delivery = ?config.delivery,
            "pulse synchronizer created"
        );

        Ok(Self {
            config,
            schedules,
            buffer: Mutex::new(PulseBuffer::new()),
            watermarks: Watermarks::new(),
            resolving: Mutex::new(()),
            delivery,
            clock,
            closed: AtomicBool::new(false),
            stats: SyncStats::new(),
        })
    }

    /// Store a channel value and resolve whatever became resolvable.
    ///
    /// Never blocks on consumers. Rejected messages are logged and counted.
    #[instrument(
        level = "trace",
        name = "pulse_sync_add_message",
        skip(self, msg),
        fields(channel = %msg.channel_name(), pulse_id = msg.pulse_id())
    )]
    pub fn add_message(&self, msg: M) -> AddOutcome {
        self.stats.inc_received();

        if self.is_closed() {
            debug!("synchronizer closed, message ignored");
            return AddOutcome::Closed;
        }

        let pulse_id = msg.pulse_id();
        let Some(schedule) = self.schedules.get(msg.channel_name()) else {
            info!(channel = %msg.channel_name(), pulse_id, "message from unconfigured channel dropped");
            self.reject("unknown_channel");
            self.stats.inc_unknown_channel();
            return AddOutcome::UnknownChannel;
        };

        if !is_expected(schedule, pulse_id) {
            debug!(
                channel = %schedule.name,
                pulse_id,
                period = schedule.period,
                phase = schedule.phase,
                "pulse not on channel schedule, message dropped"
            );
            self.reject("off_schedule");
            self.stats.inc_off_schedule();
            return AddOutcome::OffSchedule;
        }

        let channel = schedule.name.clone();
        let expected = self.schedules.expected_channel_count(pulse_id);
        let now_ms = self.clock.now_millis();

        {
            let mut buffer = self.buffer.lock();
            // Checked under the buffer lock: the boundary only moves while it is held.
            if self.watermarks.is_stale(pulse_id) {
                drop(buffer);
                info!(
                    channel = %channel,
                    pulse_id,
                    boundary = self.watermarks.boundary(),
                    "stale pulse dropped"
                );
                self.reject("stale");
                self.stats.inc_stale();
                return AddOutcome::Stale;
            }

            self.watermarks.observe(pulse_id);
            let inserted = buffer.insert(pulse_id, channel, msg, now_ms);
            if inserted.replaced {
                debug!(pulse_id, "duplicate channel value replaced");
                self.stats.inc_duplicates();
            }

            if self.config.send_first_complete && inserted.filled >= expected {
                self.release_startup_backlog(&mut buffer, pulse_id);
            }
            metrics::gauge!("pulse_sync_buffered_pulses").set(buffer.len() as f64);
        }
        self.stats.inc_buffered();

        self.resolve_pass();
        AddOutcome::Buffered
    }

    /// Startup rule: the first pulse to complete discards everything older.
    ///
    /// Only applies while nothing has been resolved yet.
    fn release_startup_backlog(&self, buffer: &mut PulseBuffer<M>, pulse_id: i64) {
        if !self.watermarks.is_unresolved() {
            return;
        }
        let discarded = buffer.discard_before(pulse_id);
        if !self.watermarks.jump_from_unresolved(pulse_id.saturating_sub(1)) {
            return;
        }
        if !discarded.is_empty() {
            info!(
                pulse_id,
                discarded = discarded.len(),
                oldest = discarded.first().map(|b| b.pulse_id()),
                "first complete pulse, older pending pulses discarded"
            );
            self.stats.add_startup_discarded(discarded.len() as u64);
            metrics::counter!("pulse_sync_startup_discarded_total")
                .increment(discarded.len() as u64);
        }
    }

    /// Resolve pulses from the oldest end of the buffer until one must wait.
    ///
    /// Returns the number of pulses resolved (delivered or dropped).
    #[instrument(level = "trace", name = "pulse_sync_resolve_pass", skip(self))]
    fn resolve_pass(&self) -> usize {
        let _pass = self.resolving.lock();
        let mut resolved = 0;

        while let Some(resolution) = self.resolve_oldest() {
            self.settle(resolution);
            resolved += 1;
        }

        resolved
    }

    /// Take the oldest pulse out of the buffer if it may be resolved now
    fn resolve_oldest(&self) -> Option<Resolution<M>> {
        let now_ms = self.clock.now_millis();
        let mut buffer = self.buffer.lock();
        let oldest = buffer.oldest()?;

        let pulse_id = oldest.pulse_id();
        let expected = self.schedules.expected_channel_count(pulse_id);

        let forced = if buffer.len() > self.config.max_buffered_pulses {
            Some(ForcedBy::Size)
        } else if self
            .config
            .max_pulse_age_ms
            .is_some_and(|max_age| oldest.age_ms(now_ms) > max_age)
        {
            Some(ForcedBy::Age)
        } else {
            None
        };

        if forced.is_none() {
            if oldest.len() < expected {
                return None;
            }
            let reference = self.watermarks.missing_reference();
            if is_pulse_missing(reference, pulse_id, self.schedules.as_slice()) {
                trace!(pulse_id, reference, "complete pulse waits for an earlier pulse");
                return None;
            }
        }

        // First remover wins; the boundary moves under the same lock.
        let bundle = buffer.remove(pulse_id)?;
        self.watermarks.advance(pulse_id);
        metrics::gauge!("pulse_sync_buffered_pulses").set(buffer.len() as f64);
        drop(buffer);

        Some(Resolution {
            bundle: SyncedBundle {
                pulse_id,
                values: bundle.into_values(),
                expected,
            },
            forced,
        })
    }

    /// Deliver or drop a resolved pulse according to the eviction policy
    fn settle(&self, resolution: Resolution<M>) {
        let Resolution { bundle, forced } = resolution;
        let pulse_id = bundle.pulse_id;

        if bundle.is_complete() {
            self.deliver(bundle, "complete");
            return;
        }

        let reason = forced.map(ForcedBy::as_str).unwrap_or("unknown");
        if self.config.send_incomplete {
            info!(
                pulse_id,
                expected = bundle.expected,
                received = bundle.len(),
                reason,
                "pulse evicted, delivering incomplete bundle"
            );
            self.deliver(bundle, "incomplete");
        } else {
            info!(
                pulse_id,
                expected = bundle.expected,
                received = bundle.len(),
                reason,
                "pulse evicted incomplete, dropped"
            );
            self.stats.inc_evicted();
            metrics::counter!("pulse_sync_bundles_total", "status" => "evicted").increment(1);
        }
    }

    fn deliver(&self, bundle: SyncedBundle<M>, status: &'static str) {
        let pulse_id = bundle.pulse_id;
        match self.delivery.send(bundle) {
            Handoff::Accepted => {
                if status == "complete" {
                    self.stats.inc_complete();
                } else {
                    self.stats.inc_incomplete();
                }
                metrics::counter!("pulse_sync_bundles_total", "status" => status).increment(1);
            }
            Handoff::Full => {
                warn!(pulse_id, status, "output queue full, bundle dropped");
                self.stats.inc_queue_full();
                metrics::counter!("pulse_sync_queue_full_total").increment(1);
            }
            Handoff::Closed => {
                debug!(pulse_id, "synchronizer closed, bundle discarded");
            }
        }
    }

    fn reject(&self, reason: &'static str) {
        metrics::counter!("pulse_sync_messages_dropped_total", "reason" => reason).increment(1);
    }

    /// Run a resolution pass without a new arrival.
    ///
    /// Applies the size and age limits; useful when producers have gone quiet.
    pub fn evict_expired(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.resolve_pass()
    }

    /// Block until the next bundle resolves or the synchronizer closes.
    ///
    /// Pull mode only; returns `None` immediately in push mode.
    pub fn next_message(&self) -> Option<SyncedBundle<M>> {
        self.pull(None)
    }

    /// Like [`next_message`](Self::next_message) but gives up after `timeout`
    ///
    /// A timeout too large to represent as a deadline waits without one.
    pub fn next_message_timeout(&self, timeout: Duration) -> Option<SyncedBundle<M>> {
        self.pull(Instant::now().checked_add(timeout))
    }

    /// Take a resolved bundle without blocking.
    ///
    /// In push mode this reads from the output queue.
    pub fn try_next_message(&self) -> Option<SyncedBundle<M>> {
        match self.delivery.ready_queue() {
            Some(ready) => {
                self.evict_expired();
                match ready.try_pop() {
                    Pop::Ready(bundle) => Some(bundle),
                    Pop::Empty | Pop::Closed => None,
                }
            }
            None => self.delivery.receiver().and_then(|rx| rx.try_recv().ok()),
        }
    }

    #[instrument(level = "trace", name = "pulse_sync_pull", skip(self))]
    fn pull(&self, deadline: Option<Instant>) -> Option<SyncedBundle<M>> {
        let Some(ready) = self.delivery.ready_queue() else {
            warn!("next_message called on a push-mode synchronizer");
            return None;
        };
        let tick = self.config.max_pulse_age_ms.map(Duration::from_millis);

        loop {
            match ready.try_pop() {
                Pop::Ready(bundle) => return Some(bundle),
                Pop::Closed => return None,
                Pop::Empty => {}
            }

            // Age eviction has no arrival to trigger it.
            if self.evict_expired() > 0 {
                continue;
            }

            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    Some(deadline - now)
                }
                None => None,
            };
            let timeout = match (remaining, tick) {
                (Some(remaining), Some(tick)) => Some(remaining.min(tick)),
                (remaining, tick) => remaining.or(tick),
            };
            ready.wait(timeout);
        }
    }

    /// Receiver for push-mode output; `None` in pull mode.
    ///
    /// Receivers are cheap clones of one multi-consumer queue.
    pub fn receiver(&self) -> Option<BundleReceiver<M>> {
        self.delivery.receiver()
    }

    /// Stop delivering and release every parked consumer. Idempotent.
    #[instrument(name = "pulse_sync_close", skip(self))]
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.delivery.close();
        info!(
            buffered = self.buffered_pulse_count(),
            boundary = ?self.last_resolved_boundary(),
            "pulse synchronizer closed"
        );
    }
}

impl<M> PulseSynchronizer<M> {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Pulses currently waiting in the buffer
    pub fn buffered_pulse_count(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.lock().stats()
    }

    /// Highest pulse delivered or dropped so far, `None` before the first
    pub fn last_resolved_boundary(&self) -> Option<i64> {
        if self.watermarks.is_unresolved() {
            None
        } else {
            Some(self.watermarks.boundary())
        }
    }

    /// Bundles resolved but not yet taken by a consumer
    pub fn pending_bundles(&self) -> usize {
        self.delivery.pending()
    }

    /// Consumers currently parked in `next_message`
    pub fn waiting_consumers(&self) -> usize {
        self.delivery.ready_queue().map_or(0, |ready| ready.waiting())
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn schedules(&self) -> &ScheduleSet {
        &self.schedules
    }

    pub fn config(&self) -> &SynchronizerConfig {
        &self.config
    }
}
