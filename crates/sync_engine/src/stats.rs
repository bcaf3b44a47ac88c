//! Synchronizer counters for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by producers and consumers
#[derive(Debug, Default)]
pub struct SyncStats {
    /// Messages passed to `add_message`
    received: AtomicU64,
    /// Messages stored in the buffer
    buffered: AtomicU64,
    /// Messages dropped because their pulse was already resolved
    stale: AtomicU64,
    /// Messages from channels without a schedule
    unknown_channel: AtomicU64,
    /// Messages on a pulse their channel does not publish on
    off_schedule: AtomicU64,
    /// Values that replaced an earlier value of the same channel and pulse
    duplicates: AtomicU64,
    /// Bundles delivered with every expected channel
    complete: AtomicU64,
    /// Bundles delivered with missing channels
    incomplete: AtomicU64,
    /// Pulses force-resolved without delivery
    evicted: AtomicU64,
    /// Pending pulses discarded when the first pulse completed
    startup_discarded: AtomicU64,
    /// Bundles lost because the output queue was full
    queue_full: AtomicU64,
}

macro_rules! counter_accessors {
    ($($field:ident => $inc:ident),* $(,)?) => {
        $(
            pub fn $field(&self) -> u64 {
                self.$field.load(Ordering::Relaxed)
            }

            pub(crate) fn $inc(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter_accessors! {
        received => inc_received,
        buffered => inc_buffered,
        stale => inc_stale,
        unknown_channel => inc_unknown_channel,
        off_schedule => inc_off_schedule,
        duplicates => inc_duplicates,
        complete => inc_complete,
        incomplete => inc_incomplete,
        evicted => inc_evicted,
        queue_full => inc_queue_full,
    }

    pub fn startup_discarded(&self) -> u64 {
        self.startup_discarded.load(Ordering::Relaxed)
    }

    pub(crate) fn add_startup_discarded(&self, count: u64) {
        self.startup_discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            received: self.received(),
            buffered: self.buffered(),
            stale: self.stale(),
            unknown_channel: self.unknown_channel(),
            off_schedule: self.off_schedule(),
            duplicates: self.duplicates(),
            complete: self.complete(),
            incomplete: self.incomplete(),
            evicted: self.evicted(),
            startup_discarded: self.startup_discarded(),
            queue_full: self.queue_full(),
        }
    }
}

/// Snapshot of synchronizer counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatsSnapshot {
    pub received: u64,
    pub buffered: u64,
    pub stale: u64,
    pub unknown_channel: u64,
    pub off_schedule: u64,
    pub duplicates: u64,
    pub complete: u64,
    pub incomplete: u64,
    pub evicted: u64,
    pub startup_discarded: u64,
    pub queue_full: u64,
}

impl SyncStatsSnapshot {
    /// Bundles handed to consumers (complete + incomplete)
    pub fn delivered(&self) -> u64 {
        self.complete + self.incomplete
    }

    /// Messages rejected before reaching the buffer
    pub fn rejected(&self) -> u64 {
        self.stale + self.unknown_channel + self.off_schedule
    }
}
