//! Monotone watermarks shared by producers and consumers.

use std::sync::atomic::{AtomicI64, Ordering};

/// Sentinel for "nothing resolved yet"
pub const UNRESOLVED: i64 = i64::MIN;

/// Sentinel for "no pulse observed yet"
const UNSEEN: i64 = i64::MAX;

#[derive(Debug)]
pub struct Watermarks {
    /// Minimum pulse id ever observed, only decreases
    smallest_seen: AtomicI64,
    /// Highest pulse id emitted or dropped, only increases
    boundary: AtomicI64,
}

impl Default for Watermarks {
    fn default() -> Self {
        Self::new()
    }
}

impl Watermarks {
    pub fn new() -> Self {
        Self {
            smallest_seen: AtomicI64::new(UNSEEN),
            boundary: AtomicI64::new(UNRESOLVED),
        }
    }

    /// Record an arrival; returns true if it lowered the minimum
    pub fn observe(&self, pulse_id: i64) -> bool {
        self.smallest_seen.fetch_min(pulse_id, Ordering::AcqRel) > pulse_id
    }

    /// Raise the boundary to `pulse_id`; returns true if it moved
    pub fn advance(&self, pulse_id: i64) -> bool {
        self.boundary.fetch_max(pulse_id, Ordering::AcqRel) < pulse_id
    }

    /// Move the boundary off its sentinel, only if nothing resolved yet
    pub fn jump_from_unresolved(&self, pulse_id: i64) -> bool {
        self.boundary
            .compare_exchange(UNRESOLVED, pulse_id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn boundary(&self) -> i64 {
        self.boundary.load(Ordering::Acquire)
    }

    #[inline]
    pub fn smallest_seen(&self) -> Option<i64> {
        match self.smallest_seen.load(Ordering::Acquire) {
            UNSEEN => None,
            pulse_id => Some(pulse_id),
        }
    }

    #[inline]
    pub fn is_unresolved(&self) -> bool {
        self.boundary() == UNRESOLVED
    }

    /// Whether `pulse_id` has already been passed by the boundary
    #[inline]
    pub fn is_stale(&self, pulse_id: i64) -> bool {
        pulse_id <= self.boundary()
    }

    /// Lower end of the missing-pulse interval
    pub fn missing_reference(&self) -> i64 {
        self.smallest_seen
            .load(Ordering::Acquire)
            .max(self.boundary())
    }
}
