//! Ordered pulse buffer.
//!
//! A `BTreeMap` keyed by pulse id serves both as the lookup table producers
//! insert into and as the priority queue resolution drains from (smallest key
//! first). The buffer itself is not synchronized; the engine wraps it in a
//! mutex and keeps critical sections to single operations.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use contracts::BufferStats;

/// Values collected so far for one pulse
#[derive(Debug)]
pub struct PulseBundle<M> {
    pulse_id: i64,
    /// Clock reading (ms) at the first arrival for this pulse
    created_at_ms: u64,
    values: HashMap<String, M>,
}

impl<M> PulseBundle<M> {
    fn new(pulse_id: i64, created_at_ms: u64) -> Self {
        Self {
            pulse_id,
            created_at_ms,
            values: HashMap::new(),
        }
    }

    pub fn pulse_id(&self) -> i64 {
        self.pulse_id
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// Milliseconds since the first arrival
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.values.contains_key(channel)
    }

    pub fn into_values(self) -> HashMap<String, M> {
        self.values
    }
}

/// Result of inserting a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    /// Number of channels now present for the pulse
    pub filled: usize,
    /// The channel already had a value for this pulse and it was replaced
    pub replaced: bool,
}

/// Pending pulses, ordered ascending by pulse id
pub struct PulseBuffer<M> {
    entries: BTreeMap<i64, PulseBundle<M>>,
}

impl<M> fmt::Debug for PulseBuffer<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PulseBuffer")
            .field("len", &self.entries.len())
            .field("oldest", &self.entries.keys().next())
            .field("newest", &self.entries.keys().next_back())
            .finish()
    }
}

impl<M> Default for PulseBuffer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> PulseBuffer<M> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add a channel value, creating the bundle on first arrival
    pub fn insert(&mut self, pulse_id: i64, channel: String, value: M, now_ms: u64) -> Inserted {
        let bundle = self
            .entries
            .entry(pulse_id)
            .or_insert_with(|| PulseBundle::new(pulse_id, now_ms));
        let replaced = bundle.values.insert(channel, value).is_some();
        Inserted {
            filled: bundle.values.len(),
            replaced,
        }
    }

    /// Oldest pending pulse
    #[inline]
    pub fn oldest(&self) -> Option<&PulseBundle<M>> {
        self.entries.values().next()
    }

    /// Remove `pulse_id` if it is still buffered
    #[inline]
    pub fn remove(&mut self, pulse_id: i64) -> Option<PulseBundle<M>> {
        self.entries.remove(&pulse_id)
    }

    /// Remove every pulse strictly older than `pulse_id`, oldest first
    pub fn discard_before(&mut self, pulse_id: i64) -> Vec<PulseBundle<M>> {
        let keep = self.entries.split_off(&pulse_id);
        std::mem::replace(&mut self.entries, keep).into_values().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            buffered_pulses: self.entries.len(),
            oldest_pulse_id: self.entries.keys().next().copied(),
            newest_pulse_id: self.entries.keys().next_back().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_is_smallest_pulse() {
        let mut buffer = PulseBuffer::new();
        buffer.insert(7, "A".into(), 0u8, 0);
        buffer.insert(3, "A".into(), 0u8, 0);
        buffer.insert(5, "A".into(), 0u8, 0);

        assert_eq!(buffer.oldest().map(PulseBundle::pulse_id), Some(3));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_insert_accumulates_channels() {
        let mut buffer = PulseBuffer::new();
        let first = buffer.insert(1, "A".into(), 1u8, 10);
        let second = buffer.insert(1, "B".into(), 2u8, 20);
        let again = buffer.insert(1, "B".into(), 3u8, 30);

        assert_eq!(first.filled, 1);
        assert_eq!(second.filled, 2);
        assert_eq!(again, Inserted { filled: 2, replaced: true });

        let bundle = buffer.oldest().unwrap();
        assert_eq!(bundle.created_at_ms(), 10);
        assert_eq!(bundle.age_ms(25), 15);
        assert!(bundle.contains("B"));
    }

    #[test]
    fn test_remove_only_once() {
        let mut buffer = PulseBuffer::new();
        buffer.insert(1, "A".into(), 0u8, 0);

        assert!(buffer.remove(1).is_some());
        assert!(buffer.remove(1).is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_discard_before() {
        let mut buffer = PulseBuffer::new();
        for pulse in [1, 2, 4, 6] {
            buffer.insert(pulse, "A".into(), 0u8, 0);
        }

        let discarded: Vec<i64> = buffer
            .discard_before(4)
            .iter()
            .map(PulseBundle::pulse_id)
            .collect();
        assert_eq!(discarded, vec![1, 2]);
        assert_eq!(
            buffer.stats(),
            BufferStats {
                buffered_pulses: 2,
                oldest_pulse_id: Some(4),
                newest_pulse_id: Some(6),
            }
        );
    }
}
