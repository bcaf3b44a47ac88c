//! Channel schedule model.
//!
//! The schedule set is built once from the configuration and never changes
//! afterwards, so it is shared read-only between producer and consumer threads.

use std::collections::HashMap;

use contracts::{validate_channels, ChannelSchedule, ContractError};

/// Whether `pulse_id` is a publishing pulse for `schedule`
#[inline]
pub fn is_expected(schedule: &ChannelSchedule, pulse_id: i64) -> bool {
    is_aligned(pulse_id, schedule.period, schedule.phase)
}

#[inline]
pub(crate) fn is_aligned(pulse_id: i64, period: i64, phase: i64) -> bool {
    (i128::from(pulse_id) - i128::from(phase)).rem_euclid(i128::from(period)) == 0
}

/// Number of schedules expecting a value on `pulse_id`
pub fn expected_channel_count(pulse_id: i64, schedules: &[ChannelSchedule]) -> usize {
    schedules
        .iter()
        .filter(|schedule| is_expected(schedule, pulse_id))
        .count()
}

/// Immutable, validated set of channel schedules with O(1) lookup by name
#[derive(Debug, Clone)]
pub struct ScheduleSet {
    schedules: Vec<ChannelSchedule>,
    by_name: HashMap<String, usize>,
}

impl ScheduleSet {
    /// Build the set, rejecting non-positive periods, out-of-range phases and
    /// duplicate names.
    pub fn new(schedules: Vec<ChannelSchedule>) -> Result<Self, ContractError> {
        validate_channels(&schedules)?;
        let by_name = schedules
            .iter()
            .enumerate()
            .map(|(idx, schedule)| (schedule.name.clone(), idx))
            .collect();

        Ok(Self { schedules, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&ChannelSchedule> {
        self.by_name.get(name).map(|&idx| &self.schedules[idx])
    }

    pub fn as_slice(&self) -> &[ChannelSchedule] {
        &self.schedules
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelSchedule> {
        self.schedules.iter()
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    pub fn expected_channel_count(&self, pulse_id: i64) -> usize {
        expected_channel_count(pulse_id, &self.schedules)
    }

    /// Names of the channels expected on `pulse_id`, in configuration order
    pub fn expected_channels(&self, pulse_id: i64) -> Vec<&str> {
        self.schedules
            .iter()
            .filter(|schedule| is_expected(schedule, pulse_id))
            .map(|schedule| schedule.name.as_str())
            .collect()
    }
}
