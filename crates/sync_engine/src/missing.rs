//! Missing-pulse detection.
//!
//! Decides whether some schedule still expects a pulse strictly between the
//! last resolved boundary and a candidate pulse. A candidate must not be
//! resolved while such a pulse may still arrive.

use contracts::ChannelSchedule;

use crate::schedule::is_aligned;

/// Whether any schedule has an expected pulse strictly between
/// `last_pulse_id` and `next_pulse_id`.
///
/// Pure function of its arguments. Always `false` when the two ids are
/// adjacent, identical or reversed.
pub fn is_pulse_missing(
    last_pulse_id: i64,
    next_pulse_id: i64,
    schedules: &[ChannelSchedule],
) -> bool {
    let last = i128::from(last_pulse_id);
    let next = i128::from(next_pulse_id);
    let gap = next - last;
    if gap <= 1 {
        return false;
    }

    schedules
        .iter()
        .any(|schedule| is_missing_for(schedule, last_pulse_id, next_pulse_id, gap))
}

fn is_missing_for(schedule: &ChannelSchedule, last_pulse_id: i64, next_pulse_id: i64, gap: i128) -> bool {
    let period = i128::from(schedule.period);
    let phase = i128::from(schedule.phase);

    if gap > period {
        return true;
    }

    let last_hop = (i128::from(last_pulse_id) + period - phase).div_euclid(period);
    let next_hop = (i128::from(next_pulse_id) + period - phase).div_euclid(period);

    match next_hop - last_hop {
        hops if hops > 1 => true,
        1 => {
            !is_aligned(last_pulse_id, schedule.period, schedule.phase)
                && !is_aligned(next_pulse_id, schedule.period, schedule.phase)
        }
        _ => false,
    }
}
