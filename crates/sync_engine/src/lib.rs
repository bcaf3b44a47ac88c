//! # Sync Engine
//!
//! Pulse-id message synchronizer for beam-synchronous data acquisition.
//!
//! Responsibilities:
//! - Buffer per-channel values keyed by pulse id
//! - Decide when a pulse is complete for its channel schedules
//! - Hold back pulses that would skip an expected earlier pulse
//! - Evict pulses by buffer size or age
//! - Hand resolved bundles to consumers in increasing pulse order, at most once
//!
//! ## Example
//!
//! ```ignore
//! use sync_engine::{ChannelSchedule, PulseSynchronizer, SynchronizerConfig};
//!
//! let config = SynchronizerConfig::new(vec![
//!     ChannelSchedule::every_pulse("BPM1:X"),
//!     ChannelSchedule::new("CAM1:IMAGE", 10, 0),
//! ]);
//! let sync = PulseSynchronizer::new(config)?;
//! let rx = sync.receiver().unwrap();
//!
//! // Producer threads
//! sync.add_message(message);
//!
//! // Consumer
//! while let Ok(bundle) = rx.recv_blocking() {
//!     // Handle bundle for pulse `bundle.pulse_id`
//! }
//! ```

mod buffer;
mod clock;
mod delivery;
mod engine;
mod missing;
mod schedule;
mod stats;
mod watermark;

pub use buffer::{Inserted, PulseBuffer, PulseBundle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use delivery::BundleReceiver;
pub use engine::{AddOutcome, PulseSynchronizer};
pub use missing::is_pulse_missing;
pub use schedule::{expected_channel_count, is_expected, ScheduleSet};
pub use stats::{SyncStats, SyncStatsSnapshot};
pub use watermark::Watermarks;

// Re-export contracts types
pub use contracts::{
    BufferStats, ChannelMessage, ChannelSchedule, DeliveryMode, PulseMessage, SyncedBundle,
    SynchronizerConfig,
};
