//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend only on this crate, never on each other in reverse.
//!
//! ## Pulse Model
//! - A pulse id is a monotonically increasing `i64` identifying one acquisition cycle
//! - Each channel publishes on the pulses selected by its `(period, phase)` schedule
//! - The synchronizer groups per-channel messages of one pulse into a `SyncedBundle`

mod bundle;
mod config;
mod error;
mod message;

pub use bundle::*;
pub use config::*;
pub use error::*;
pub use message::*;
