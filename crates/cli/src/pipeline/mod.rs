//! Synthetic replay through the synchronizer.

mod replay;
mod stats;

pub use replay::{Replay, ReplayConfig};
pub use stats::ReplayStats;
