//! Decoded per-channel events handed to the synchronizer by the protocol layer.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Key extraction for messages entering the synchronizer.
///
/// The synchronizer never looks at the payload; it only needs to know which
/// channel produced a message and for which pulse.
pub trait PulseMessage {
    /// Name of the channel that published this message
    fn channel_name(&self) -> &str;

    /// Pulse id this message belongs to
    fn pulse_id(&self) -> i64;
}

/// A single decoded channel value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Publishing channel
    pub channel: String,

    /// Pulse id of the acquisition cycle
    pub pulse_id: i64,

    /// Opaque encoded value
    pub payload: Bytes,
}

impl ChannelMessage {
    pub fn new(channel: impl Into<String>, pulse_id: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            channel: channel.into(),
            pulse_id,
            payload: payload.into(),
        }
    }

    /// Message without a payload, handy for tests and synthetic replays
    pub fn empty(channel: impl Into<String>, pulse_id: i64) -> Self {
        Self::new(channel, pulse_id, Bytes::new())
    }
}

impl PulseMessage for ChannelMessage {
    fn channel_name(&self) -> &str {
        &self.channel
    }

    fn pulse_id(&self) -> i64 {
        self.pulse_id
    }
}

impl<M: PulseMessage + ?Sized> PulseMessage for std::sync::Arc<M> {
    fn channel_name(&self) -> &str {
        (**self).channel_name()
    }

    fn pulse_id(&self) -> i64 {
        (**self).pulse_id()
    }
}
