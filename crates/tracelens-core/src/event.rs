//! Push events delivered over the two WebSocket channels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::model::{Alert, MetricsSummary};

/// A subscribable push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Metrics,
    Alerts,
}

impl Channel {
    /// Path of the channel relative to the API base.
    pub fn path(&self) -> &'static str {
        match self {
            Channel::Metrics => "/metrics/ws",
            Channel::Alerts => "/alerts/ws",
        }
    }

    /// Whether `event` may legitimately arrive on this channel.
    pub fn accepts(&self, event: &ChannelEvent) -> bool {
        matches!(
            (self, event),
            (Channel::Metrics, ChannelEvent::MetricsUpdate(_)) | (Channel::Alerts, ChannelEvent::NewAlert(_))
        )
    }

    /// Decodes a text frame and checks it belongs to this channel.
    pub fn decode(&self, text: &str) -> Result<ChannelEvent, ClientError> {
        let event: ChannelEvent = serde_json::from_str(text)?;
        if !self.accepts(&event) {
            return Err(ClientError::Decode(format!(
                "{} event on {self} channel",
                event.kind()
            )));
        }
        Ok(event)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Metrics => f.write_str("metrics"),
            Channel::Alerts => f.write_str("alerts"),
        }
    }
}

/// `{ "type": ..., "data": ... }` push payload. Exactly two variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChannelEvent {
    MetricsUpdate(MetricsSummary),
    NewAlert(Alert),
}

impl ChannelEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelEvent::MetricsUpdate(_) => "metrics_update",
            ChannelEvent::NewAlert(_) => "new_alert",
        }
    }

    /// Channel this event travels on.
    pub fn channel(&self) -> Channel {
        match self {
            ChannelEvent::MetricsUpdate(_) => Channel::Metrics,
            ChannelEvent::NewAlert(_) => Channel::Alerts,
        }
    }

    pub fn to_json(&self) -> Result<String, ClientError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One item of a channel subscription stream.
///
/// The stream ending means the channel closed cleanly.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelFrame {
    /// The handshake completed; emitted once, before any event.
    Opened,
    Event(ChannelEvent),
    /// A frame that failed to decode or arrived on the wrong channel.
    Malformed(String),
    /// Transport failure. The stream ends after this frame.
    Failed(String),
}
