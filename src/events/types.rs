//! Session event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transport::{ConnectionState, TransportDirection};

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `stop()` called by the owner
    Requested,
    /// A transport reported `failed`
    TransportFailed,
    /// The broadcaster was dropped
    Dropped,
}

/// Session event
///
/// Serialized as:
/// ```json
/// {
///   "event": "transport.state_changed",
///   "data": { "transport_id": "...", "direction": "send", "state": "connected" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SessionEvent {
    /// A transport changed connection state
    #[serde(rename = "transport.state_changed")]
    ConnectionStateChanged {
        transport_id: String,
        direction: TransportDirection,
        state: ConnectionState,
    },

    /// Text received on the chat data consumer
    #[serde(rename = "data.chat_message")]
    ChatMessage {
        data_consumer_id: String,
        text: String,
        received_at: DateTime<Utc>,
    },

    /// Session torn down
    #[serde(rename = "session.stopped")]
    Stopped { reason: StopReason },
}

impl SessionEvent {
    /// Get the event name (for filtering/routing)
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ConnectionStateChanged { .. } => "transport.state_changed",
            Self::ChatMessage { .. } => "data.chat_message",
            Self::Stopped { .. } => "session.stopped",
        }
    }

    /// Check if event name matches a topic pattern
    ///
    /// Supports `*`, prefix wildcards such as `transport.*`, and exact names.
    pub fn matches_topic(&self, topic: &str) -> bool {
        if topic == "*" {
            return true;
        }

        let event_name = self.event_name();

        if topic.ends_with(".*") {
            let prefix = topic.trim_end_matches(".*");
            event_name.starts_with(prefix)
        } else {
            event_name == topic
        }
    }
}
