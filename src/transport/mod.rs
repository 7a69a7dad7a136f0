//! Send/receive transports
//!
//! A transport pairs a server-side WebRTC transport (created through
//! signaling) with a local [`engine::EngineTransport`]. The local half is
//! an opaque collaborator that owns ICE/DTLS/SCTP; this module only runs
//! the negotiation around it:
//!
//! ```text
//! produce()/consume_data()
//!        |
//!        +-- first call --> TransportListener::on_connect  (DTLS to server)
//!        |
//!        +-- engine.start_sending / open_data_channel
//!        |
//!        +-- SendTransportListener::on_produce(_data)  (server assigns id)
//!        v
//! Producer / DataProducer / DataConsumer
//! ```

pub mod base;
pub mod engine;
pub mod listener;
pub mod pending;
pub mod recv;
pub mod send;
pub mod types;

pub use base::TransportBase;
pub use engine::{EngineEvent, EngineTransport, EventDispatch, EventSink, LocalSender, TransportEngine};
pub use listener::{
    DataConsumerListener, DataProducerListener, ProducerListener, SendTransportListener,
    TransportListener,
};
pub use pending::{PendingReply, PendingRequest};
pub use recv::{ConsumeDataOptions, RecvTransport};
pub use send::{DataProducerOptions, ProduceOptions, SendTransport};
pub use types::{CodecOptions, RtpEncodingParameters};

use serde::{Deserialize, Serialize};

/// Direction of a transport within the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportDirection {
    Send,
    Recv,
}

impl std::fmt::Display for TransportDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportDirection::Send => write!(f, "send"),
            TransportDirection::Recv => write!(f, "recv"),
        }
    }
}

/// Transport connection state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::New => "new",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConnectionState {
    type Err = crate::error::BroadcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ConnectionState::New),
            "connecting" => Ok(ConnectionState::Connecting),
            "connected" => Ok(ConnectionState::Connected),
            "disconnected" => Ok(ConnectionState::Disconnected),
            "failed" => Ok(ConnectionState::Failed),
            "closed" => Ok(ConnectionState::Closed),
            other => Err(crate::error::BroadcastError::Transport(format!(
                "unknown connection state: {}",
                other
            ))),
        }
    }
}
