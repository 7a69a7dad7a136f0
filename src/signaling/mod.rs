//! Signaling server contract
//!
//! The broadcaster drives a small request/response protocol against the
//! SFU's HTTP API:
//!
//! ```text
//! POST /broadcasters                                   register session
//! POST /broadcasters/{id}/transports                   create transport
//! POST /broadcasters/{id}/transports/{tid}/connect     DTLS parameters
//! POST /broadcasters/{id}/transports/{tid}/producers   create producer
//! POST /broadcasters/{id}/transports/{tid}/produce/data
//! POST /broadcasters/{id}/transports/{tid}/consume/data
//! ```
//!
//! Clients return the raw JSON response. Required-field validation lives
//! in [`types`] so every client implementation gets the same checks.

pub mod http;
pub mod types;

pub use http::HttpSignaling;
pub use types::{
    parse_resource_id, BroadcasterRegistration, DataConsumerDescription, DataConsumerRequest,
    DataProducerRequest, DeviceInfo, ProducerRequest, SctpStreamParameters, TransportDescription,
    TransportRequest,
};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;

/// One signaling round trip
#[derive(Debug, Clone)]
pub enum SignalingRequest {
    CreateBroadcaster(BroadcasterRegistration),
    CreateTransport {
        broadcaster_id: String,
        body: TransportRequest,
    },
    ConnectTransport {
        broadcaster_id: String,
        transport_id: String,
        dtls_parameters: Value,
    },
    CreateProducer {
        broadcaster_id: String,
        transport_id: String,
        body: ProducerRequest,
    },
    CreateDataProducer {
        broadcaster_id: String,
        transport_id: String,
        body: DataProducerRequest,
    },
    CreateDataConsumer {
        broadcaster_id: String,
        transport_id: String,
        body: DataConsumerRequest,
    },
}

impl SignalingRequest {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateBroadcaster(_) => "create broadcaster",
            Self::CreateTransport { .. } => "create transport",
            Self::ConnectTransport { .. } => "connect transport",
            Self::CreateProducer { .. } => "create producer",
            Self::CreateDataProducer { .. } => "create data producer",
            Self::CreateDataConsumer { .. } => "create data consumer",
        }
    }

    /// Path relative to the signaling base URL
    pub fn path(&self) -> String {
        match self {
            Self::CreateBroadcaster(_) => "/broadcasters".to_string(),
            Self::CreateTransport { broadcaster_id, .. } => {
                format!("/broadcasters/{}/transports", broadcaster_id)
            }
            Self::ConnectTransport {
                broadcaster_id,
                transport_id,
                ..
            } => format!(
                "/broadcasters/{}/transports/{}/connect",
                broadcaster_id, transport_id
            ),
            Self::CreateProducer {
                broadcaster_id,
                transport_id,
                ..
            } => format!(
                "/broadcasters/{}/transports/{}/producers",
                broadcaster_id, transport_id
            ),
            Self::CreateDataProducer {
                broadcaster_id,
                transport_id,
                ..
            } => format!(
                "/broadcasters/{}/transports/{}/produce/data",
                broadcaster_id, transport_id
            ),
            Self::CreateDataConsumer {
                broadcaster_id,
                transport_id,
                ..
            } => format!(
                "/broadcasters/{}/transports/{}/consume/data",
                broadcaster_id, transport_id
            ),
        }
    }

    /// JSON body
    pub fn body(&self) -> Result<Value> {
        let body = match self {
            Self::CreateBroadcaster(body) => serde_json::to_value(body)?,
            Self::CreateTransport { body, .. } => serde_json::to_value(body)?,
            Self::ConnectTransport {
                dtls_parameters, ..
            } => json!({ "dtlsParameters": dtls_parameters }),
            Self::CreateProducer { body, .. } => serde_json::to_value(body)?,
            Self::CreateDataProducer { body, .. } => serde_json::to_value(body)?,
            Self::CreateDataConsumer { body, .. } => serde_json::to_value(body)?,
        };
        Ok(body)
    }
}

/// Request function against the signaling server
///
/// Implementations resolve each request exactly once and report transport
/// failures and non-success statuses as `BroadcastError::Signaling`.
#[async_trait]
pub trait SignalingClient: Send + Sync {
    async fn request(&self, request: SignalingRequest) -> Result<Value>;
}
