//! Local transport engine collaborator
//!
//! The engine owns ICE, DTLS, SCTP and RTP. It is created from the
//! server's transport description and reports what happens on the wire
//! back through an [`EventSink`], tagged with the owning transport id and,
//! for data channels, the SCTP stream id.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::debug;

use super::send::DataProducerOptions;
use super::types::{CodecOptions, RtpEncodingParameters};
use super::{ConnectionState, TransportDirection};
use crate::error::Result;
use crate::media::TrackHandle;
use crate::signaling::{SctpStreamParameters, TransportDescription};

/// Local sender created for a track
#[derive(Debug, Clone)]
pub struct LocalSender {
    /// Engine-local sender id (e.g., the transceiver mid)
    pub local_id: String,
    /// RTP parameters to register with the server
    pub rtp_parameters: Value,
}

/// Factory for local transports
#[async_trait]
pub trait TransportEngine: Send + Sync {
    /// MIME types the engine can encode; `None` accepts whatever the router offers
    fn supported_mime_types(&self) -> Option<Vec<String>> {
        None
    }

    async fn create_transport(
        &self,
        direction: TransportDirection,
        description: &TransportDescription,
        events: EventSink,
    ) -> Result<Arc<dyn EngineTransport>>;
}

/// Local half of one WebRTC transport
#[async_trait]
pub trait EngineTransport: Send + Sync {
    /// Local DTLS parameters to send on connect
    fn local_dtls_parameters(&self) -> Value;

    async fn start_sending(
        &self,
        track: &TrackHandle,
        encodings: &[RtpEncodingParameters],
        codec_options: Option<&CodecOptions>,
    ) -> Result<LocalSender>;

    async fn stop_sending(&self, local_id: &str) -> Result<()>;

    async fn pause_sending(&self, local_id: &str) -> Result<()>;

    async fn resume_sending(&self, local_id: &str) -> Result<()>;

    async fn set_max_spatial_layer(&self, local_id: &str, layer: u8) -> Result<()>;

    /// Open an outgoing data channel and return its SCTP stream parameters
    async fn open_data_channel(&self, options: &DataProducerOptions) -> Result<SctpStreamParameters>;

    /// Attach to an incoming data channel announced by the server
    async fn open_data_receiver(&self, stream_id: u16, label: &str, protocol: &str) -> Result<()>;

    async fn send_data(&self, stream_id: u16, payload: Bytes) -> Result<()>;

    async fn close_data_channel(&self, stream_id: u16) -> Result<()>;

    async fn restart_ice(&self, ice_parameters: Value) -> Result<()>;

    async fn update_ice_servers(&self, ice_servers: Value) -> Result<()>;

    /// Tear the transport down; must be idempotent
    fn close(&self);
}

/// Events reported by an engine transport
#[derive(Debug, Clone)]
pub enum EngineEvent {
    ConnectionStateChange(ConnectionState),
    DataChannelConnecting { stream_id: u16 },
    DataChannelOpen { stream_id: u16 },
    DataChannelClosing { stream_id: u16 },
    DataChannelClose { stream_id: u16 },
    BufferedAmountChange { stream_id: u16, amount: u64 },
    DataMessage { stream_id: u16, payload: Bytes },
}

/// Receiver of engine events for a session
#[async_trait]
pub trait EventDispatch: Send + Sync {
    async fn dispatch(&self, transport_id: &str, event: EngineEvent);
}

/// Handle the engine uses to report events for one transport
#[derive(Clone)]
pub struct EventSink {
    transport_id: String,
    target: Weak<dyn EventDispatch>,
}

impl EventSink {
    pub fn new(transport_id: impl Into<String>, target: Weak<dyn EventDispatch>) -> Self {
        Self {
            transport_id: transport_id.into(),
            target,
        }
    }

    pub fn transport_id(&self) -> &str {
        &self.transport_id
    }

    /// Deliver an event; dropped silently once the session is gone
    pub async fn emit(&self, event: EngineEvent) {
        match self.target.upgrade() {
            Some(target) => target.dispatch(&self.transport_id, event).await,
            None => debug!(
                "Dropping engine event for transport {}: session gone",
                self.transport_id
            ),
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("transport_id", &self.transport_id)
            .finish()
    }
}
