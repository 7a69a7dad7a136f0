//! Connection event handler
//!
//! Implements every listener capability set for a session. Connect and
//! produce requests are turned into signaling round trips; a `failed`
//! connection state tears the whole session down. Entity hooks only log,
//! except inbound chat text which is surfaced on the event bus.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

use super::SessionCore;
use crate::error::{BroadcastError, Result};
use crate::events::{SessionEvent, StopReason};
use crate::media::MediaKind;
use crate::registry::{DataConsumer, DataProducer, Producer};
use crate::signaling::{
    parse_resource_id, DataProducerRequest, ProducerRequest, SctpStreamParameters,
    SignalingRequest,
};
use crate::transport::{
    ConnectionState, DataConsumerListener, DataProducerListener, PendingRequest,
    ProducerListener, SendTransportListener, TransportListener,
};

/// Listener shared by both transports and all entities of one session
pub struct ConnectionHandler {
    core: Weak<SessionCore>,
}

impl ConnectionHandler {
    pub(crate) fn new(core: Weak<SessionCore>) -> Self {
        Self { core }
    }

    fn core(&self) -> Result<Arc<SessionCore>> {
        self.core
            .upgrade()
            .ok_or_else(|| BroadcastError::InvalidState("session is gone".to_string()))
    }
}

impl SessionCore {
    async fn create_producer(
        &self,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> Result<String> {
        let response = self
            .signal(SignalingRequest::CreateProducer {
                broadcaster_id: self.id.clone(),
                transport_id: transport_id.to_string(),
                body: ProducerRequest {
                    kind,
                    rtp_parameters,
                },
            })
            .await?;
        parse_resource_id(&response, "producer")
    }

    async fn create_data_producer(
        &self,
        transport_id: &str,
        sctp_stream_parameters: SctpStreamParameters,
        label: &str,
        protocol: &str,
    ) -> Result<String> {
        let response = self
            .signal(SignalingRequest::CreateDataProducer {
                broadcaster_id: self.id.clone(),
                transport_id: transport_id.to_string(),
                body: DataProducerRequest {
                    label: label.to_string(),
                    protocol: protocol.to_string(),
                    sctp_stream_parameters,
                },
            })
            .await?;
        parse_resource_id(&response, "data producer")
    }
}

#[async_trait]
impl TransportListener for ConnectionHandler {
    async fn on_connect(
        &self,
        transport_id: &str,
        dtls_parameters: Value,
        pending: PendingRequest<()>,
    ) {
        let result = match self.core() {
            Ok(core) => core.connect_transport(transport_id, dtls_parameters).await,
            Err(e) => Err(e),
        };
        pending.resolve(result);
    }

    async fn on_connection_state_change(&self, transport_id: &str, state: ConnectionState) {
        info!("Transport {} connection state: {}", transport_id, state);

        if state == ConnectionState::Failed {
            error!("Transport {} failed, stopping session", transport_id);
            if let Ok(core) = self.core() {
                core.stop_in_background(StopReason::TransportFailed);
            }
        }
    }
}

#[async_trait]
impl SendTransportListener for ConnectionHandler {
    async fn on_produce(
        &self,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: Value,
        _app_data: Value,
        pending: PendingRequest<String>,
    ) {
        let result = match self.core() {
            Ok(core) => core.create_producer(transport_id, kind, rtp_parameters).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!("Produce {} on transport {} failed: {}", kind, transport_id, e);
        }
        pending.resolve(result);
    }

    async fn on_produce_data(
        &self,
        transport_id: &str,
        sctp_stream_parameters: SctpStreamParameters,
        label: &str,
        protocol: &str,
        _app_data: Value,
        pending: PendingRequest<String>,
    ) {
        let result = match self.core() {
            Ok(core) => {
                core.create_data_producer(transport_id, sctp_stream_parameters, label, protocol)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!("Produce data on transport {} failed: {}", transport_id, e);
        }
        pending.resolve(result);
    }
}

impl ProducerListener for ConnectionHandler {
    fn on_transport_close(&self, producer: &Producer) {
        info!("Producer {} transport closed", producer.id());
    }
}

impl DataProducerListener for ConnectionHandler {
    fn on_open(&self, data_producer: &DataProducer) {
        info!("Data producer {} open", data_producer.id());
    }

    fn on_close(&self, data_producer: &DataProducer) {
        info!("Data producer {} closed", data_producer.id());
    }

    fn on_buffered_amount_change(&self, data_producer: &DataProducer, amount: u64) {
        debug!(
            "Data producer {} buffered amount: {}",
            data_producer.id(),
            amount
        );
    }

    fn on_transport_close(&self, data_producer: &DataProducer) {
        info!("Data producer {} transport closed", data_producer.id());
    }
}

impl DataConsumerListener for ConnectionHandler {
    fn on_connecting(&self, data_consumer: &DataConsumer) {
        debug!("Data consumer {} connecting", data_consumer.id());
    }

    fn on_open(&self, data_consumer: &DataConsumer) {
        info!("Data consumer {} open", data_consumer.id());
    }

    fn on_closing(&self, data_consumer: &DataConsumer) {
        debug!("Data consumer {} closing", data_consumer.id());
    }

    fn on_close(&self, data_consumer: &DataConsumer) {
        info!("Data consumer {} closed", data_consumer.id());
    }

    fn on_transport_close(&self, data_consumer: &DataConsumer) {
        info!("Data consumer {} transport closed", data_consumer.id());
    }

    fn on_message(&self, data_consumer: &DataConsumer, payload: &[u8]) {
        let Ok(core) = self.core() else {
            return;
        };

        let is_chat = data_consumer.label() == core.config.read().data_label;
        if !is_chat {
            debug!(
                "Ignoring {} byte message on data consumer {} (label={})",
                payload.len(),
                data_consumer.id(),
                data_consumer.label()
            );
            return;
        }

        let text = match std::str::from_utf8(payload) {
            Ok(text) => text.to_string(),
            Err(e) => {
                warn!(
                    "Dropping non-UTF-8 chat message on data consumer {}: {}",
                    data_consumer.id(),
                    e
                );
                return;
            }
        };
        info!("Chat message on data consumer {}: {}", data_consumer.id(), text);
        core.events.publish(SessionEvent::ChatMessage {
            data_consumer_id: data_consumer.id().to_string(),
            text,
            received_at: chrono::Utc::now(),
        });
    }
}
