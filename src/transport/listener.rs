//! Listener capability sets
//!
//! Each transport and entity talks to its owner through one of these
//! narrow traits. A single coordinating object may implement all five.

use async_trait::async_trait;
use serde_json::Value;

use super::pending::PendingRequest;
use super::ConnectionState;
use crate::media::MediaKind;
use crate::registry::{DataConsumer, DataProducer, Producer};
use crate::signaling::SctpStreamParameters;

/// Callbacks shared by send and receive transports
#[async_trait]
pub trait TransportListener: Send + Sync {
    /// Fired once, on the first produce/consume, with the local DTLS parameters
    async fn on_connect(
        &self,
        transport_id: &str,
        dtls_parameters: Value,
        pending: PendingRequest<()>,
    );

    async fn on_connection_state_change(&self, transport_id: &str, state: ConnectionState);
}

/// Callbacks specific to the send transport
#[async_trait]
pub trait SendTransportListener: TransportListener {
    /// Resolve with the server-assigned producer id
    async fn on_produce(
        &self,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: Value,
        app_data: Value,
        pending: PendingRequest<String>,
    );

    /// Resolve with the server-assigned data producer id
    async fn on_produce_data(
        &self,
        transport_id: &str,
        sctp_stream_parameters: SctpStreamParameters,
        label: &str,
        protocol: &str,
        app_data: Value,
        pending: PendingRequest<String>,
    );
}

pub trait ProducerListener: Send + Sync {
    fn on_transport_close(&self, producer: &Producer);
}

pub trait DataProducerListener: Send + Sync {
    fn on_open(&self, data_producer: &DataProducer);

    fn on_close(&self, data_producer: &DataProducer);

    fn on_buffered_amount_change(&self, data_producer: &DataProducer, amount: u64);

    fn on_transport_close(&self, data_producer: &DataProducer);
}

pub trait DataConsumerListener: Send + Sync {
    fn on_connecting(&self, data_consumer: &DataConsumer);

    fn on_open(&self, data_consumer: &DataConsumer);

    fn on_closing(&self, data_consumer: &DataConsumer);

    fn on_close(&self, data_consumer: &DataConsumer);

    fn on_transport_close(&self, data_consumer: &DataConsumer);

    fn on_message(&self, data_consumer: &DataConsumer, payload: &[u8]);
}
