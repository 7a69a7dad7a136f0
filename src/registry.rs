//! Producer/consumer registry
//!
//! Tracks the media producers, the single data producer and the single
//! data consumer of a session. Close/pause/resume are best-effort: they
//! are idempotent and log engine failures instead of returning them.

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{BroadcastError, Result};
use crate::media::{MediaKind, TrackHandle};
use crate::signaling::SctpStreamParameters;
use crate::transport::{
    DataConsumerListener, DataProducerListener, EngineTransport, ProducerListener,
};

/// Ready state of a data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Media producer on the send transport
pub struct Producer {
    id: String,
    local_id: String,
    kind: MediaKind,
    track: TrackHandle,
    rtp_parameters: Value,
    encodings: usize,
    app_data: Value,
    paused: AtomicBool,
    closed: AtomicBool,
    max_spatial_layer: Mutex<Option<u8>>,
    engine: Arc<dyn EngineTransport>,
    listener: Arc<dyn ProducerListener>,
}

/// Everything needed to build a [`Producer`] once the server assigned its id
pub(crate) struct ProducerInit {
    pub id: String,
    pub local_id: String,
    pub track: TrackHandle,
    pub rtp_parameters: Value,
    pub encodings: usize,
    pub app_data: Value,
}

impl Producer {
    pub(crate) fn new(
        init: ProducerInit,
        engine: Arc<dyn EngineTransport>,
        listener: Arc<dyn ProducerListener>,
    ) -> Self {
        Self {
            id: init.id,
            local_id: init.local_id,
            kind: init.track.kind,
            track: init.track,
            rtp_parameters: init.rtp_parameters,
            encodings: init.encodings.max(1),
            app_data: init.app_data,
            paused: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            max_spatial_layer: Mutex::new(None),
            engine,
            listener,
        }
    }

    /// Server-assigned producer id
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn track(&self) -> &TrackHandle {
        &self.track
    }

    pub fn rtp_parameters(&self) -> &Value {
        &self.rtp_parameters
    }

    pub fn app_data(&self) -> &Value {
        &self.app_data
    }

    /// Number of encoding layers (1 without simulcast)
    pub fn encodings(&self) -> usize {
        self.encodings
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_spatial_layer(&self) -> Option<u8> {
        *self.max_spatial_layer.lock()
    }

    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.engine.stop_sending(&self.local_id).await {
            warn!("Failed to stop sending for producer {}: {}", self.id, e);
        }
        info!("Producer {} ({}) closed", self.id, self.kind);
    }

    pub async fn pause(&self) {
        if self.is_closed() || self.paused.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.engine.pause_sending(&self.local_id).await {
            warn!("Failed to pause producer {}: {}", self.id, e);
            self.paused.store(false, Ordering::SeqCst);
            return;
        }
        debug!("Producer {} paused", self.id);
    }

    pub async fn resume(&self) {
        if self.is_closed() || !self.paused.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.engine.resume_sending(&self.local_id).await {
            warn!("Failed to resume producer {}: {}", self.id, e);
            self.paused.store(true, Ordering::SeqCst);
            return;
        }
        debug!("Producer {} resumed", self.id);
    }

    /// Cap the highest simulcast layer the engine may send
    pub async fn set_max_spatial_layer(&self, layer: u8) -> Result<()> {
        if self.is_closed() {
            return Err(BroadcastError::InvalidState(format!(
                "producer {} is closed",
                self.id
            )));
        }
        if usize::from(layer) >= self.encodings {
            return Err(BroadcastError::InvalidState(format!(
                "spatial layer {} out of range for {} encoding(s)",
                layer, self.encodings
            )));
        }
        self.engine
            .set_max_spatial_layer(&self.local_id, layer)
            .await?;
        *self.max_spatial_layer.lock() = Some(layer);
        Ok(())
    }

    pub(crate) fn transport_closed(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.listener.on_transport_close(self);
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("encodings", &self.encodings)
            .field("paused", &self.is_paused())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Outgoing data channel on the send transport
pub struct DataProducer {
    id: String,
    label: String,
    protocol: String,
    sctp_stream_parameters: SctpStreamParameters,
    app_data: Value,
    ready_state: RwLock<DataChannelState>,
    buffered_amount: AtomicU64,
    closed: AtomicBool,
    engine: Arc<dyn EngineTransport>,
    listener: Arc<dyn DataProducerListener>,
}

impl DataProducer {
    pub(crate) fn new(
        id: String,
        label: String,
        protocol: String,
        sctp_stream_parameters: SctpStreamParameters,
        app_data: Value,
        engine: Arc<dyn EngineTransport>,
        listener: Arc<dyn DataProducerListener>,
    ) -> Self {
        Self {
            id,
            label,
            protocol,
            sctp_stream_parameters,
            app_data,
            ready_state: RwLock::new(DataChannelState::Connecting),
            buffered_amount: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            engine,
            listener,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn stream_id(&self) -> u16 {
        self.sctp_stream_parameters.stream_id
    }

    pub fn sctp_stream_parameters(&self) -> &SctpStreamParameters {
        &self.sctp_stream_parameters
    }

    pub fn app_data(&self) -> &Value {
        &self.app_data
    }

    pub fn ready_state(&self) -> DataChannelState {
        *self.ready_state.read()
    }

    pub fn buffered_amount(&self) -> u64 {
        self.buffered_amount.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn send(&self, payload: Bytes) -> Result<()> {
        if self.is_closed() {
            return Err(BroadcastError::InvalidState(format!(
                "data producer {} is closed",
                self.id
            )));
        }
        self.engine.send_data(self.stream_id(), payload).await
    }

    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.ready_state.write() = DataChannelState::Closed;
        if let Err(e) = self.engine.close_data_channel(self.stream_id()).await {
            warn!("Failed to close data producer {}: {}", self.id, e);
        }
        info!("Data producer {} closed", self.id);
    }

    pub(crate) fn opened(&self) {
        *self.ready_state.write() = DataChannelState::Open;
        self.listener.on_open(self);
    }

    pub(crate) fn closed_by_remote(&self) {
        self.closed.store(true, Ordering::SeqCst);
        *self.ready_state.write() = DataChannelState::Closed;
        self.listener.on_close(self);
    }

    pub(crate) fn buffered_amount_changed(&self, amount: u64) {
        self.buffered_amount.store(amount, Ordering::SeqCst);
        self.listener.on_buffered_amount_change(self, amount);
    }

    pub(crate) fn transport_closed(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.ready_state.write() = DataChannelState::Closed;
        self.listener.on_transport_close(self);
    }
}

impl std::fmt::Debug for DataProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProducer")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("stream_id", &self.stream_id())
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

/// Incoming data channel on the receive transport
pub struct DataConsumer {
    id: String,
    data_producer_id: String,
    label: String,
    protocol: String,
    stream_id: u16,
    app_data: Value,
    ready_state: RwLock<DataChannelState>,
    closed: AtomicBool,
    engine: Arc<dyn EngineTransport>,
    listener: Arc<dyn DataConsumerListener>,
}

/// Fields of a [`DataConsumer`] known once the server created it
pub(crate) struct DataConsumerInit {
    pub id: String,
    pub data_producer_id: String,
    pub label: String,
    pub protocol: String,
    pub stream_id: u16,
    pub app_data: Value,
}

impl DataConsumer {
    pub(crate) fn new(
        init: DataConsumerInit,
        engine: Arc<dyn EngineTransport>,
        listener: Arc<dyn DataConsumerListener>,
    ) -> Self {
        Self {
            id: init.id,
            data_producer_id: init.data_producer_id,
            label: init.label,
            protocol: init.protocol,
            stream_id: init.stream_id,
            app_data: init.app_data,
            ready_state: RwLock::new(DataChannelState::Connecting),
            closed: AtomicBool::new(false),
            engine,
            listener,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data_producer_id(&self) -> &str {
        &self.data_producer_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn stream_id(&self) -> u16 {
        self.stream_id
    }

    pub fn app_data(&self) -> &Value {
        &self.app_data
    }

    pub fn ready_state(&self) -> DataChannelState {
        *self.ready_state.read()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.ready_state.write() = DataChannelState::Closed;
        if let Err(e) = self.engine.close_data_channel(self.stream_id).await {
            warn!("Failed to close data consumer {}: {}", self.id, e);
        }
        info!("Data consumer {} closed", self.id);
    }

    pub(crate) fn connecting(&self) {
        *self.ready_state.write() = DataChannelState::Connecting;
        self.listener.on_connecting(self);
    }

    pub(crate) fn opened(&self) {
        *self.ready_state.write() = DataChannelState::Open;
        self.listener.on_open(self);
    }

    pub(crate) fn closing(&self) {
        *self.ready_state.write() = DataChannelState::Closing;
        self.listener.on_closing(self);
    }

    pub(crate) fn closed_by_remote(&self) {
        self.closed.store(true, Ordering::SeqCst);
        *self.ready_state.write() = DataChannelState::Closed;
        self.listener.on_close(self);
    }

    pub(crate) fn message(&self, payload: &[u8]) {
        if self.is_closed() {
            debug!("Dropping message on closed data consumer {}", self.id);
            return;
        }
        self.listener.on_message(self, payload);
    }

    pub(crate) fn transport_closed(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.ready_state.write() = DataChannelState::Closed;
        self.listener.on_transport_close(self);
    }
}

impl std::fmt::Debug for DataConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataConsumer")
            .field("id", &self.id)
            .field("data_producer_id", &self.data_producer_id)
            .field("label", &self.label)
            .field("stream_id", &self.stream_id)
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

/// Per-session set of producers and data channels
#[derive(Default)]
pub struct Registry {
    producers: RwLock<Vec<Arc<Producer>>>,
    data_producer: RwLock<Option<Arc<DataProducer>>>,
    data_consumer: RwLock<Option<Arc<DataConsumer>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_producer(&self, producer: Arc<Producer>) {
        self.producers.write().push(producer);
    }

    pub fn producers(&self) -> Vec<Arc<Producer>> {
        self.producers.read().clone()
    }

    pub fn producer(&self, id: &str) -> Option<Arc<Producer>> {
        self.producers.read().iter().find(|p| p.id() == id).cloned()
    }

    pub(crate) fn set_data_producer(&self, data_producer: Arc<DataProducer>) -> Result<()> {
        let mut slot = self.data_producer.write();
        if slot.is_some() {
            return Err(BroadcastError::InvalidState(
                "session already has a data producer".to_string(),
            ));
        }
        *slot = Some(data_producer);
        Ok(())
    }

    pub fn data_producer(&self) -> Option<Arc<DataProducer>> {
        self.data_producer.read().clone()
    }

    pub(crate) fn set_data_consumer(&self, data_consumer: Arc<DataConsumer>) -> Result<()> {
        let mut slot = self.data_consumer.write();
        if slot.is_some() {
            return Err(BroadcastError::InvalidState(
                "session already has a data consumer".to_string(),
            ));
        }
        *slot = Some(data_consumer);
        Ok(())
    }

    pub fn data_consumer(&self) -> Option<Arc<DataConsumer>> {
        self.data_consumer.read().clone()
    }

    pub async fn close_producer(&self, id: &str) {
        match self.producer(id) {
            Some(producer) => producer.close().await,
            None => warn!("close requested for unknown producer {}", id),
        }
    }

    pub async fn pause_producer(&self, id: &str) {
        match self.producer(id) {
            Some(producer) => producer.pause().await,
            None => warn!("pause requested for unknown producer {}", id),
        }
    }

    pub async fn resume_producer(&self, id: &str) {
        match self.producer(id) {
            Some(producer) => producer.resume().await,
            None => warn!("resume requested for unknown producer {}", id),
        }
    }

    /// Close every tracked entity
    pub async fn close_all(&self) {
        if let Some(dc) = self.data_consumer() {
            dc.close().await;
        }
        if let Some(dp) = self.data_producer() {
            dp.close().await;
        }
        for producer in self.producers() {
            producer.close().await;
        }
    }

    /// Mark every tracked entity closed after its transport went away
    pub(crate) fn transport_closed(&self) {
        if let Some(dc) = self.data_consumer() {
            dc.transport_closed();
        }
        if let Some(dp) = self.data_producer() {
            dp.transport_closed();
        }
        for producer in self.producers() {
            producer.transport_closed();
        }
    }
}
