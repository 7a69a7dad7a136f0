//! Broadcaster session
//!
//! A [`Broadcaster`] registers itself with the SFU, opens one send and one
//! receive transport, produces audio/video plus a data channel, and keeps a
//! heartbeat running on that channel until stopped.
//!
//! Start sequence:
//!
//! ```text
//! load device caps -> POST /broadcasters -> send transport
//!   -> audio producer -> video producer -> data producer -> heartbeat
//!   -> recv transport -> data consumer
//! ```
//!
//! Stop cancels the heartbeat and waits for it to exit, closes the receive
//! then the send transport, and finally shuts the media context down. A
//! transport reporting `failed` triggers the same teardown on its own task,
//! since the report may arrive from inside the heartbeat's send. Setup steps
//! still in flight when teardown begins close what they created and fail.

mod handler;
mod heartbeat;
mod transports;

pub use handler::ConnectionHandler;
pub use heartbeat::heartbeat_message;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BroadcasterConfig;
use crate::device::Device;
use crate::error::{BroadcastError, Result};
use crate::events::{EventBus, SessionEvent, StopReason};
use crate::media::{MediaContext, MediaKind};
use crate::registry::{DataConsumer, DataProducer, Registry};
use crate::signaling::{
    BroadcasterRegistration, DeviceInfo, HttpSignaling, SignalingClient, SignalingRequest,
};
use crate::transport::{
    EngineEvent, EventDispatch, RecvTransport, SendTransport, TransportDirection,
    TransportEngine,
};

use heartbeat::Heartbeat;
use transports::TransportPair;

/// One broadcaster session against an SFU
pub struct Broadcaster {
    core: Arc<SessionCore>,
}

impl Broadcaster {
    /// Session that talks to the server over HTTP once started
    pub fn new(engine: Arc<dyn TransportEngine>, media: MediaContext) -> Self {
        Self::build(engine, media, None)
    }

    /// Session using a caller-provided signaling client
    pub fn with_signaling(
        engine: Arc<dyn TransportEngine>,
        media: MediaContext,
        signaling: Arc<dyn SignalingClient>,
    ) -> Self {
        Self::build(engine, media, Some(signaling))
    }

    fn build(
        engine: Arc<dyn TransportEngine>,
        media: MediaContext,
        signaling: Option<Arc<dyn SignalingClient>>,
    ) -> Self {
        let device = device_for(engine.as_ref());
        let core = Arc::new_cyclic(|self_ref: &Weak<SessionCore>| SessionCore {
            id: uuid::Uuid::new_v4().to_string(),
            config: RwLock::new(BroadcasterConfig::default()),
            device: RwLock::new(device),
            signaling: RwLock::new(signaling),
            engine,
            media,
            transports: TransportPair::new(),
            registry: Registry::new(),
            heartbeat: Mutex::new(None),
            handler: Arc::new(ConnectionHandler::new(self_ref.clone())),
            events: EventBus::new(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            torn_down: CancellationToken::new(),
            self_ref: self_ref.clone(),
        });
        info!("Broadcaster session created: {}", core.id);
        Self { core }
    }

    /// Session id, stable for the lifetime of the session
    pub fn id(&self) -> &str {
        &self.core.id
    }

    /// Load capabilities, register, and set up both transports
    ///
    /// Runs at most once. On failure the session keeps whatever it had
    /// built so far; call [`Broadcaster::stop`] to release it.
    pub async fn start(
        &self,
        config: BroadcasterConfig,
        router_capabilities: &Value,
    ) -> Result<()> {
        let result = self.core.start(config, router_capabilities).await;
        if let Err(e) = &result {
            error!("Broadcaster {} failed to start: {}", self.core.id, e);
        }
        result
    }

    /// Tear the session down; safe to call any number of times
    pub async fn stop(&self) {
        self.core.stop_with(StopReason::Requested).await
    }

    /// Create the send transport with its producers and start the heartbeat
    pub async fn create_send_transport(
        &self,
        enable_audio: bool,
        use_simulcast: bool,
    ) -> Result<()> {
        self.core
            .create_send_transport(enable_audio, use_simulcast)
            .await
    }

    /// Create the receive transport and the data consumer
    pub async fn create_recv_transport(&self) -> Result<()> {
        self.core.create_recv_transport().await
    }

    /// The send transport, once created
    pub fn send_transport(&self) -> Option<Arc<SendTransport>> {
        self.core.transports.send()
    }

    /// The receive transport, once created
    pub fn recv_transport(&self) -> Option<Arc<RecvTransport>> {
        self.core.transports.recv()
    }

    /// The listener wired into both transports and every entity
    pub fn handler(&self) -> Arc<ConnectionHandler> {
        self.core.handler.clone()
    }

    pub fn registry(&self) -> &Registry {
        &self.core.registry
    }

    pub fn can_produce(&self, kind: MediaKind) -> Result<bool> {
        self.core.device.read().can_produce(kind)
    }

    pub fn is_device_loaded(&self) -> bool {
        self.core.device.read().is_loaded()
    }

    pub fn config(&self) -> BroadcasterConfig {
        self.core.config.read().clone()
    }

    pub fn is_started(&self) -> bool {
        self.core.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.core.stopped.load(Ordering::SeqCst)
    }

    pub fn is_heartbeat_running(&self) -> bool {
        self.core.heartbeat.lock().is_some()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.core.events.subscribe()
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.core.stop_now();
    }
}

/// Shared session state; engine events and listener callbacks reach it
/// through weak references
pub(crate) struct SessionCore {
    id: String,
    config: RwLock<BroadcasterConfig>,
    device: RwLock<Device>,
    signaling: RwLock<Option<Arc<dyn SignalingClient>>>,
    engine: Arc<dyn TransportEngine>,
    media: MediaContext,
    transports: TransportPair,
    registry: Registry,
    heartbeat: Mutex<Option<Heartbeat>>,
    handler: Arc<ConnectionHandler>,
    events: EventBus,
    started: AtomicBool,
    stopped: AtomicBool,
    /// Cancelled once teardown has closed everything
    torn_down: CancellationToken,
    self_ref: Weak<SessionCore>,
}

/// Device restricted to the codecs the engine can encode, if it says
fn device_for(engine: &dyn TransportEngine) -> Device {
    match engine.supported_mime_types() {
        Some(mime_types) => Device::with_supported_mime_types(mime_types),
        None => Device::new(),
    }
}

impl SessionCore {
    async fn start(&self, config: BroadcasterConfig, router_capabilities: &Value) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BroadcastError::InvalidState(
                "broadcaster already started".to_string(),
            ));
        }
        self.ensure_running()?;
        config.validate()?;

        info!(
            "Starting broadcaster {} against {} (audio={}, simulcast={})",
            self.id, config.base_url, config.enable_audio, config.use_simulcast
        );
        *self.config.write() = config.clone();

        let needs_client = self.signaling.read().is_none();
        if needs_client {
            let client = HttpSignaling::new(
                &config.base_url,
                config.verify_ssl,
                config.request_timeout(),
            )?;
            *self.signaling.write() = Some(Arc::new(client));
        }

        self.device.write().load(router_capabilities)?;
        self.register().await?;
        self.create_send_transport(config.enable_audio, config.use_simulcast)
            .await?;
        self.create_recv_transport().await?;

        info!("Broadcaster {} started", self.id);
        Ok(())
    }

    async fn register(&self) -> Result<()> {
        let rtp_capabilities = self.device.read().rtp_capabilities()?.clone();
        let registration = BroadcasterRegistration {
            id: self.id.clone(),
            display_name: self.config.read().display_name.clone(),
            device: DeviceInfo::default(),
            rtp_capabilities,
        };
        self.signal(SignalingRequest::CreateBroadcaster(registration))
            .await?;
        info!("Broadcaster {} registered", self.id);
        Ok(())
    }

    /// One signaling round trip, bounded by the request timeout
    async fn signal(&self, request: SignalingRequest) -> Result<Value> {
        let client = self.signaling.read().clone().ok_or_else(|| {
            BroadcastError::InvalidState("signaling client not configured".to_string())
        })?;
        let name = request.name();
        let timeout = self.request_timeout();
        debug!("Signaling request: {} ({})", name, request.path());

        match tokio::time::timeout(timeout, client.request(request)).await {
            Ok(result) => result,
            Err(_) => Err(BroadcastError::Signaling(format!(
                "{} timed out after {:?}",
                name, timeout
            ))),
        }
    }

    fn request_timeout(&self) -> Duration {
        self.config.read().request_timeout()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(BroadcastError::InvalidState(
                "broadcaster is stopped".to_string(),
            ));
        }
        Ok(())
    }

    fn spawn_heartbeat(&self, data_producer: Arc<DataProducer>) {
        let mut slot = self.heartbeat.lock();
        // Checked under the lock so stop never misses a freshly spawned task
        if self.stopped.load(Ordering::SeqCst) {
            debug!("Session {} stopped, heartbeat not started", self.id);
            return;
        }
        let interval = self.config.read().heartbeat_interval();
        *slot = Some(Heartbeat::spawn(data_producer, interval));
    }

    pub(crate) async fn connect_transport(
        &self,
        transport_id: &str,
        dtls_parameters: Value,
    ) -> Result<()> {
        if self.transports.direction_of(transport_id).is_none() {
            error!(
                "Unknown transport requested to connect: {} (session {})",
                transport_id, self.id
            );
            return Err(BroadcastError::UnknownResource(
                "unknown transport requested to connect".to_string(),
            ));
        }

        self.signal(SignalingRequest::ConnectTransport {
            broadcaster_id: self.id.clone(),
            transport_id: transport_id.to_string(),
            dtls_parameters,
        })
        .await?;
        Ok(())
    }

    /// Tear down and return once teardown has finished, whoever began it
    pub(crate) async fn stop_with(&self, reason: StopReason) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Broadcaster {} already stopping", self.id);
            self.torn_down.cancelled().await;
            return;
        }
        self.teardown(reason).await;
    }

    /// Mark the session stopped now and finish teardown on a separate task
    pub(crate) fn stop_in_background(self: &Arc<Self>, reason: StopReason) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Broadcaster {} already stopping", self.id);
            return;
        }
        let core = self.clone();
        tokio::spawn(async move {
            core.teardown(reason).await;
        });
    }

    async fn teardown(&self, reason: StopReason) {
        info!("Stopping broadcaster {} ({:?})", self.id, reason);

        let heartbeat = self.heartbeat.lock().take();
        if let Some(heartbeat) = heartbeat {
            heartbeat.stop().await;
        }

        self.close_transports();
        self.events.publish(SessionEvent::Stopped { reason });
        self.torn_down.cancel();
        info!("Broadcaster {} stopped", self.id);
    }

    /// Teardown without awaiting the heartbeat's exit
    fn stop_now(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(heartbeat) = self.heartbeat.lock().take() {
            heartbeat.abort();
        }
        self.close_transports();
        self.events.publish(SessionEvent::Stopped {
            reason: StopReason::Dropped,
        });
        self.torn_down.cancel();
        info!("Broadcaster {} dropped", self.id);
    }

    /// Re-check after installing a transport or entity. Teardown may have
    /// swept before the install landed, so sweep again and fail setup.
    fn confirm_running(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            warn!("Broadcaster {} stopped during setup", self.id);
            self.close_transports();
            return Err(BroadcastError::InvalidState(
                "broadcaster stopped during setup".to_string(),
            ));
        }
        Ok(())
    }

    fn close_transports(&self) {
        if let Some(recv) = self.transports.recv() {
            recv.close();
        }
        if let Some(send) = self.transports.send() {
            send.close();
        }
        self.registry.transport_closed();
        self.media.shutdown();
    }

    fn data_producer_on(&self, stream_id: u16) -> Option<Arc<DataProducer>> {
        self.registry
            .data_producer()
            .filter(|dp| dp.stream_id() == stream_id)
    }

    fn data_consumer_on(&self, stream_id: u16) -> Option<Arc<DataConsumer>> {
        self.registry
            .data_consumer()
            .filter(|dc| dc.stream_id() == stream_id)
    }
}

#[async_trait]
impl EventDispatch for SessionCore {
    async fn dispatch(&self, transport_id: &str, event: EngineEvent) {
        let direction = match self.transports.direction_of(transport_id) {
            Some(direction) => direction,
            None => {
                warn!(
                    "Engine event for unknown transport {}: {:?}",
                    transport_id, event
                );
                return;
            }
        };

        match (direction, event) {
            (direction, EngineEvent::ConnectionStateChange(state)) => {
                self.events.publish(SessionEvent::ConnectionStateChanged {
                    transport_id: transport_id.to_string(),
                    direction,
                    state,
                });
                match direction {
                    TransportDirection::Send => {
                        if let Some(transport) = self.transports.send() {
                            transport.base().connection_state_changed(state).await;
                        }
                    }
                    TransportDirection::Recv => {
                        if let Some(transport) = self.transports.recv() {
                            transport.base().connection_state_changed(state).await;
                        }
                    }
                }
            }
            (TransportDirection::Send, EngineEvent::DataChannelOpen { stream_id }) => {
                if let Some(dp) = self.data_producer_on(stream_id) {
                    dp.opened();
                }
            }
            (TransportDirection::Send, EngineEvent::DataChannelClose { stream_id }) => {
                if let Some(dp) = self.data_producer_on(stream_id) {
                    dp.closed_by_remote();
                }
            }
            (TransportDirection::Send, EngineEvent::BufferedAmountChange { stream_id, amount }) => {
                if let Some(dp) = self.data_producer_on(stream_id) {
                    dp.buffered_amount_changed(amount);
                }
            }
            (TransportDirection::Recv, EngineEvent::DataChannelConnecting { stream_id }) => {
                if let Some(dc) = self.data_consumer_on(stream_id) {
                    dc.connecting();
                }
            }
            (TransportDirection::Recv, EngineEvent::DataChannelOpen { stream_id }) => {
                if let Some(dc) = self.data_consumer_on(stream_id) {
                    dc.opened();
                }
            }
            (TransportDirection::Recv, EngineEvent::DataChannelClosing { stream_id }) => {
                if let Some(dc) = self.data_consumer_on(stream_id) {
                    dc.closing();
                }
            }
            (TransportDirection::Recv, EngineEvent::DataChannelClose { stream_id }) => {
                if let Some(dc) = self.data_consumer_on(stream_id) {
                    dc.closed_by_remote();
                }
            }
            (TransportDirection::Recv, EngineEvent::DataMessage { stream_id, payload }) => {
                if let Some(dc) = self.data_consumer_on(stream_id) {
                    dc.message(&payload);
                }
            }
            (direction, event) => {
                debug!(
                    "Ignoring {:?} on {} transport {}",
                    event, direction, transport_id
                );
            }
        }
    }
}
