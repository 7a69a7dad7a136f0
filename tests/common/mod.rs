/// Shared test utilities for integration tests
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use sfu_broadcaster::error::{BroadcastError, Result};
use sfu_broadcaster::media::{MediaContext, MediaKind, TrackHandle};
use sfu_broadcaster::signaling::{
    SctpStreamParameters, SignalingClient, SignalingRequest, TransportDescription,
};
use sfu_broadcaster::transport::{
    CodecOptions, ConnectionState, DataProducerOptions, EngineEvent, EngineTransport, EventSink,
    LocalSender, RtpEncodingParameters, TransportDirection, TransportEngine,
};
use sfu_broadcaster::{Broadcaster, BroadcasterConfig};

pub const BASE_URL: &str = "https://sfu.test:4443/rooms/demo";

/// Scripted reply for one kind of signaling request
#[allow(dead_code)]
#[derive(Clone)]
pub enum Reply {
    Json(Value),
    Fail(String),
    /// Never answer
    Hang,
}

/// Holds one signaling request until released
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    released: Notify,
}

#[allow(dead_code)]
impl Gate {
    /// Wait until the gated request has arrived
    pub async fn entered(&self) {
        self.entered.notified().await
    }

    pub fn release(&self) {
        self.released.notify_one()
    }
}

/// In-memory signaling server that records every request
#[derive(Default)]
pub struct MockSignaling {
    requests: Mutex<Vec<SignalingRequest>>,
    overrides: Mutex<HashMap<&'static str, Reply>>,
    gates: Mutex<Vec<(&'static str, usize, Arc<Gate>)>>,
    transports: AtomicUsize,
    producers: AtomicUsize,
}

#[allow(dead_code)]
impl MockSignaling {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the default reply for requests named `name`
    pub fn respond(&self, name: &'static str, reply: Reply) {
        self.overrides.lock().insert(name, reply);
    }

    /// Hold the `nth` (1-based) request named `name` until the gate is released
    pub fn gate(&self, name: &'static str, nth: usize) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.lock().push((name, nth, gate.clone()));
        gate
    }

    pub fn requests(&self) -> Vec<SignalingRequest> {
        self.requests.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.requests.lock().iter().map(|r| r.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.name() == name).count()
    }

    pub fn find(&self, name: &str) -> Option<SignalingRequest> {
        self.requests.lock().iter().find(|r| r.name() == name).cloned()
    }

    fn default_reply(&self, request: &SignalingRequest) -> Value {
        match request {
            SignalingRequest::CreateBroadcaster(_) => json!({}),
            SignalingRequest::CreateTransport { .. } => {
                let n = self.transports.fetch_add(1, Ordering::SeqCst) + 1;
                json!({
                    "id": format!("transport-{}", n),
                    "iceParameters": { "usernameFragment": "frag", "password": "secret", "iceLite": true },
                    "iceCandidates": [
                        { "foundation": "udpcandidate", "ip": "10.0.0.1", "port": 40000, "priority": 1076302079, "protocol": "udp", "type": "host" }
                    ],
                    "dtlsParameters": { "role": "auto", "fingerprints": [] },
                    "sctpParameters": { "port": 5000, "OS": 1024, "MIS": 1024, "maxMessageSize": 262144 }
                })
            }
            SignalingRequest::ConnectTransport { .. } => Value::Null,
            SignalingRequest::CreateProducer { .. } => {
                let n = self.producers.fetch_add(1, Ordering::SeqCst) + 1;
                json!({ "id": format!("producer-{}", n) })
            }
            SignalingRequest::CreateDataProducer { .. } => json!({ "id": "data-producer-1" }),
            SignalingRequest::CreateDataConsumer { .. } => {
                json!({ "id": "data-consumer-1", "streamId": 1 })
            }
        }
    }
}

#[async_trait]
impl SignalingClient for MockSignaling {
    async fn request(&self, request: SignalingRequest) -> Result<Value> {
        let name = request.name();
        let seen = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.iter().filter(|r| r.name() == name).count()
        };

        let gate = self
            .gates
            .lock()
            .iter()
            .find(|(gated, nth, _)| *gated == name && *nth == seen)
            .map(|(_, _, gate)| gate.clone());
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.released.notified().await;
        }

        let reply = self.overrides.lock().get(name).cloned();
        match reply {
            Some(Reply::Json(value)) => Ok(value),
            Some(Reply::Fail(message)) => Err(BroadcastError::Signaling(message)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Ok(self.default_reply(&request)),
        }
    }
}

/// What the engine was asked to send for one producer
#[derive(Debug, Clone)]
pub struct StartedSender {
    pub kind: MediaKind,
    pub encodings: Vec<RtpEncodingParameters>,
    pub codec_options: Option<CodecOptions>,
}

/// Fake local transport
pub struct MockTransport {
    pub id: String,
    pub direction: TransportDirection,
    events: EventSink,
    started: Mutex<Vec<StartedSender>>,
    sent: Mutex<Vec<(u16, Bytes)>>,
    receivers: Mutex<Vec<(u16, String)>>,
    next_local_id: AtomicUsize,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    fail_on_send: AtomicBool,
}

#[allow(dead_code)]
impl MockTransport {
    fn new(id: String, direction: TransportDirection, events: EventSink) -> Self {
        Self {
            id,
            direction,
            events,
            started: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            receivers: Mutex::new(Vec::new()),
            next_local_id: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            fail_on_send: AtomicBool::new(false),
        }
    }

    /// Report `failed` from inside the next `send_data` call
    pub fn fail_on_next_send(&self) {
        self.fail_on_send.store(true, Ordering::SeqCst);
    }

    /// Report an event as the real engine would
    pub async fn emit(&self, event: EngineEvent) {
        self.events.emit(event).await
    }

    pub fn started(&self) -> Vec<StartedSender> {
        self.started.lock().clone()
    }

    pub fn sent(&self) -> Vec<(u16, Bytes)> {
        self.sent.lock().clone()
    }

    pub fn sent_text(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|(_, payload)| String::from_utf8_lossy(payload).into_owned())
            .collect()
    }

    pub fn receivers(&self) -> Vec<(u16, String)> {
        self.receivers.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineTransport for MockTransport {
    fn local_dtls_parameters(&self) -> Value {
        json!({
            "role": "client",
            "fingerprints": [{ "algorithm": "sha-256", "value": "AB:CD:EF" }]
        })
    }

    async fn start_sending(
        &self,
        track: &TrackHandle,
        encodings: &[RtpEncodingParameters],
        codec_options: Option<&CodecOptions>,
    ) -> Result<LocalSender> {
        let local_id = self.next_local_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.started.lock().push(StartedSender {
            kind: track.kind,
            encodings: encodings.to_vec(),
            codec_options: codec_options.cloned(),
        });

        let encodings = if encodings.is_empty() {
            json!([{}])
        } else {
            serde_json::to_value(encodings)?
        };
        Ok(LocalSender {
            rtp_parameters: json!({ "mid": local_id, "codecs": [], "encodings": encodings }),
            local_id,
        })
    }

    async fn stop_sending(&self, _local_id: &str) -> Result<()> {
        Ok(())
    }

    async fn pause_sending(&self, _local_id: &str) -> Result<()> {
        Ok(())
    }

    async fn resume_sending(&self, _local_id: &str) -> Result<()> {
        Ok(())
    }

    async fn set_max_spatial_layer(&self, _local_id: &str, _layer: u8) -> Result<()> {
        Ok(())
    }

    async fn open_data_channel(&self, options: &DataProducerOptions) -> Result<SctpStreamParameters> {
        Ok(SctpStreamParameters {
            stream_id: 0,
            ordered: options.ordered,
            max_packet_life_time: options.max_packet_life_time,
            max_retransmits: options.max_retransmits,
        })
    }

    async fn open_data_receiver(&self, stream_id: u16, label: &str, _protocol: &str) -> Result<()> {
        self.receivers.lock().push((stream_id, label.to_string()));
        Ok(())
    }

    async fn send_data(&self, stream_id: u16, payload: Bytes) -> Result<()> {
        if self.fail_on_send.swap(false, Ordering::SeqCst) {
            self.events
                .emit(EngineEvent::ConnectionStateChange(ConnectionState::Failed))
                .await;
        }
        if self.is_closed() {
            return Err(BroadcastError::Transport("transport closed".to_string()));
        }
        self.sent.lock().push((stream_id, payload));
        Ok(())
    }

    async fn close_data_channel(&self, _stream_id: u16) -> Result<()> {
        Ok(())
    }

    async fn restart_ice(&self, _ice_parameters: Value) -> Result<()> {
        Ok(())
    }

    async fn update_ice_servers(&self, _ice_servers: Value) -> Result<()> {
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Engine handing out [`MockTransport`]s
#[derive(Default)]
pub struct MockEngine {
    transports: Mutex<Vec<Arc<MockTransport>>>,
    mime_types: Option<Vec<String>>,
}

#[allow(dead_code)]
impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Engine that can only encode the given MIME types
    pub fn with_mime_types(mime_types: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            mime_types: Some(mime_types.iter().map(|m| m.to_string()).collect()),
            ..Default::default()
        })
    }

    pub fn transport(&self, direction: TransportDirection) -> Option<Arc<MockTransport>> {
        self.transports
            .lock()
            .iter()
            .find(|t| t.direction == direction)
            .cloned()
    }

    pub fn send(&self) -> Arc<MockTransport> {
        self.transport(TransportDirection::Send)
            .expect("send transport created")
    }

    pub fn recv(&self) -> Arc<MockTransport> {
        self.transport(TransportDirection::Recv)
            .expect("recv transport created")
    }

    pub fn count(&self) -> usize {
        self.transports.lock().len()
    }
}

#[async_trait]
impl TransportEngine for MockEngine {
    fn supported_mime_types(&self) -> Option<Vec<String>> {
        self.mime_types.clone()
    }

    async fn create_transport(
        &self,
        direction: TransportDirection,
        description: &TransportDescription,
        events: EventSink,
    ) -> Result<Arc<dyn EngineTransport>> {
        let transport = Arc::new(MockTransport::new(description.id.clone(), direction, events));
        self.transports.lock().push(transport.clone());
        Ok(transport)
    }
}

#[allow(dead_code)]
pub fn router_capabilities() -> Value {
    json!({
        "codecs": [
            { "kind": "audio", "mimeType": "audio/opus", "clockRate": 48000, "channels": 2, "preferredPayloadType": 100 },
            { "kind": "video", "mimeType": "video/VP8", "clockRate": 90000, "preferredPayloadType": 101 },
            { "kind": "video", "mimeType": "video/rtx", "clockRate": 90000, "preferredPayloadType": 102, "parameters": { "apt": 101 } }
        ],
        "headerExtensions": []
    })
}

#[allow(dead_code)]
pub fn video_only_capabilities() -> Value {
    json!({
        "codecs": [
            { "kind": "video", "mimeType": "video/VP8", "clockRate": 90000, "preferredPayloadType": 101 }
        ]
    })
}

#[allow(dead_code)]
pub fn audio_only_capabilities() -> Value {
    json!({
        "codecs": [
            { "kind": "audio", "mimeType": "audio/opus", "clockRate": 48000, "channels": 2, "preferredPayloadType": 100 }
        ]
    })
}

#[allow(dead_code)]
pub fn config() -> BroadcasterConfig {
    BroadcasterConfig::new(BASE_URL)
}

/// Broadcaster wired to fresh mocks, not yet started
#[allow(dead_code)]
pub fn broadcaster() -> (Broadcaster, Arc<MockSignaling>, Arc<MockEngine>) {
    let engine = MockEngine::new();
    let (broadcaster, signaling) = broadcaster_on(engine.clone());
    (broadcaster, signaling, engine)
}

/// Broadcaster on the given engine with fresh signaling, not yet started
#[allow(dead_code)]
pub fn broadcaster_on(engine: Arc<MockEngine>) -> (Broadcaster, Arc<MockSignaling>) {
    let signaling = MockSignaling::new();
    let broadcaster =
        Broadcaster::with_signaling(engine, MediaContext::synthetic(), signaling.clone());
    (broadcaster, signaling)
}

/// Broadcaster started with the default config and full router capabilities
#[allow(dead_code)]
pub async fn started() -> (Broadcaster, Arc<MockSignaling>, Arc<MockEngine>) {
    let (broadcaster, signaling, engine) = broadcaster();
    broadcaster
        .start(config(), &router_capabilities())
        .await
        .expect("broadcaster starts");
    (broadcaster, signaling, engine)
}
