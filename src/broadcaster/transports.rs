//! Transport pair: one send and one receive transport per session

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{info, warn};

use super::SessionCore;
use crate::error::{BroadcastError, Result};
use crate::media::MediaKind;
use crate::signaling::{
    DataConsumerDescription, DataConsumerRequest, SignalingRequest, TransportDescription,
    TransportRequest,
};
use crate::transport::{
    CodecOptions, ConsumeDataOptions, DataProducerOptions, EngineTransport, EventDispatch,
    EventSink, ProduceOptions, RecvTransport, RtpEncodingParameters, SendTransport,
    TransportBase, TransportDirection,
};

enum Slot<T> {
    Empty,
    /// Server transport requested, local transport not yet installed
    Reserved,
    Ready(Arc<T>),
}

impl<T> Slot<T> {
    fn reserve(&mut self, direction: TransportDirection) -> Result<()> {
        match self {
            Slot::Empty => {
                *self = Slot::Reserved;
                Ok(())
            }
            _ => Err(BroadcastError::InvalidState(format!(
                "{} transport already created",
                direction
            ))),
        }
    }

    fn release(&mut self) {
        if matches!(self, Slot::Reserved) {
            *self = Slot::Empty;
        }
    }

    fn get(&self) -> Option<Arc<T>> {
        match self {
            Slot::Ready(t) => Some(t.clone()),
            _ => None,
        }
    }
}

/// The session's two transports, looked up by id for event routing
pub(crate) struct TransportPair {
    send: RwLock<Slot<SendTransport>>,
    recv: RwLock<Slot<RecvTransport>>,
}

impl TransportPair {
    pub fn new() -> Self {
        Self {
            send: RwLock::new(Slot::Empty),
            recv: RwLock::new(Slot::Empty),
        }
    }

    fn reserve(&self, direction: TransportDirection) -> Result<()> {
        match direction {
            TransportDirection::Send => self.send.write().reserve(direction),
            TransportDirection::Recv => self.recv.write().reserve(direction),
        }
    }

    fn release(&self, direction: TransportDirection) {
        match direction {
            TransportDirection::Send => self.send.write().release(),
            TransportDirection::Recv => self.recv.write().release(),
        }
    }

    pub fn send(&self) -> Option<Arc<SendTransport>> {
        self.send.read().get()
    }

    pub fn recv(&self) -> Option<Arc<RecvTransport>> {
        self.recv.read().get()
    }

    /// Which owned transport carries this id
    pub fn direction_of(&self, transport_id: &str) -> Option<TransportDirection> {
        if self.send().is_some_and(|t| t.id() == transport_id) {
            return Some(TransportDirection::Send);
        }
        if self.recv().is_some_and(|t| t.id() == transport_id) {
            return Some(TransportDirection::Recv);
        }
        None
    }
}

impl SessionCore {
    /// Create the server and local send transports, then produce
    /// audio/video, the data producer, and start the heartbeat
    pub(crate) async fn create_send_transport(
        &self,
        enable_audio: bool,
        use_simulcast: bool,
    ) -> Result<()> {
        self.ensure_running()?;
        let (can_audio, can_video) = {
            let device = self.device.read();
            (
                device.can_produce(MediaKind::Audio)?,
                device.can_produce(MediaKind::Video)?,
            )
        };
        self.transports.reserve(TransportDirection::Send)?;

        let (description, engine) = match self.open_transport(TransportDirection::Send).await {
            Ok(opened) => opened,
            Err(e) => {
                self.transports.release(TransportDirection::Send);
                return Err(e);
            }
        };

        let base = TransportBase::new(
            description.id,
            TransportDirection::Send,
            engine,
            self.handler.clone(),
            self.request_timeout(),
        );
        let transport = Arc::new(SendTransport::new(base, self.handler.clone()));
        *self.transports.send.write() = Slot::Ready(transport.clone());
        self.confirm_running()?;

        if enable_audio {
            if can_audio {
                let track = self.media.acquire_audio_track("mic")?;
                let mut options = ProduceOptions::new(track);
                options.codec_options = Some(CodecOptions::opus_stereo_dtx());
                let producer = transport.produce(options, self.handler.clone()).await?;
                self.registry.add_producer(producer);
                self.confirm_running()?;
            } else {
                warn!(
                    "{}, continuing without audio",
                    BroadcastError::CapabilityUnsupported(MediaKind::Audio)
                );
            }
        }

        if can_video {
            let track = self.media.acquire_video_track("squares")?;
            let mut options = ProduceOptions::new(track);
            if use_simulcast {
                options.encodings = RtpEncodingParameters::simulcast();
            }
            let producer = transport.produce(options, self.handler.clone()).await?;
            self.registry.add_producer(producer);
            self.confirm_running()?;
        } else {
            warn!(
                "{}, continuing without video",
                BroadcastError::CapabilityUnsupported(MediaKind::Video)
            );
        }

        let options = {
            let config = self.config.read();
            DataProducerOptions::new(config.data_label.clone(), config.data_protocol.clone())
        };
        let data_producer = transport.produce_data(options, self.handler.clone()).await?;
        self.registry.set_data_producer(data_producer.clone())?;
        self.confirm_running()?;
        self.spawn_heartbeat(data_producer);

        Ok(())
    }

    /// Create the receive transport and the data consumer mirroring our
    /// data producer
    pub(crate) async fn create_recv_transport(&self) -> Result<()> {
        self.ensure_running()?;
        let data_producer = self.registry.data_producer().ok_or_else(|| {
            BroadcastError::InvalidState(
                "send transport and data producer must exist before the receive transport"
                    .to_string(),
            )
        })?;
        self.transports.reserve(TransportDirection::Recv)?;

        let (description, engine) = match self.open_transport(TransportDirection::Recv).await {
            Ok(opened) => opened,
            Err(e) => {
                self.transports.release(TransportDirection::Recv);
                return Err(e);
            }
        };

        let base = TransportBase::new(
            description.id,
            TransportDirection::Recv,
            engine,
            self.handler.clone(),
            self.request_timeout(),
        );
        let transport = Arc::new(RecvTransport::new(base));
        *self.transports.recv.write() = Slot::Ready(transport.clone());
        self.confirm_running()?;

        let response = self
            .signal(SignalingRequest::CreateDataConsumer {
                broadcaster_id: self.id.clone(),
                transport_id: transport.id().to_string(),
                body: DataConsumerRequest {
                    data_producer_id: data_producer.id().to_string(),
                },
            })
            .await?;
        let consumer = DataConsumerDescription::from_response(&response)?;

        let label = self.config.read().data_label.clone();
        let data_consumer = transport
            .consume_data(
                ConsumeDataOptions {
                    id: consumer.id,
                    data_producer_id: data_producer.id().to_string(),
                    stream_id: consumer.stream_id,
                    label,
                    protocol: String::new(),
                    app_data: Value::Null,
                },
                self.handler.clone(),
            )
            .await?;
        self.registry.set_data_consumer(data_consumer)?;
        self.confirm_running()?;

        Ok(())
    }

    async fn open_transport(
        &self,
        direction: TransportDirection,
    ) -> Result<(TransportDescription, Arc<dyn EngineTransport>)> {
        let sctp_capabilities = self.device.read().sctp_capabilities();
        let response = self
            .signal(SignalingRequest::CreateTransport {
                broadcaster_id: self.id.clone(),
                body: TransportRequest::webrtc(sctp_capabilities),
            })
            .await?;
        let description = TransportDescription::from_response(response)?;

        let target: Weak<dyn EventDispatch> = self.self_ref.clone();
        let engine = self
            .engine
            .create_transport(
                direction,
                &description,
                EventSink::new(description.id.clone(), target),
            )
            .await?;

        info!("{} transport created: {}", direction, description.id);
        Ok((description, engine))
    }
}
