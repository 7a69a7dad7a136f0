//! Send transport: media producers and the outgoing data channel

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::base::TransportBase;
use super::engine::EngineTransport;
use super::listener::{DataProducerListener, ProducerListener, SendTransportListener};
use super::pending::PendingRequest;
use super::types::{CodecOptions, RtpEncodingParameters};
use super::TransportDirection;
use crate::error::Result;
use crate::media::TrackHandle;
use crate::registry::{DataProducer, Producer, ProducerInit};

/// Options for [`SendTransport::produce`]
#[derive(Debug, Clone)]
pub struct ProduceOptions {
    pub track: TrackHandle,
    /// Empty for a single implicit layer
    pub encodings: Vec<RtpEncodingParameters>,
    pub codec_options: Option<CodecOptions>,
    pub app_data: Value,
}

impl ProduceOptions {
    pub fn new(track: TrackHandle) -> Self {
        Self {
            track,
            encodings: Vec::new(),
            codec_options: None,
            app_data: Value::Null,
        }
    }
}

/// Options for [`SendTransport::produce_data`]
#[derive(Debug, Clone)]
pub struct DataProducerOptions {
    pub label: String,
    pub protocol: String,
    pub ordered: bool,
    pub max_retransmits: Option<u16>,
    pub max_packet_life_time: Option<u16>,
    pub app_data: Value,
}

impl DataProducerOptions {
    pub fn new(label: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            protocol: protocol.into(),
            ordered: true,
            max_retransmits: None,
            max_packet_life_time: None,
            app_data: Value::Null,
        }
    }
}

/// Send-direction transport
pub struct SendTransport {
    base: TransportBase,
    listener: Arc<dyn SendTransportListener>,
}

impl SendTransport {
    pub fn new(base: TransportBase, listener: Arc<dyn SendTransportListener>) -> Self {
        debug_assert_eq!(base.direction(), TransportDirection::Send);
        Self { base, listener }
    }

    pub fn base(&self) -> &TransportBase {
        &self.base
    }

    pub fn id(&self) -> &str {
        self.base.id()
    }

    fn engine(&self) -> &Arc<dyn EngineTransport> {
        self.base.engine()
    }

    /// Start sending a track and register it with the server
    pub async fn produce(
        &self,
        options: ProduceOptions,
        listener: Arc<dyn ProducerListener>,
    ) -> Result<Arc<Producer>> {
        self.base.ensure_open()?;
        self.base.ensure_connected().await?;

        let kind = options.track.kind;
        let sender = self
            .engine()
            .start_sending(
                &options.track,
                &options.encodings,
                options.codec_options.as_ref(),
            )
            .await?;

        let (pending, reply) = PendingRequest::new("produce");
        self.listener
            .on_produce(
                self.id(),
                kind,
                sender.rtp_parameters.clone(),
                options.app_data.clone(),
                pending,
            )
            .await;

        let id = match reply.wait(self.base.request_timeout()).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(stop_err) = self.engine().stop_sending(&sender.local_id).await {
                    warn!(
                        "Failed to stop local {} sender after produce failure: {}",
                        kind, stop_err
                    );
                }
                return Err(e);
            }
        };

        info!("Producer created: {} ({})", id, kind);
        Ok(Arc::new(Producer::new(
            ProducerInit {
                id,
                local_id: sender.local_id,
                track: options.track,
                rtp_parameters: sender.rtp_parameters,
                encodings: options.encodings.len(),
                app_data: options.app_data,
            },
            self.engine().clone(),
            listener,
        )))
    }

    /// Open the outgoing data channel and register it with the server
    pub async fn produce_data(
        &self,
        options: DataProducerOptions,
        listener: Arc<dyn DataProducerListener>,
    ) -> Result<Arc<DataProducer>> {
        self.base.ensure_open()?;
        self.base.ensure_connected().await?;

        let sctp = self.engine().open_data_channel(&options).await?;

        let (pending, reply) = PendingRequest::new("produce data");
        self.listener
            .on_produce_data(
                self.id(),
                sctp,
                &options.label,
                &options.protocol,
                options.app_data.clone(),
                pending,
            )
            .await;

        let id = match reply.wait(self.base.request_timeout()).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(close_err) = self.engine().close_data_channel(sctp.stream_id).await {
                    warn!("Failed to close data channel after produce failure: {}", close_err);
                }
                return Err(e);
            }
        };

        info!(
            "Data producer created: {} (label={}, stream={})",
            id, options.label, sctp.stream_id
        );
        Ok(Arc::new(DataProducer::new(
            id,
            options.label,
            options.protocol,
            sctp,
            options.app_data,
            self.engine().clone(),
            listener,
        )))
    }

    pub fn close(&self) {
        self.base.close()
    }
}

impl std::fmt::Debug for SendTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.base, f)
    }
}
