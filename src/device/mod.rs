//! Capability negotiation with the router
//!
//! A [`Device`] is loaded once per session with the router's RTP
//! capabilities. The negotiated result decides which media kinds the
//! session may produce and is what gets registered with the server.

pub mod capabilities;

pub use capabilities::{
    NumSctpStreams, RtpCapabilities, RtpCodecCapability, RtpHeaderExtension, SctpCapabilities,
};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{BroadcastError, Result};
use crate::media::MediaKind;

/// Local capability negotiator
#[derive(Debug, Clone, Default)]
pub struct Device {
    /// MIME types the local engine can send; `None` accepts any router codec
    supported_mime_types: Option<Vec<String>>,
    rtp_capabilities: Option<RtpCapabilities>,
    sctp_capabilities: SctpCapabilities,
}

impl Device {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict negotiation to codecs the local engine can encode
    pub fn with_supported_mime_types<I, S>(mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported_mime_types: Some(mime_types.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.rtp_capabilities.is_some()
    }

    /// Load the router's RTP capabilities; only once per device
    pub fn load(&mut self, router_capabilities: &Value) -> Result<()> {
        if self.is_loaded() {
            return Err(BroadcastError::AlreadyLoaded);
        }

        if !router_capabilities.is_object() {
            return Err(BroadcastError::InvalidCapabilities(
                "router capabilities must be an object".to_string(),
            ));
        }

        let router: RtpCapabilities = serde_json::from_value(router_capabilities.clone())
            .map_err(|e| BroadcastError::InvalidCapabilities(e.to_string()))?;

        validate(&router)?;

        let codecs = router
            .codecs
            .into_iter()
            .filter(|c| c.is_rtx() || self.supports(&c.mime_type))
            .collect();

        let negotiated = RtpCapabilities {
            codecs,
            header_extensions: router.header_extensions,
        };

        info!(
            "Device loaded [audio:{}, video:{}]",
            negotiated.media_codecs(MediaKind::Audio).count(),
            negotiated.media_codecs(MediaKind::Video).count()
        );
        self.rtp_capabilities = Some(negotiated);
        Ok(())
    }

    /// Whether the negotiated capabilities allow producing `kind`
    pub fn can_produce(&self, kind: MediaKind) -> Result<bool> {
        let caps = self.loaded()?;
        let can = caps.media_codecs(kind).next().is_some();
        debug!("can_produce({}) = {}", kind, can);
        Ok(can)
    }

    /// Negotiated RTP capabilities
    pub fn rtp_capabilities(&self) -> Result<&RtpCapabilities> {
        self.loaded()
    }

    pub fn sctp_capabilities(&self) -> SctpCapabilities {
        self.sctp_capabilities
    }

    fn loaded(&self) -> Result<&RtpCapabilities> {
        self.rtp_capabilities
            .as_ref()
            .ok_or_else(|| BroadcastError::InvalidState("device not loaded".to_string()))
    }

    fn supports(&self, mime_type: &str) -> bool {
        match &self.supported_mime_types {
            Some(list) => list.iter().any(|m| m.eq_ignore_ascii_case(mime_type)),
            None => true,
        }
    }
}

fn validate(caps: &RtpCapabilities) -> Result<()> {
    if caps.codecs.is_empty() {
        return Err(BroadcastError::InvalidCapabilities(
            "no codecs in router capabilities".to_string(),
        ));
    }

    for codec in &caps.codecs {
        let prefix = codec
            .mime_type
            .split_once('/')
            .map(|(p, _)| p)
            .unwrap_or_default();
        if !prefix.eq_ignore_ascii_case(codec.kind.as_str()) {
            return Err(BroadcastError::InvalidCapabilities(format!(
                "codec {} does not match kind {}",
                codec.mime_type, codec.kind
            )));
        }
        if codec.clock_rate == 0 {
            return Err(BroadcastError::InvalidCapabilities(format!(
                "codec {} has no clock rate",
                codec.mime_type
            )));
        }
    }
    Ok(())
}
