//! RTP/SCTP capability types exchanged with the router

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::media::MediaKind;

/// Router or device RTP capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    #[serde(default)]
    pub codecs: Vec<RtpCodecCapability>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtension>,
}

impl RtpCapabilities {
    /// Media codecs of the given kind, excluding retransmission entries
    pub fn media_codecs(&self, kind: MediaKind) -> impl Iterator<Item = &RtpCodecCapability> {
        self.codecs
            .iter()
            .filter(move |c| c.kind == kind && !c.is_rtx())
    }
}

/// One codec entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    pub kind: MediaKind,
    /// MIME type (e.g., "audio/opus", "video/VP8")
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_payload_type: Option<u8>,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub rtcp_feedback: Vec<Value>,
}

impl RtpCodecCapability {
    pub fn is_rtx(&self) -> bool {
        self.mime_type
            .split_once('/')
            .map(|(_, name)| name.eq_ignore_ascii_case("rtx"))
            .unwrap_or(false)
    }
}

/// RTP header extension entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtension {
    pub kind: MediaKind,
    pub uri: String,
    pub preferred_id: u16,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Number of SCTP streams negotiated for data channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumSctpStreams {
    #[serde(rename = "OS")]
    pub os: u16,
    #[serde(rename = "MIS")]
    pub mis: u16,
}

impl Default for NumSctpStreams {
    fn default() -> Self {
        Self { os: 1024, mis: 1024 }
    }
}

/// Device SCTP capabilities sent when creating transports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpCapabilities {
    pub num_streams: NumSctpStreams,
}
