//! RTP send options

use serde::{Deserialize, Serialize};

/// One RTP encoding (simulcast layer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpEncodingParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_resolution_down_by: Option<f64>,
}

impl Default for RtpEncodingParameters {
    fn default() -> Self {
        Self {
            rid: None,
            active: true,
            max_bitrate: None,
            scale_resolution_down_by: None,
        }
    }
}

impl RtpEncodingParameters {
    /// Three layers: quarter, half and full resolution
    pub fn simulcast() -> Vec<Self> {
        [4.0, 2.0, 1.0]
            .into_iter()
            .enumerate()
            .map(|(i, scale)| Self {
                rid: Some(format!("r{}", i)),
                scale_resolution_down_by: Some(scale),
                ..Default::default()
            })
            .collect()
    }
}

/// Codec tuning passed to the engine for a producer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_stereo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_fec: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_dtx: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_max_playback_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_google_start_bitrate: Option<u32>,
}

impl CodecOptions {
    /// Stereo Opus with discontinuous transmission
    pub fn opus_stereo_dtx() -> Self {
        Self {
            opus_stereo: Some(true),
            opus_dtx: Some(true),
            ..Default::default()
        }
    }
}
