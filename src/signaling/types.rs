//! Signaling request bodies and response parsing

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::device::{RtpCapabilities, SctpCapabilities};
use crate::error::{BroadcastError, Result};
use crate::media::MediaKind;

/// Body of `POST /broadcasters`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcasterRegistration {
    pub id: String,
    pub display_name: String,
    pub device: DeviceInfo,
    pub rtp_capabilities: RtpCapabilities,
}

/// Client library identification sent at registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub version: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Body of `POST /broadcasters/{id}/transports`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportRequest {
    #[serde(rename = "type")]
    pub transport_type: String,
    pub rtcp_mux: bool,
    pub sctp_capabilities: SctpCapabilities,
}

impl TransportRequest {
    pub fn webrtc(sctp_capabilities: SctpCapabilities) -> Self {
        Self {
            transport_type: "webrtc".to_string(),
            rtcp_mux: true,
            sctp_capabilities,
        }
    }
}

/// Body of `POST .../transports/{tid}/producers`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerRequest {
    pub kind: MediaKind,
    pub rtp_parameters: Value,
}

/// SCTP stream parameters of one data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpStreamParameters {
    pub stream_id: u16,
    pub ordered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_packet_life_time: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retransmits: Option<u16>,
}

/// Body of `POST .../transports/{tid}/produce/data`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProducerRequest {
    pub label: String,
    pub protocol: String,
    pub sctp_stream_parameters: SctpStreamParameters,
}

/// Body of `POST .../transports/{tid}/consume/data`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataConsumerRequest {
    pub data_producer_id: String,
}

/// Server-side transport description; every field is required
#[derive(Debug, Clone, PartialEq)]
pub struct TransportDescription {
    pub id: String,
    pub ice_parameters: Value,
    pub ice_candidates: Value,
    pub dtls_parameters: Value,
    pub sctp_parameters: Value,
}

impl TransportDescription {
    pub fn from_response(mut response: Value) -> Result<Self> {
        let id = match response.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => return Err(missing("id")),
        };

        let mut take = |field: &'static str| match response.get_mut(field) {
            Some(v) if !v.is_null() => Ok(v.take()),
            _ => Err(missing(field)),
        };

        Ok(Self {
            id,
            ice_parameters: take("iceParameters")?,
            ice_candidates: take("iceCandidates")?,
            dtls_parameters: take("dtlsParameters")?,
            sctp_parameters: take("sctpParameters")?,
        })
    }
}

/// Server-side data consumer created for our data producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConsumerDescription {
    pub id: String,
    pub stream_id: u16,
}

impl DataConsumerDescription {
    pub fn from_response(response: &Value) -> Result<Self> {
        let id = parse_resource_id(response, "data consumer")?;
        let stream_id = response
            .get("streamId")
            .and_then(Value::as_u64)
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| missing("streamId"))?;
        Ok(Self { id, stream_id })
    }
}

/// Extract the server-assigned `id` of a created resource
pub fn parse_resource_id(response: &Value, resource: &'static str) -> Result<String> {
    response
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(BroadcastError::MissingId(resource))
}

fn missing(field: &str) -> BroadcastError {
    BroadcastError::Signaling(format!("'{}' missing in response", field))
}
