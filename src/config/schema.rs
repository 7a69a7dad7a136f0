use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BroadcastError, Result};

/// Default heartbeat interval on the data producer
pub const DEFAULT_HEARTBEAT_SECS: u64 = 10;

/// Default bound on a single signaling round trip
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Broadcaster session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BroadcasterConfig {
    /// Signaling server base URL (e.g., https://sfu.example.com:4443/rooms/demo)
    pub base_url: String,
    /// Verify the signaling server TLS certificate
    pub verify_ssl: bool,
    /// Produce an audio track when the router supports it
    pub enable_audio: bool,
    /// Send video as three simulcast layers
    pub use_simulcast: bool,
    /// Seconds between heartbeat messages on the data producer
    pub heartbeat_interval_secs: u64,
    /// Seconds before a signaling round trip is abandoned
    pub request_timeout_secs: u64,
    /// Display name registered with the server
    pub display_name: String,
    /// Label used for the data producer and data consumer
    pub data_label: String,
    /// Sub-protocol of the data channel
    pub data_protocol: String,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            verify_ssl: true,
            enable_audio: true,
            use_simulcast: false,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            display_name: "broadcaster".to_string(),
            data_label: "chat".to_string(),
            data_protocol: String::new(),
        }
    }
}

impl BroadcasterConfig {
    /// Create a config pointing at the given signaling server
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check that the config can drive a session
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(BroadcastError::Config("base_url is empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(BroadcastError::Config(format!(
                "base_url must be http(s): {}",
                url
            )));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(BroadcastError::Config(
                "heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(BroadcastError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.data_label.is_empty() {
            return Err(BroadcastError::Config("data_label is empty".to_string()));
        }
        Ok(())
    }
}
