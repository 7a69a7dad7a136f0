//! HTTP signaling client

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::{SignalingClient, SignalingRequest};
use crate::error::{BroadcastError, Result};

/// Signaling client speaking JSON over HTTP(S)
pub struct HttpSignaling {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSignaling {
    pub fn new(base_url: &str, verify_ssl: bool, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(|e| BroadcastError::Signaling(format!("Failed to create HTTP client: {}", e)))?;

        if !verify_ssl {
            warn!("TLS certificate verification disabled for {}", base_url);
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, request: &SignalingRequest) -> String {
        format!("{}{}", self.base_url, request.path())
    }
}

#[async_trait]
impl SignalingClient for HttpSignaling {
    async fn request(&self, request: SignalingRequest) -> Result<Value> {
        let url = self.url(&request);
        let body = request.body()?;
        debug!("Signaling {} -> POST {}", request.name(), url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BroadcastError::Signaling(format!("{} timed out", request.name()))
                } else {
                    BroadcastError::Signaling(format!("{} failed: {}", request.name(), e))
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            BroadcastError::Signaling(format!("{} failed reading body: {}", request.name(), e))
        })?;

        if !status.is_success() {
            return Err(BroadcastError::Signaling(format!(
                "unable to {} [status code:{}, body:\"{}\"]",
                request.name(),
                status.as_u16(),
                text
            )));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            BroadcastError::Signaling(format!("{} returned invalid JSON: {}", request.name(), e))
        })
    }
}
