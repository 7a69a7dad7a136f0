//! Config loading from disk and environment

use std::path::Path;
use tracing::debug;

use super::BroadcasterConfig;
use crate::error::{BroadcastError, Result};

const ENV_BASE_URL: &str = "BROADCASTER_BASE_URL";
const ENV_VERIFY_SSL: &str = "BROADCASTER_VERIFY_SSL";
const ENV_ENABLE_AUDIO: &str = "BROADCASTER_ENABLE_AUDIO";
const ENV_USE_SIMULCAST: &str = "BROADCASTER_USE_SIMULCAST";
const ENV_HEARTBEAT_SECS: &str = "BROADCASTER_HEARTBEAT_SECS";

impl BroadcasterConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&raw)?;
        debug!("Loaded broadcaster config from {}", path.display());
        Ok(config)
    }

    /// Apply `BROADCASTER_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(v) = get(ENV_VERIFY_SSL) {
            self.verify_ssl = parse_bool(ENV_VERIFY_SSL, &v)?;
        }
        if let Some(v) = get(ENV_ENABLE_AUDIO) {
            self.enable_audio = parse_bool(ENV_ENABLE_AUDIO, &v)?;
        }
        if let Some(v) = get(ENV_USE_SIMULCAST) {
            self.use_simulcast = parse_bool(ENV_USE_SIMULCAST, &v)?;
        }
        if let Some(v) = get(ENV_HEARTBEAT_SECS) {
            self.heartbeat_interval_secs = v.trim().parse().map_err(|_| {
                BroadcastError::Config(format!("{} is not a number: {}", ENV_HEARTBEAT_SECS, v))
            })?;
        }
        Ok(self)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(BroadcastError::Config(format!(
            "{} is not a boolean: {}",
            key, other
        ))),
    }
}
