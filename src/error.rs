use thiserror::Error;

use crate::media::MediaKind;

/// Broadcaster-wide error type
#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("Signaling error: {0}")]
    Signaling(String),

    #[error("'id' missing in {0} response")]
    MissingId(&'static str),

    #[error("Device already loaded")]
    AlreadyLoaded,

    #[error("Invalid capabilities: {0}")]
    InvalidCapabilities(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Cannot produce {0}")]
    CapabilityUnsupported(MediaKind),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BroadcastError {
    /// Whether this error reports a broken internal invariant rather than a
    /// runtime failure of the network or the signaling server
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::UnknownResource(_))
    }
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, BroadcastError>;
