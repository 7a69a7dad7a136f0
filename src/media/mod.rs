//! Media-source collaborator
//!
//! Capture and encoding live outside this crate. The session only needs
//! opaque track handles that it passes through to the transport engine.
//! A [`MediaContext`] is created by the caller, owned by the session and
//! shut down after both transports are closed.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{BroadcastError, Result};

/// Media kind of a track or producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle to a local media track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackHandle {
    /// Track ID assigned by the media source
    pub id: String,
    /// Track kind
    pub kind: MediaKind,
    /// Label requested by the session
    pub label: String,
}

/// Source of local audio/video tracks
pub trait MediaSource: Send + Sync {
    fn acquire_audio_track(&self, label: &str) -> Result<TrackHandle>;

    fn acquire_video_track(&self, label: &str) -> Result<TrackHandle>;

    /// Release any capture resources; called once when the context shuts down
    fn shutdown(&self) {}
}

/// Explicitly owned media context handed to a session at construction
pub struct MediaContext {
    source: Arc<dyn MediaSource>,
    shut_down: AtomicBool,
}

impl MediaContext {
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self {
            source,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Context backed by [`SyntheticMediaSource`]
    pub fn synthetic() -> Self {
        Self::new(Arc::new(SyntheticMediaSource::default()))
    }

    pub fn acquire_audio_track(&self, label: &str) -> Result<TrackHandle> {
        self.ensure_running()?;
        self.source.acquire_audio_track(label)
    }

    pub fn acquire_video_track(&self, label: &str) -> Result<TrackHandle> {
        self.ensure_running()?;
        self.source.acquire_video_track(label)
    }

    /// Shut the source down; later calls are no-ops
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.source.shutdown();
        info!("Media context shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(BroadcastError::InvalidState(
                "media context is shut down".to_string(),
            ));
        }
        Ok(())
    }
}

/// Test-pattern source: silent audio and a moving-squares video pattern
#[derive(Debug, Default)]
pub struct SyntheticMediaSource;

impl SyntheticMediaSource {
    fn track(kind: MediaKind, label: &str) -> TrackHandle {
        let track = TrackHandle {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            label: label.to_string(),
        };
        debug!("Synthetic {} track created: {}", kind, track.id);
        track
    }
}

impl MediaSource for SyntheticMediaSource {
    fn acquire_audio_track(&self, label: &str) -> Result<TrackHandle> {
        Ok(Self::track(MediaKind::Audio, label))
    }

    fn acquire_video_track(&self, label: &str) -> Result<TrackHandle> {
        Ok(Self::track(MediaKind::Video, label))
    }
}
