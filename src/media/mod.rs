//! Media capture seam used by the content-script recorder.

pub mod synthetic;

pub use synthetic::{DeniedMedia, SyntheticMedia};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Media permission denied: {0}")]
    PermissionDenied(String),

    #[error("Media capture unavailable: {0}")]
    Unavailable(String),
}

/// What the recorder asks the host for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
    pub mime_type: String,
    /// How often the host should hand over an encoded chunk.
    pub timeslice: Duration,
}

impl MediaConstraints {
    pub fn audio_only(mime_type: impl Into<String>, timeslice: Duration) -> Self {
        Self {
            audio: true,
            video: false,
            mime_type: mime_type.into(),
            timeslice,
        }
    }
}

/// A granted capture whose encoded output is pulled chunk by chunk.
#[async_trait]
pub trait MediaStream: Send {
    /// Next encoded chunk. `None` once the tracks have ended.
    async fn next_chunk(&mut self) -> Option<Vec<u8>>;

    /// Release the underlying devices.
    fn stop_tracks(&mut self);
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Ask the host for a capture handle. The host may prompt the user, so
    /// this can wait indefinitely.
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError>;
}
