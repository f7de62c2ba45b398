//! Stand-in capture devices for simulation and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{interval_at, Instant, Interval};
use tracing::debug;

use super::{CaptureError, MediaConstraints, MediaDevices, MediaStream};

/// Grants every request and produces a fixed-size chunk per timeslice.
#[derive(Clone)]
pub struct SyntheticMedia {
    chunk_size: usize,
    track_limit: Option<usize>,
    grants: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl SyntheticMedia {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            track_limit: None,
            grants: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// End the tracks by themselves after `chunks` chunks, as when the
    /// user stops sharing from the browser UI.
    pub fn with_track_limit(mut self, chunks: usize) -> Self {
        self.track_limit = Some(chunks);
        self
    }

    /// Number of capture handles handed out so far.
    pub fn grants(&self) -> usize {
        self.grants.load(Ordering::SeqCst)
    }

    /// Number of handles whose tracks were stopped.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticMedia {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl MediaDevices for SyntheticMedia {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        if !constraints.audio && !constraints.video {
            return Err(CaptureError::Unavailable(
                "no audio or video requested".to_string(),
            ));
        }

        self.grants.fetch_add(1, Ordering::SeqCst);
        debug!("Synthetic capture granted ({})", constraints.mime_type);

        let timeslice = constraints.timeslice.max(std::time::Duration::from_millis(1));
        Ok(Box::new(SyntheticStream {
            ticker: interval_at(Instant::now() + timeslice, timeslice),
            chunk_size: self.chunk_size,
            remaining: self.track_limit,
            seq: 0,
            stopped: false,
            released: Arc::clone(&self.released),
        }))
    }
}

struct SyntheticStream {
    ticker: Interval,
    chunk_size: usize,
    remaining: Option<usize>,
    seq: u8,
    stopped: bool,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaStream for SyntheticStream {
    async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        if self.stopped || self.remaining == Some(0) {
            return None;
        }
        self.ticker.tick().await;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        self.seq = self.seq.wrapping_add(1);
        Some(vec![self.seq; self.chunk_size])
    }

    fn stop_tracks(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Rejects every request as the user would by dismissing the prompt.
#[derive(Debug, Clone, Default)]
pub struct DeniedMedia;

#[async_trait]
impl MediaDevices for DeniedMedia {
    async fn get_user_media(
        &self,
        _constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        Err(CaptureError::PermissionDenied(
            "Permission dismissed".to_string(),
        ))
    }
}
