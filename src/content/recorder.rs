//! Capture-to-artifact recorder used by the content script.
//!
//! Neither the capture grant nor the capture itself runs inline: both are
//! spawned, and [`Recorder::next_event`] reports when either one settles.

use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::media::{CaptureError, MediaConstraints, MediaDevices, MediaStream};
use crate::protocol::artifact::DataUrl;
use crate::protocol::RecordingArtifact;

type GrantResult = Result<Box<dyn MediaStream>, CaptureError>;

/// Outcome of a spawned grant or capture.
#[derive(Debug)]
pub enum RecorderEvent {
    /// The grant arrived and chunks are being collected.
    Started { meeting_id: String },
    /// The grant was refused or failed.
    Failed(CaptureError),
    /// The capture tracks ended without a stop request.
    Completed(RecordingArtifact),
}

struct PendingGrant {
    meeting_id: String,
    title: String,
    task: JoinHandle<GrantResult>,
}

struct ActiveRecording {
    meeting_id: String,
    title: String,
    started_at: Instant,
    cancel: CancellationToken,
    task: JoinHandle<Vec<u8>>,
}

pub struct Recorder {
    media: Arc<dyn MediaDevices>,
    constraints: MediaConstraints,
    pending: Option<PendingGrant>,
    active: Option<ActiveRecording>,
}

impl Recorder {
    pub fn new(media: Arc<dyn MediaDevices>, constraints: MediaConstraints) -> Self {
        Self {
            media,
            constraints,
            pending: None,
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Request capture. `false` when a grant is pending or a recording runs.
    pub fn start(&mut self, meeting_id: &str, title: &str) -> bool {
        if self.pending.is_some() || self.active.is_some() {
            debug!("Recording already requested for {}", meeting_id);
            return false;
        }

        info!("Requesting capture for meeting {}", meeting_id);
        let media = Arc::clone(&self.media);
        let constraints = self.constraints.clone();
        let task = tokio::spawn(async move { media.get_user_media(&constraints).await });

        self.pending = Some(PendingGrant {
            meeting_id: meeting_id.to_string(),
            title: title.to_string(),
            task,
        });
        true
    }

    /// Wait until the pending grant settles or the running capture ends by
    /// itself. Pending forever while idle. Cancel safe.
    pub async fn next_event(&mut self) -> RecorderEvent {
        if let Some(pending) = self.pending.as_mut() {
            let joined = (&mut pending.task).await;
            let meeting_id = pending.meeting_id.clone();
            let title = pending.title.clone();
            self.pending = None;
            return self.granted(meeting_id, title, joined);
        }

        if let Some(active) = self.active.as_mut() {
            let joined = (&mut active.task).await;
            if let Some(active) = self.active.take() {
                info!("Capture tracks for {} ended", active.meeting_id);
                return RecorderEvent::Completed(self.assemble(active, joined));
            }
        }

        std::future::pending().await
    }

    fn granted(
        &mut self,
        meeting_id: String,
        title: String,
        joined: Result<GrantResult, JoinError>,
    ) -> RecorderEvent {
        let stream = match joined {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return RecorderEvent::Failed(e),
            Err(e) => return RecorderEvent::Failed(CaptureError::Unavailable(e.to_string())),
        };

        let cancel = CancellationToken::new();
        let task = tokio::spawn(collect_chunks(stream, cancel.clone()));
        self.active = Some(ActiveRecording {
            meeting_id: meeting_id.clone(),
            title,
            started_at: Instant::now(),
            cancel,
            task,
        });

        info!("Recording started for {}", meeting_id);
        RecorderEvent::Started { meeting_id }
    }

    /// Stop capturing and assemble the artifact. `None` when not recording;
    /// a grant still pending is abandoned.
    pub async fn stop(&mut self) -> Option<RecordingArtifact> {
        if let Some(pending) = self.pending.take() {
            debug!("Abandoning capture request for {}", pending.meeting_id);
            pending.task.abort();
            return None;
        }

        let mut active = self.active.take()?;
        active.cancel.cancel();
        let joined = (&mut active.task).await;
        Some(self.assemble(active, joined))
    }

    fn assemble(
        &self,
        active: ActiveRecording,
        joined: Result<Vec<u8>, JoinError>,
    ) -> RecordingArtifact {
        let duration = active.started_at.elapsed().as_secs();
        let bytes = joined.unwrap_or_else(|e| {
            warn!("Recording task for {} failed: {}", active.meeting_id, e);
            Vec::new()
        });

        info!(
            "Recording stopped for {}: {} bytes over {}s",
            active.meeting_id,
            bytes.len(),
            duration
        );

        let mime_type = self.constraints.mime_type.clone();
        RecordingArtifact {
            meeting_id: active.meeting_id,
            title: active.title,
            data: DataUrl::new(mime_type.clone(), bytes),
            duration,
            mime_type,
        }
    }
}

/// Accumulate chunks until cancelled or the tracks end, then release them.
async fn collect_chunks(mut stream: Box<dyn MediaStream>, cancel: CancellationToken) -> Vec<u8> {
    let mut buffer = Vec::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = stream.next_chunk() => match chunk {
                Some(chunk) if !chunk.is_empty() => buffer.extend_from_slice(&chunk),
                Some(_) => {}
                None => {
                    debug!("Capture tracks ended");
                    break;
                }
            },
        }
    }

    stream.stop_tracks();
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{DeniedMedia, SyntheticMedia};
    use async_trait::async_trait;
    use std::time::Duration;

    /// A prompt the user never answers.
    struct UnansweredMedia;

    #[async_trait]
    impl MediaDevices for UnansweredMedia {
        async fn get_user_media(&self, _constraints: &MediaConstraints) -> GrantResult {
            std::future::pending().await
        }
    }

    fn constraints() -> MediaConstraints {
        MediaConstraints::audio_only("audio/webm", Duration::from_millis(1000))
    }

    async fn started(recorder: &mut Recorder, meeting_id: &str) {
        assert!(recorder.start(meeting_id, "Standup"));
        match recorder.next_event().await {
            RecorderEvent::Started { meeting_id: id } => assert_eq!(id, meeting_id),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_assembles_artifact() {
        let media = SyntheticMedia::new(8);
        let mut recorder = Recorder::new(Arc::new(media.clone()), constraints());

        started(&mut recorder, "abc-defg-hij").await;
        tokio::time::sleep(Duration::from_millis(3500)).await;
        let artifact = recorder.stop().await.unwrap();

        assert_eq!(artifact.meeting_id, "abc-defg-hij");
        assert_eq!(artifact.title, "Standup");
        assert_eq!(artifact.mime_type, "audio/webm");
        assert_eq!(artifact.duration, 3);
        assert_eq!(artifact.size(), 3 * 8);
        assert_eq!(media.released(), 1);
        assert!(!recorder.is_recording());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_noop() {
        let media = SyntheticMedia::default();
        let mut recorder = Recorder::new(Arc::new(media.clone()), constraints());

        assert!(recorder.start("m", "t"));
        assert!(!recorder.start("m", "t"));
        recorder.next_event().await;
        assert!(!recorder.start("m", "t"));
        assert_eq!(media.grants(), 1);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let mut recorder = Recorder::new(Arc::new(SyntheticMedia::default()), constraints());
        assert!(recorder.stop().await.is_none());
        assert!(recorder.stop().await.is_none());
    }

    #[tokio::test]
    async fn test_denied_capture_leaves_recorder_idle() {
        let mut recorder = Recorder::new(Arc::new(DeniedMedia), constraints());
        assert!(recorder.start("m", "t"));

        let event = recorder.next_event().await;
        assert!(matches!(
            event,
            RecorderEvent::Failed(CaptureError::PermissionDenied(_))
        ));
        assert!(!recorder.is_recording());
        assert!(!recorder.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_grant_can_be_abandoned() {
        let mut recorder = Recorder::new(Arc::new(UnansweredMedia), constraints());
        assert!(recorder.start("m", "t"));

        let waited = tokio::time::timeout(Duration::from_secs(60), recorder.next_event()).await;
        assert!(waited.is_err());
        assert!(recorder.is_pending());

        assert!(recorder.stop().await.is_none());
        assert!(!recorder.is_pending());
        assert!(recorder.start("m", "t"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracks_ending_completes_recording() {
        let media = SyntheticMedia::new(4).with_track_limit(2);
        let mut recorder = Recorder::new(Arc::new(media.clone()), constraints());
        started(&mut recorder, "abc-defg-hij").await;

        match recorder.next_event().await {
            RecorderEvent::Completed(artifact) => {
                assert_eq!(artifact.meeting_id, "abc-defg-hij");
                assert_eq!(artifact.size(), 8);
                assert_eq!(artifact.duration, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(!recorder.is_recording());
        assert_eq!(media.released(), 1);
        assert!(recorder.stop().await.is_none());
    }
}
