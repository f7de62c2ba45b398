//! Content script event loop for one meeting tab.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::detector::{Detection, MeetingDetector, MeetingUrl};
use super::extract::Extractor;
use super::participants::ParticipantObserver;
use super::recorder::{Recorder, RecorderEvent};
use crate::background::BackgroundHandle;
use crate::config::{DetectionConfig, RecordingConfig};
use crate::media::{CaptureError, MediaConstraints, MediaDevices};
use crate::page::{HostPage, Indicator};
use crate::protocol::{ContentCommand, ContentEvent, RecordingArtifact};
use crate::transport::TabId;

/// The flagged meeting as this tab knows it.
struct TabMeeting {
    code: String,
    title: String,
}

pub struct ContentScript {
    page: Arc<dyn HostPage>,
    detector: MeetingDetector,
    extractor: Arc<Extractor>,
    observer: ParticipantObserver,
    recorder: Recorder,
    meeting: Option<TabMeeting>,
    background: BackgroundHandle,
    tab: TabId,
    commands: mpsc::UnboundedReceiver<ContentCommand>,
    detection: DetectionConfig,
}

impl ContentScript {
    pub fn new(
        page: Arc<dyn HostPage>,
        media: Arc<dyn MediaDevices>,
        background: BackgroundHandle,
        tab: TabId,
        commands: mpsc::UnboundedReceiver<ContentCommand>,
        detection: &DetectionConfig,
        recording: &RecordingConfig,
    ) -> Result<Self> {
        let extractor = Arc::new(Extractor::default());
        let constraints = MediaConstraints::audio_only(&recording.mime_type, recording.timeslice());

        Ok(Self {
            page,
            detector: MeetingDetector::new(&detection.meeting_host)?,
            observer: ParticipantObserver::new(Arc::clone(&extractor)),
            extractor,
            recorder: Recorder::new(media, constraints),
            meeting: None,
            background,
            tab,
            commands,
            detection: detection.clone(),
        })
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Content script started in tab {}", self.tab);

        let mut poll = interval(self.detection.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and doubles as the page-load check.

        let mut location = self.page.location_changes();
        let mut last_url = self.page.location();

        let settle = sleep(Duration::ZERO);
        tokio::pin!(settle);
        let mut settle_armed = false;

        let retry = sleep(Duration::ZERO);
        tokio::pin!(retry);
        let mut retry_armed = false;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                _ = poll.tick() => {
                    if self.detect().await {
                        retry.as_mut().reset(Instant::now() + self.detection.observer_retry());
                        retry_armed = true;
                    }
                }

                changed = location.changed() => {
                    if changed.is_err() {
                        debug!("Page location feed closed");
                        break;
                    }
                    let url = location.borrow_and_update().clone();
                    if url != last_url {
                        debug!("Location changed to {}", url);
                        last_url = url;
                        settle.as_mut().reset(Instant::now() + self.detection.url_settle());
                        settle_armed = true;
                    }
                }

                _ = &mut settle, if settle_armed => {
                    settle_armed = false;
                    if self.detect().await {
                        retry.as_mut().reset(Instant::now() + self.detection.observer_retry());
                        retry_armed = true;
                    }
                }

                batch = self.observer.next_batch() => match batch {
                    Some(_) => self.participants_changed().await,
                    None => {
                        retry.as_mut().reset(Instant::now() + self.detection.observer_retry());
                        retry_armed = true;
                    }
                },

                _ = &mut retry, if retry_armed => {
                    retry_armed = false;
                    if self.meeting.is_some() && !self.observer.attach(self.page.as_ref()) {
                        debug!("Participant container still missing, retrying");
                        retry.as_mut().reset(Instant::now() + self.detection.observer_retry());
                        retry_armed = true;
                    } else if self.observer.is_attached() {
                        self.participants_changed().await;
                    }
                }

                event = self.recorder.next_event() => self.on_recorder_event(event).await,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("Background dropped tab {}", self.tab);
                        break;
                    }
                },
            }
        }

        self.teardown().await;
        info!("Content script in tab {} stopped", self.tab);
    }

    /// Check the page for a meeting transition and emit the matching event.
    ///
    /// Returns `true` when a meeting started but its participant container
    /// is not on the page yet, so the caller should schedule a retry.
    pub async fn detect(&mut self) -> bool {
        let url = self.page.location();
        let mut needs_retry = false;

        // A direct switch between two meetings takes two transitions.
        for _ in 0..2 {
            match self.detector.detect(&url) {
                Some(Detection::Started(meeting)) => needs_retry = self.meeting_started(meeting).await,
                Some(Detection::Ended { meeting_id }) => {
                    self.meeting_ended(meeting_id).await;
                    needs_retry = false;
                }
                None => break,
            }
        }

        needs_retry
    }

    async fn meeting_started(&mut self, meeting: MeetingUrl) -> bool {
        let page = self.page.as_ref();
        let title = self.extractor.title(page, &meeting.code);
        let participants = self.observer.prime(page);

        info!("Meeting detected: {} ({})", meeting.code, title);
        self.meeting = Some(TabMeeting {
            code: meeting.code.clone(),
            title: title.clone(),
        });
        self.emit(ContentEvent::MeetingDetected {
            meeting_id: meeting.code.clone(),
            meeting_code: meeting.code,
            title,
            url: meeting.url,
            participants,
        })
        .await;

        let attached = self.observer.attach(self.page.as_ref());
        if !attached {
            debug!("Participant container not found yet");
        }
        self.refresh_indicator();
        !attached
    }

    async fn meeting_ended(&mut self, meeting_id: String) {
        info!("Meeting ended: {}", meeting_id);
        self.stop_recording().await;
        self.emit(ContentEvent::MeetingEnded { meeting_id }).await;

        self.meeting = None;
        self.observer.halt();
        self.refresh_indicator();
    }

    async fn participants_changed(&mut self) {
        if self.meeting.is_none() {
            return;
        }
        if let Some(participants) = self.observer.recompute(self.page.as_ref()) {
            debug!("Participants changed: {}", participants.len());
            self.emit(ContentEvent::ParticipantsUpdated { participants })
                .await;
        }
    }

    async fn handle_command(&mut self, command: ContentCommand) {
        debug!("Tab {} received {:?}", self.tab, command);
        match command {
            ContentCommand::StartRecording => self.start_recording(),
            ContentCommand::StopRecording => self.stop_recording().await,
        }
    }

    /// Request capture. The outcome arrives later as a [`RecorderEvent`].
    pub fn start_recording(&mut self) {
        let Some(meeting) = &self.meeting else {
            debug!("Ignoring start-recording outside a meeting");
            return;
        };

        if !self.recorder.start(&meeting.code, &meeting.title) {
            debug!("Recording already requested in tab {}", self.tab);
        }
    }

    pub async fn stop_recording(&mut self) {
        if let Some(artifact) = self.recorder.stop().await {
            self.recording_finished(artifact).await;
        }
    }

    async fn on_recorder_event(&mut self, event: RecorderEvent) {
        match event {
            RecorderEvent::Started { meeting_id } => {
                self.emit(ContentEvent::RecordingStarted { meeting_id }).await;
                self.refresh_indicator();
            }
            RecorderEvent::Failed(CaptureError::PermissionDenied(reason)) => {
                warn!("Recording permission denied: {}", reason);
                self.page
                    .show_notice(&format!("Recording failed: permission denied ({reason})"));
            }
            RecorderEvent::Failed(e) => warn!("Could not start recording: {}", e),
            RecorderEvent::Completed(artifact) => self.recording_finished(artifact).await,
        }
    }

    async fn recording_finished(&self, artifact: RecordingArtifact) {
        self.emit(ContentEvent::RecordingStopped {
            meeting_id: artifact.meeting_id.clone(),
        })
        .await;
        self.emit(ContentEvent::RecordingCompleted(artifact)).await;
        self.refresh_indicator();
    }

    fn refresh_indicator(&self) {
        let indicator = match (&self.meeting, self.recorder.is_recording()) {
            (None, _) => None,
            (Some(_), true) => Some(Indicator::Recording),
            (Some(_), false) => Some(Indicator::Connected),
        };
        self.page.show_indicator(indicator);
    }

    async fn emit(&self, event: ContentEvent) {
        let kind = event.as_str();
        if self.background.content_event(self.tab, event).await.is_err() {
            debug!("Background unavailable, dropped {}", kind);
        }
    }

    async fn teardown(&mut self) {
        self.stop_recording().await;
        self.meeting = None;
        self.observer.halt();
        self.page.show_indicator(None);
        let _ = self.background.close_tab(self.tab).await;
    }
}
