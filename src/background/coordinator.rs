//! Background coordinator.
//!
//! Owns the current meeting and the dashboard connection, relays events
//! between content tabs and the dashboard, and keeps the badge in sync.
//!
//! Idle → InMeeting on meeting-detected, InMeeting ⇄ Recording on
//! recording-started/stopped, any → Idle on meeting-ended.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::badge::ActionBadge;
use super::handle::{CoordinatorInput, CoordinatorSnapshot};
use super::state::CoordinatorState;
use crate::config::BadgeConfig;
use crate::protocol::{
    AppCommand, AppEvent, ContentCommand, ContentEvent, MeetingSession, Participant,
    RecordingArtifact,
};
use crate::transport::{ContentTab, ExternalConnection, TabId};

pub struct Coordinator {
    meeting: Option<MeetingSession>,
    meeting_tab: Option<TabId>,
    tabs: HashMap<TabId, ContentTab>,
    connection: Option<ExternalConnection>,
    badge: Box<dyn ActionBadge>,
    badge_config: BadgeConfig,
}

impl Coordinator {
    pub fn new(badge: Box<dyn ActionBadge>, badge_config: BadgeConfig) -> Self {
        Self {
            meeting: None,
            meeting_tab: None,
            tabs: HashMap::new(),
            connection: None,
            badge,
            badge_config,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        CoordinatorState::of(self.meeting.as_ref())
    }

    pub fn meeting(&self) -> Option<&MeetingSession> {
        self.meeting.as_ref()
    }

    pub fn connection_id(&self) -> Option<Uuid> {
        self.connection.as_ref().map(ExternalConnection::id)
    }

    /// Process inputs until every handle is dropped or `shutdown` fires.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<CoordinatorInput>,
        shutdown: CancellationToken,
    ) {
        info!("Background coordinator started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                input = inputs.recv() => match input {
                    Some(input) => self.handle(input),
                    None => break,
                },
            }
        }

        self.teardown();
        info!("Background coordinator stopped");
    }

    pub fn handle(&mut self, input: CoordinatorInput) {
        let before = self.state();

        match input {
            CoordinatorInput::Content { tab, event } => self.on_content(tab, event),
            CoordinatorInput::TabOpened(tab) => {
                debug!("Content tab {} registered", tab.id());
                self.tabs.insert(tab.id(), tab);
            }
            CoordinatorInput::TabClosed(tab) => self.on_tab_closed(tab),
            CoordinatorInput::Attach(connection) => self.attach(connection),
            CoordinatorInput::Detach(id) => self.detach(id),
            CoordinatorInput::App {
                connection,
                command,
            } => {
                debug!("Command {:?} from connection {}", command, connection);
                self.forward_command(command);
            }
            CoordinatorInput::Local(command) => self.forward_command(command),
            CoordinatorInput::Snapshot(reply) => {
                let _ = reply.send(CoordinatorSnapshot {
                    state: self.state(),
                    meeting: self.meeting.clone(),
                    connection: self.connection_id(),
                });
            }
        }

        let after = self.state();
        if before != after {
            info!("Coordinator {} -> {}", before.as_str(), after.as_str());
            self.refresh_badge(after);
        }
    }

    fn on_content(&mut self, tab: TabId, event: ContentEvent) {
        debug!("Tab {} sent {}", tab, event.as_str());

        match event {
            ContentEvent::MeetingDetected {
                meeting_id,
                meeting_code,
                title,
                url,
                participants,
            } => {
                let session = MeetingSession::new(meeting_id, meeting_code, title, url, participants);
                self.on_meeting_detected(tab, session);
            }
            ContentEvent::MeetingEnded { meeting_id } => self.on_meeting_ended(tab, &meeting_id),
            ContentEvent::ParticipantsUpdated { participants } => {
                self.on_participants_updated(tab, participants)
            }
            ContentEvent::RecordingStarted { meeting_id } => {
                self.on_recording_changed(tab, &meeting_id, true)
            }
            ContentEvent::RecordingStopped { meeting_id } => {
                self.on_recording_changed(tab, &meeting_id, false)
            }
            ContentEvent::RecordingCompleted(artifact) => self.on_recording_completed(artifact),
        }
    }

    fn on_meeting_detected(&mut self, tab: TabId, session: MeetingSession) {
        let replaced = self
            .meeting
            .as_ref()
            .map(|m| (m.meeting_id.clone(), m.is_recording));
        if let Some((previous_id, recording)) = replaced {
            warn!(
                "Meeting {} replaced by {} from tab {}",
                previous_id, session.meeting_id, tab
            );
            if recording {
                self.stop_replaced_recording(tab);
            }
            self.end_meeting();
        }

        info!("Meeting detected: {} ({})", session.meeting_id, session.title);
        self.post(AppEvent::MeetingStarted {
            meeting: session.clone(),
        });
        self.meeting = Some(session);
        self.meeting_tab = Some(tab);
    }

    /// Ask the tab that owned the replaced meeting to stop its recorder.
    fn stop_replaced_recording(&self, detecting_tab: TabId) {
        let Some(owner) = self
            .meeting_tab
            .filter(|owner| *owner != detecting_tab)
            .and_then(|id| self.tabs.get(&id))
        else {
            return;
        };
        if owner.send(ContentCommand::StopRecording).is_err() {
            debug!("Tab {} is gone, its recording cannot be stopped", owner.id());
        }
    }

    fn on_meeting_ended(&mut self, tab: TabId, meeting_id: &str) {
        if !self.owns_meeting(tab) {
            debug!("Ignoring meeting-ended from tab {} without the current meeting", tab);
            return;
        }
        if self
            .meeting
            .as_ref()
            .is_some_and(|m| m.meeting_id != meeting_id)
        {
            debug!("Ignoring meeting-ended for stale meeting {}", meeting_id);
            return;
        }
        self.end_meeting();
    }

    fn end_meeting(&mut self) {
        let Some(meeting) = self.meeting.take() else {
            return;
        };
        self.meeting_tab = None;

        info!("Meeting ended: {}", meeting.meeting_id);
        if meeting.is_recording {
            self.post(AppEvent::RecordingStopped {
                meeting_id: meeting.meeting_id.clone(),
            });
        }
        self.post(AppEvent::MeetingEnded {
            meeting_id: meeting.meeting_id,
        });
    }

    fn on_participants_updated(&mut self, tab: TabId, participants: Vec<Participant>) {
        if !self.owns_meeting(tab) {
            return;
        }
        let Some(meeting) = self.meeting.as_mut() else {
            return;
        };

        debug!("Meeting {} now has {} participants", meeting.meeting_id, participants.len());
        meeting.participants = participants.clone();
        let meeting_id = meeting.meeting_id.clone();
        self.post(AppEvent::ParticipantsUpdated {
            meeting_id,
            participants,
        });
    }

    fn on_recording_changed(&mut self, tab: TabId, meeting_id: &str, recording: bool) {
        if !self.owns_meeting(tab) {
            return;
        }
        let Some(meeting) = self.meeting.as_mut() else {
            return;
        };
        if meeting.meeting_id != meeting_id || meeting.is_recording == recording {
            return;
        }

        meeting.is_recording = recording;
        let meeting_id = meeting.meeting_id.clone();
        self.post(if recording {
            AppEvent::RecordingStarted { meeting_id }
        } else {
            AppEvent::RecordingStopped { meeting_id }
        });
    }

    fn on_recording_completed(&mut self, artifact: RecordingArtifact) {
        info!(
            "Recording for {} completed: {} bytes, {}s",
            artifact.meeting_id,
            artifact.size(),
            artifact.duration
        );
        self.post(AppEvent::RecordingCompleted(artifact));
    }

    fn on_tab_closed(&mut self, tab: TabId) {
        self.tabs.remove(&tab);
        if self.owns_meeting(tab) && self.meeting.is_some() {
            info!("Tab {} closed during a meeting", tab);
            self.end_meeting();
        }
    }

    fn attach(&mut self, connection: ExternalConnection) {
        info!(
            "Dashboard {} attached from {} ({})",
            connection.id(),
            connection.origin(),
            connection.name()
        );
        if let Some(previous) = &self.connection {
            debug!("Replacing dashboard connection {}", previous.id());
        }
        self.connection = Some(connection);

        if let Some(meeting) = self.meeting.clone() {
            let recording = meeting.is_recording;
            let meeting_id = meeting.meeting_id.clone();
            self.post(AppEvent::MeetingStarted { meeting });
            if recording {
                self.post(AppEvent::RecordingStarted { meeting_id });
            }
        }
    }

    fn detach(&mut self, id: Uuid) {
        if self.connection_id() == Some(id) {
            info!("Dashboard {} disconnected", id);
            self.connection = None;
        } else {
            debug!("Ignoring disconnect from replaced connection {}", id);
        }
    }

    fn forward_command(&mut self, command: AppCommand) {
        if self.meeting.is_none() {
            debug!("Dropping {:?}: no current meeting", command);
            return;
        }
        let Some(tab) = self.meeting_tab.and_then(|id| self.tabs.get(&id)) else {
            debug!("Dropping {:?}: meeting tab is not registered", command);
            return;
        };

        if tab.send(command.into()).is_err() {
            warn!("Meeting tab {} is gone, dropping {:?}", tab.id(), command);
        }
    }

    fn post(&mut self, event: AppEvent) {
        let Some(connection) = &self.connection else {
            return;
        };

        let kind = event.as_str();
        if !connection.is_alive() {
            info!("Dashboard {} is gone, dropping {}", connection.id(), kind);
            self.connection = None;
            return;
        }
        if connection.post(event).is_err() {
            info!("Dashboard {} went away while sending {}", connection.id(), kind);
            self.connection = None;
        }
    }

    fn owns_meeting(&self, tab: TabId) -> bool {
        self.meeting_tab.map_or(true, |owner| owner == tab)
    }

    fn refresh_badge(&self, state: CoordinatorState) {
        let cfg = &self.badge_config;
        match state {
            CoordinatorState::Idle => self.badge.clear(),
            CoordinatorState::InMeeting => self.badge.set(&cfg.meeting_text, &cfg.meeting_color),
            CoordinatorState::Recording => {
                self.badge.set(&cfg.recording_text, &cfg.recording_color)
            }
        }
    }

    fn teardown(&mut self) {
        self.connection = None;
        self.tabs.clear();
        if self.meeting.take().is_some() {
            self.meeting_tab = None;
            self.badge.clear();
        }
    }
}
