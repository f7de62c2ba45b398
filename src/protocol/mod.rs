//! Message schema shared by the content script, the background coordinator
//! and the dashboard connector.
//!
//! Every message is a JSON object tagged by a kebab-case `"type"` field with
//! camelCase payload fields.

pub mod artifact;
pub mod session;

pub use artifact::RecordingArtifact;
pub use session::{MeetingSession, Participant};

use serde::{Deserialize, Serialize};

/// Signals emitted by the content script towards the background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentEvent {
    #[serde(rename_all = "camelCase")]
    MeetingDetected {
        meeting_id: String,
        meeting_code: String,
        title: String,
        url: String,
        participants: Vec<Participant>,
    },
    #[serde(rename_all = "camelCase")]
    MeetingEnded { meeting_id: String },
    ParticipantsUpdated { participants: Vec<Participant> },
    #[serde(rename_all = "camelCase")]
    RecordingStarted { meeting_id: String },
    #[serde(rename_all = "camelCase")]
    RecordingStopped { meeting_id: String },
    RecordingCompleted(RecordingArtifact),
}

impl ContentEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MeetingDetected { .. } => "meeting-detected",
            Self::MeetingEnded { .. } => "meeting-ended",
            Self::ParticipantsUpdated { .. } => "participants-updated",
            Self::RecordingStarted { .. } => "recording-started",
            Self::RecordingStopped { .. } => "recording-stopped",
            Self::RecordingCompleted(_) => "recording-completed",
        }
    }
}

/// Commands the background relays to the content script of the meeting tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentCommand {
    StartRecording,
    StopRecording,
}

/// Events the background pushes to an attached dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AppEvent {
    MeetingStarted { meeting: MeetingSession },
    #[serde(rename_all = "camelCase")]
    MeetingEnded { meeting_id: String },
    #[serde(rename_all = "camelCase")]
    ParticipantsUpdated {
        meeting_id: String,
        participants: Vec<Participant>,
    },
    #[serde(rename_all = "camelCase")]
    RecordingStarted { meeting_id: String },
    #[serde(rename_all = "camelCase")]
    RecordingStopped { meeting_id: String },
    RecordingCompleted(RecordingArtifact),
}

impl AppEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MeetingStarted { .. } => "meeting-started",
            Self::MeetingEnded { .. } => "meeting-ended",
            Self::ParticipantsUpdated { .. } => "participants-updated",
            Self::RecordingStarted { .. } => "recording-started",
            Self::RecordingStopped { .. } => "recording-stopped",
            Self::RecordingCompleted(_) => "recording-completed",
        }
    }
}

/// Commands a dashboard issues to the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AppCommand {
    StartRecording,
    StopRecording,
}

impl From<AppCommand> for ContentCommand {
    fn from(command: AppCommand) -> Self {
        match command {
            AppCommand::StartRecording => ContentCommand::StartRecording,
            AppCommand::StopRecording => ContentCommand::StopRecording,
        }
    }
}
