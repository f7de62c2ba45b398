use serde::{Deserialize, Serialize};

use crate::protocol::MeetingSession;

/// Coordinator phase, derived from the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    InMeeting,
    Recording,
}

impl CoordinatorState {
    pub fn of(meeting: Option<&MeetingSession>) -> Self {
        match meeting {
            None => Self::Idle,
            Some(m) if m.is_recording => Self::Recording,
            Some(_) => Self::InMeeting,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InMeeting => "in_meeting",
            Self::Recording => "recording",
        }
    }
}
