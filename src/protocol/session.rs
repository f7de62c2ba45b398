//! Meeting and participant records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one attendee at observation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Best-effort id, not stable across re-renders of the page.
    pub id: String,
    pub name: String,
    pub is_host: bool,
    pub is_muted: bool,
    pub has_camera: bool,
    pub is_camera_on: bool,
    pub join_time: DateTime<Utc>,
}

/// The meeting currently detected in a tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSession {
    pub meeting_id: String,
    pub meeting_code: String,
    pub title: String,
    pub url: String,
    pub start_time: DateTime<Utc>,
    pub participants: Vec<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_email: Option<String>,
    pub is_recording: bool,
}

impl MeetingSession {
    pub fn new(
        meeting_id: String,
        meeting_code: String,
        title: String,
        url: String,
        participants: Vec<Participant>,
    ) -> Self {
        Self {
            meeting_id,
            meeting_code,
            title,
            url,
            start_time: Utc::now(),
            participants,
            host_email: None,
            is_recording: false,
        }
    }
}
