//! Assembled recording payload.

use serde::{Deserialize, Serialize};

/// A finished recording, ready to hand to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingArtifact {
    pub meeting_id: String,
    pub title: String,
    /// Travels as a `data:` URL.
    #[serde(rename = "recording", with = "data_url")]
    pub data: DataUrl,
    /// Whole seconds between capture start and stop.
    pub duration: u64,
    pub mime_type: String,
}

impl RecordingArtifact {
    pub fn size(&self) -> usize {
        self.data.bytes.len()
    }
}

/// Bytes tagged with the MIME type they were captured as.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

mod data_url {
    use super::DataUrl;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DataUrl, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = BASE64.encode(&value.bytes);
        serializer.serialize_str(&format!("data:{};base64,{}", value.mime_type, encoded))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DataUrl, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let rest = raw
            .strip_prefix("data:")
            .ok_or_else(|| D::Error::custom("recording is not a data URL"))?;
        let (mime_type, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| D::Error::custom("recording data URL is not base64"))?;
        let bytes = BASE64.decode(payload).map_err(D::Error::custom)?;

        Ok(DataUrl::new(mime_type, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(bytes: Vec<u8>) -> RecordingArtifact {
        RecordingArtifact {
            meeting_id: "abc-defg-hij".to_string(),
            title: "Standup".to_string(),
            data: DataUrl::new("audio/webm", bytes),
            duration: 42,
            mime_type: "audio/webm".to_string(),
        }
    }

    #[test]
    fn test_recording_serializes_as_data_url() {
        let value = serde_json::to_value(artifact(b"hello".to_vec())).unwrap();
        assert_eq!(value["recording"], "data:audio/webm;base64,aGVsbG8=");
        assert_eq!(value["mimeType"], "audio/webm");
        assert_eq!(value["duration"], 42);
    }

    #[test]
    fn test_recording_parses_data_url() {
        let json = r#"{
            "meetingId": "abc-defg-hij",
            "title": "Standup",
            "recording": "data:audio/webm;base64,aGVsbG8=",
            "duration": 3,
            "mimeType": "audio/webm"
        }"#;
        let parsed: RecordingArtifact = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.bytes, b"hello");
        assert_eq!(parsed.size(), 5);
    }

    #[test]
    fn test_rejects_plain_base64() {
        let json = r#"{
            "meetingId": "m",
            "title": "t",
            "recording": "aGVsbG8=",
            "duration": 3,
            "mimeType": "audio/webm"
        }"#;
        assert!(serde_json::from_str::<RecordingArtifact>(json).is_err());
    }
}
