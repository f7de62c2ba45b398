//! Meeting presence detection from the page URL.

use anyhow::Result;
use regex::Regex;

/// A URL recognised as a meeting, e.g. `https://meet.google.com/abc-defg-hij`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingUrl {
    pub code: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Started(MeetingUrl),
    Ended { meeting_id: String },
}

pub struct MeetingDetector {
    host: String,
    code_pattern: Regex,
    current: Option<MeetingUrl>,
}

impl MeetingDetector {
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let code_pattern = Regex::new(r"^[a-z]+-[a-z]+-[a-z]+$")?;

        Ok(Self {
            host: host.into(),
            code_pattern,
            current: None,
        })
    }

    pub fn parse(&self, url: &str) -> Option<MeetingUrl> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))?;
        let split = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (host, tail) = rest.split_at(split);
        if !host.contains(self.host.as_str()) {
            return None;
        }

        let path = tail.split(['?', '#']).next().unwrap_or_default();
        let code = path.strip_prefix('/').unwrap_or(path);
        if !self.code_pattern.is_match(code) {
            return None;
        }

        Some(MeetingUrl {
            code: code.to_string(),
            url: url.to_string(),
        })
    }

    /// Compare `url` against the flagged meeting and report a transition.
    ///
    /// Moving straight from one meeting code to another reports `Ended`
    /// first; the next call reports `Started` for the new code.
    pub fn detect(&mut self, url: &str) -> Option<Detection> {
        let found = self.parse(url);
        let flagged = self.current.as_ref().map(|m| m.code.clone());

        match (flagged, found) {
            (None, Some(meeting)) => {
                self.current = Some(meeting.clone());
                Some(Detection::Started(meeting))
            }
            (Some(code), found) if found.as_ref().map(|m| m.code.as_str()) != Some(code.as_str()) => {
                self.current = None;
                Some(Detection::Ended { meeting_id: code })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> MeetingDetector {
        MeetingDetector::new("meet.google.com").unwrap()
    }

    #[test]
    fn test_dashed_code_is_detected() {
        let d = detector();
        let meeting = d.parse("https://meet.google.com/abc-defg-hij").unwrap();
        assert_eq!(meeting.code, "abc-defg-hij");
    }

    #[test]
    fn test_code_without_dashes_is_rejected() {
        assert!(detector().parse("https://meet.google.com/abcdefghij").is_none());
    }

    #[test]
    fn test_query_and_fragment_are_ignored() {
        let d = detector();
        let meeting = d
            .parse("https://meet.google.com/abc-defg-hij?authuser=0#chat")
            .unwrap();
        assert_eq!(meeting.code, "abc-defg-hij");
        assert_eq!(meeting.url, "https://meet.google.com/abc-defg-hij?authuser=0#chat");
    }

    #[test]
    fn test_other_shapes_are_rejected() {
        let d = detector();
        for url in [
            "https://meet.google.com/",
            "https://meet.google.com/landing",
            "https://meet.google.com/ABC-DEFG-HIJ",
            "https://meet.google.com/abc-defg-hij/extra",
            "https://meet.google.com/abc-d3fg-hij",
            "https://example.com/abc-defg-hij",
            "meet.google.com/abc-defg-hij",
        ] {
            assert!(d.parse(url).is_none(), "{url} should not match");
        }
    }

    #[test]
    fn test_detect_transitions() {
        let mut d = detector();
        assert_eq!(d.detect("https://meet.google.com/"), None);

        let started = d.detect("https://meet.google.com/abc-defg-hij");
        assert!(matches!(started, Some(Detection::Started(ref m)) if m.code == "abc-defg-hij"));

        // Flagged meeting is not re-announced.
        assert_eq!(d.detect("https://meet.google.com/abc-defg-hij?hs=1"), None);

        assert_eq!(
            d.detect("https://meet.google.com/"),
            Some(Detection::Ended {
                meeting_id: "abc-defg-hij".to_string()
            })
        );
        assert_eq!(d.detect("https://meet.google.com/"), None);
    }

    #[test]
    fn test_switching_meetings_ends_then_starts() {
        let mut d = detector();
        d.detect("https://meet.google.com/abc-defg-hij");

        assert_eq!(
            d.detect("https://meet.google.com/xyz-uvwx-rst"),
            Some(Detection::Ended {
                meeting_id: "abc-defg-hij".to_string()
            })
        );
        assert!(matches!(
            d.detect("https://meet.google.com/xyz-uvwx-rst"),
            Some(Detection::Started(ref m)) if m.code == "xyz-uvwx-rst"
        ));
    }
}
