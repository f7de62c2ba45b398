//! Best-effort extraction of meeting title and participants from the page.
//!
//! Each concern has a ranked list of strategies. The first one that returns
//! `Some` wins; the last one always succeeds so callers never see a failure.

use tracing::trace;

use crate::page::{HostPage, PageElement, Selector};

/// Attendee as read from the page, before it is stamped with a join time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedParticipant {
    pub id: String,
    pub name: String,
    pub is_host: bool,
    pub is_muted: bool,
    pub has_camera: bool,
    pub is_camera_on: bool,
}

pub trait TitleStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, page: &dyn HostPage, meeting_code: &str) -> Option<String>;
}

pub trait ParticipantStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, page: &dyn HostPage) -> Option<Vec<ObservedParticipant>>;
}

/// `[data-meeting-title]`.
pub struct TitleAttribute;

impl TitleStrategy for TitleAttribute {
    fn name(&self) -> &'static str {
        "title-attribute"
    }

    fn extract(&self, page: &dyn HostPage, _meeting_code: &str) -> Option<String> {
        page.query(&Selector::attr("data-meeting-title"))
            .and_then(|el| el.attribute("data-meeting-title").map(str::trim).map(String::from))
            .filter(|title| !title.is_empty())
    }
}

/// First heading with visible text.
pub struct FirstHeading;

impl TitleStrategy for FirstHeading {
    fn name(&self) -> &'static str {
        "first-heading"
    }

    fn extract(&self, page: &dyn HostPage, _meeting_code: &str) -> Option<String> {
        page.query_all(&Selector::tags(["h1", "h2", "h3"]))
            .iter()
            .map(|el| el.text_content().trim().to_string())
            .find(|text| !text.is_empty())
    }
}

/// `Google Meet: <code>`, or plain `Google Meet` without a code.
pub struct SynthesizedTitle;

impl TitleStrategy for SynthesizedTitle {
    fn name(&self) -> &'static str {
        "synthesized"
    }

    fn extract(&self, _page: &dyn HostPage, meeting_code: &str) -> Option<String> {
        if meeting_code.is_empty() {
            Some("Google Meet".to_string())
        } else {
            Some(format!("Google Meet: {meeting_code}"))
        }
    }
}

/// Video tiles carrying `data-participant-id`.
pub struct ParticipantTiles;

impl ParticipantStrategy for ParticipantTiles {
    fn name(&self) -> &'static str {
        "participant-tiles"
    }

    fn extract(&self, page: &dyn HostPage) -> Option<Vec<ObservedParticipant>> {
        let tiles = page.query_all(&Selector::attr("data-participant-id"));
        if tiles.is_empty() {
            return None;
        }

        Some(tiles.iter().map(tile_participant).collect())
    }
}

fn tile_participant(tile: &PageElement) -> ObservedParticipant {
    let name = tile
        .query(&Selector::class("participant-name"))
        .map(|el| el.text_content().trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    let camera_off = tile.query(&Selector::class("camera-off-icon")).is_some();
    let has_camera = tile.attribute("data-camera").map_or(true, |v| v != "none");

    ObservedParticipant {
        id: tile
            .attribute("data-participant-id")
            .unwrap_or_default()
            .to_string(),
        name,
        is_host: tile.has_class("is-host"),
        is_muted: tile.query(&Selector::class("muted-icon")).is_some(),
        has_camera,
        is_camera_on: has_camera && !camera_off,
    }
}

/// Rows of the people panel: `[role=listitem][data-participant-name]`.
pub struct PeoplePanel;

impl ParticipantStrategy for PeoplePanel {
    fn name(&self) -> &'static str {
        "people-panel"
    }

    fn extract(&self, page: &dyn HostPage) -> Option<Vec<ObservedParticipant>> {
        let rows = page.query_all(&Selector::All(vec![
            Selector::attr_eq("role", "listitem"),
            Selector::attr("data-participant-name"),
        ]));
        if rows.is_empty() {
            return None;
        }

        Some(
            rows.iter()
                .enumerate()
                .map(|(index, row)| {
                    let name = row
                        .attribute("data-participant-name")
                        .unwrap_or_default()
                        .trim()
                        .to_string();
                    ObservedParticipant {
                        id: format!("panel-{index}"),
                        name,
                        is_host: row.attribute("data-host") == Some("true"),
                        is_muted: row.query(&Selector::class("muted-icon")).is_some(),
                        has_camera: false,
                        is_camera_on: false,
                    }
                })
                .collect(),
        )
    }
}

/// Nothing recognisable on the page.
pub struct NoParticipants;

impl ParticipantStrategy for NoParticipants {
    fn name(&self) -> &'static str {
        "none"
    }

    fn extract(&self, _page: &dyn HostPage) -> Option<Vec<ObservedParticipant>> {
        Some(Vec::new())
    }
}

pub struct Extractor {
    titles: Vec<Box<dyn TitleStrategy>>,
    participants: Vec<Box<dyn ParticipantStrategy>>,
}

impl Extractor {
    pub fn new(
        titles: Vec<Box<dyn TitleStrategy>>,
        participants: Vec<Box<dyn ParticipantStrategy>>,
    ) -> Self {
        Self {
            titles,
            participants,
        }
    }

    pub fn title(&self, page: &dyn HostPage, meeting_code: &str) -> String {
        self.titles
            .iter()
            .find_map(|s| {
                let title = s.extract(page, meeting_code)?;
                trace!("Title from {}", s.name());
                Some(title)
            })
            .unwrap_or_else(|| "Google Meet".to_string())
    }

    pub fn participants(&self, page: &dyn HostPage) -> Vec<ObservedParticipant> {
        self.participants
            .iter()
            .find_map(|s| {
                let found = s.extract(page)?;
                trace!("{} participants from {}", found.len(), s.name());
                Some(found)
            })
            .unwrap_or_default()
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(
            vec![
                Box::new(TitleAttribute),
                Box::new(FirstHeading),
                Box::new(SynthesizedTitle),
            ],
            vec![
                Box::new(ParticipantTiles),
                Box::new(PeoplePanel),
                Box::new(NoParticipants),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::SnapshotPage;

    const URL: &str = "https://meet.google.com/abc-defg-hij";

    fn tile(id: &str, name: &str) -> PageElement {
        PageElement::new("div")
            .attr("data-participant-id", id)
            .child(PageElement::new("span").class("participant-name").text(name))
    }

    #[test]
    fn test_title_prefers_attribute() {
        let page = SnapshotPage::with_document(
            URL,
            PageElement::new("body")
                .child(PageElement::new("h1").text("Heading"))
                .child(PageElement::new("div").attr("data-meeting-title", "Weekly sync")),
        );
        assert_eq!(Extractor::default().title(&page, "abc-defg-hij"), "Weekly sync");
    }

    #[test]
    fn test_title_falls_back_to_heading() {
        let page = SnapshotPage::with_document(
            URL,
            PageElement::new("body")
                .child(PageElement::new("h1").text("   "))
                .child(PageElement::new("h2").text(" Planning ")),
        );
        assert_eq!(Extractor::default().title(&page, "abc-defg-hij"), "Planning");
    }

    #[test]
    fn test_title_synthesized_from_code() {
        let page = SnapshotPage::new(URL);
        assert_eq!(
            Extractor::default().title(&page, "abc-defg-hij"),
            "Google Meet: abc-defg-hij"
        );
    }

    #[test]
    fn test_title_without_strategies_still_has_a_value() {
        let extractor = Extractor::new(Vec::new(), Vec::new());
        let page = SnapshotPage::new(URL);
        assert_eq!(extractor.title(&page, "abc-defg-hij"), "Google Meet");
        assert!(extractor.participants(&page).is_empty());
    }

    #[test]
    fn test_participant_tiles() {
        let page = SnapshotPage::with_document(
            URL,
            PageElement::new("body").child(
                PageElement::new("div")
                    .attr("data-participants-container", "")
                    .child(tile("p1", "Ada").class("is-host"))
                    .child(
                        tile("p2", "Grace")
                            .child(PageElement::new("i").class("muted-icon"))
                            .child(PageElement::new("i").class("camera-off-icon")),
                    )
                    .child(PageElement::new("div").attr("data-participant-id", "p3")),
            ),
        );

        let participants = Extractor::default().participants(&page);
        assert_eq!(participants.len(), 3);

        assert_eq!(participants[0].name, "Ada");
        assert!(participants[0].is_host);
        assert!(participants[0].is_camera_on);

        assert!(participants[1].is_muted);
        assert!(participants[1].has_camera);
        assert!(!participants[1].is_camera_on);

        assert_eq!(participants[2].name, "Unknown");
    }

    #[test]
    fn test_people_panel_fallback() {
        let page = SnapshotPage::with_document(
            URL,
            PageElement::new("body").child(
                PageElement::new("ul")
                    .child(
                        PageElement::new("li")
                            .attr("role", "listitem")
                            .attr("data-participant-name", "Linus")
                            .attr("data-host", "true"),
                    )
                    .child(PageElement::new("li").attr("role", "listitem")),
            ),
        );

        let participants = Extractor::default().participants(&page);
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].id, "panel-0");
        assert_eq!(participants[0].name, "Linus");
        assert!(participants[0].is_host);
    }

    #[test]
    fn test_no_participants_is_empty_not_error() {
        let page = SnapshotPage::new(URL);
        assert!(Extractor::default().participants(&page).is_empty());
    }
}
