//! Scripted end-to-end runs against the in-memory page and capture device.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{load_config, SimulateCliArgs};
use crate::app::Bridge;
use crate::background::LogBadge;
use crate::config::Config;
use crate::connector::ExternalConnector;
use crate::media::SyntheticMedia;
use crate::page::{PageElement, SnapshotPage};
use crate::protocol::{AppCommand, AppEvent};

/// Time given to in-flight messages after every step.
const STEP_SETTLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationScript {
    /// URL the tab is on when the content script loads.
    #[serde(default = "default_start_url")]
    pub start_url: String,
    /// Origin the dashboard connects from.
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_start_url() -> String {
    "about:blank".to_string()
}

fn default_origin() -> String {
    "http://localhost:5173".to_string()
}

impl SimulationScript {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse scenario")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    /// Client-side navigation.
    Navigate { url: String },
    /// Replace the page contents.
    Page {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        participants: Vec<SimParticipant>,
    },
    Connect,
    Disconnect,
    StartRecording,
    StopRecording,
    /// Recording toggle from the extension popup rather than the dashboard.
    Popup { record: bool },
    Wait { ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimParticipant {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub host: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_camera")]
    pub camera: bool,
}

fn default_camera() -> bool {
    true
}

pub async fn handle_simulate_command(args: SimulateCliArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let script = SimulationScript::load(&args.script)?;

    run_script(&config, &script, |event| match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!("Could not encode {}: {}", event.as_str(), e),
    })
    .await
}

/// Run `script` and hand every event the dashboard receives to `sink`.
pub async fn run_script(
    config: &Config,
    script: &SimulationScript,
    sink: impl Fn(&AppEvent) + Send + Sync + 'static,
) -> Result<()> {
    let mut bridge = Bridge::start(config, Box::new(LogBadge));
    let page = Arc::new(SnapshotPage::new(script.start_url.clone()));
    bridge
        .open_tab(page.clone(), Arc::new(SyntheticMedia::default()))
        .await?;

    let mut connector = bridge.connector(&script.origin);
    connector.on_message(sink);

    for (index, step) in script.steps.iter().enumerate() {
        debug!("Step {}: {:?}", index + 1, step);
        match step {
            Step::Navigate { url } => page.set_location(url.clone()),
            Step::Page {
                title,
                participants,
            } => page.replace_body(meet_body(title.as_deref(), participants)),
            Step::Connect => {
                if !connector.connect(bridge.runtime()).await {
                    warn!("Dashboard could not connect from {}", script.origin);
                }
            }
            Step::Disconnect => connector.disconnect().await,
            Step::StartRecording => {
                if !connector.start_recording().await {
                    warn!("start-recording not sent: dashboard is not connected");
                }
            }
            Step::StopRecording => {
                if !connector.stop_recording().await {
                    warn!("stop-recording not sent: dashboard is not connected");
                }
            }
            Step::Popup { record } => {
                let command = if *record {
                    AppCommand::StartRecording
                } else {
                    AppCommand::StopRecording
                };
                bridge.background().request_recording(command).await?;
            }
            Step::Wait { ms } => pump_for(&mut connector, Duration::from_millis(*ms)).await,
        }
        pump_for(&mut connector, STEP_SETTLE).await;
    }

    if let Some(meeting) = bridge.background().meeting_info().await {
        info!(
            "Scenario finished in meeting {} with {} participants",
            meeting.meeting_id,
            meeting.participants.len()
        );
    }

    connector.disconnect().await;
    bridge.shutdown().await;
    Ok(())
}

/// Deliver dashboard events until `duration` has passed.
async fn pump_for(connector: &mut ExternalConnector, duration: Duration) {
    let deadline = sleep(duration);
    tokio::pin!(deadline);

    loop {
        if !connector.is_connected() {
            deadline.await;
            return;
        }
        tokio::select! {
            _ = &mut deadline => return,
            event = connector.next_event() => {
                if event.is_none() {
                    info!("Dashboard lost its connection");
                }
            }
        }
    }
}

/// Meet-like markup: optional title element and a participant container
/// with one tile per participant.
pub fn meet_body(title: Option<&str>, participants: &[SimParticipant]) -> PageElement {
    let mut body = PageElement::new("body");
    if let Some(title) = title {
        body = body.child(PageElement::new("div").attr("data-meeting-title", title));
    }

    let tiles = participants.iter().enumerate().map(|(index, p)| {
        let id = p.id.clone().unwrap_or_else(|| format!("p{}", index + 1));
        let mut tile = PageElement::new("div")
            .attr("data-participant-id", id)
            .child(PageElement::new("span").class("participant-name").text(&p.name));
        if p.host {
            tile = tile.class("is-host");
        }
        if p.muted {
            tile = tile.child(PageElement::new("i").class("muted-icon"));
        }
        if !p.camera {
            tile = tile.child(PageElement::new("i").class("camera-off-icon"));
        }
        tile
    });

    body.child(
        PageElement::new("div")
            .attr("data-participants-container", "")
            .children(tiles),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const SCENARIO: &str = r#"
start_url = "https://meet.google.com/"

[[steps]]
action = "page"
title = "Design review"
participants = [{ name = "Ada", host = true }, { name = "Grace", muted = true }]

[[steps]]
action = "navigate"
url = "https://meet.google.com/abc-defg-hij"

[[steps]]
action = "wait"
ms = 1500

[[steps]]
action = "connect"

[[steps]]
action = "start-recording"

[[steps]]
action = "wait"
ms = 3000

[[steps]]
action = "stop-recording"

[[steps]]
action = "navigate"
url = "https://meet.google.com/"

[[steps]]
action = "wait"
ms = 1500
"#;

    #[test]
    fn test_parse_scenario() {
        let script = SimulationScript::parse(SCENARIO).unwrap();
        assert_eq!(script.origin, "http://localhost:5173");
        assert_eq!(script.steps.len(), 9);
        assert_eq!(script.steps[3], Step::Connect);
        assert_eq!(script.steps[2], Step::Wait { ms: 1500 });
        match &script.steps[0] {
            Step::Page {
                title,
                participants,
            } => {
                assert_eq!(title.as_deref(), Some("Design review"));
                assert!(participants[0].host);
                assert!(participants[1].muted);
                assert!(participants[1].camera);
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = SimulationScript::parse("[[steps]]\naction = \"teleport\"\n").unwrap_err();
        assert!(err.to_string().contains("Failed to parse scenario"));
    }

    #[test]
    fn test_meet_body_tiles() {
        let body = meet_body(
            Some("Sync"),
            &[SimParticipant {
                id: None,
                name: "Ada".to_string(),
                host: true,
                muted: false,
                camera: false,
            }],
        );
        let page = SnapshotPage::with_document("https://meet.google.com/abc-defg-hij", body);
        let extractor = crate::content::Extractor::default();

        assert_eq!(extractor.title(&page, "abc-defg-hij"), "Sync");
        let participants = extractor.participants(&page);
        assert_eq!(participants[0].id, "p1");
        assert!(participants[0].is_host);
        assert!(!participants[0].is_camera_on);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_reaches_dashboard() {
        let script = SimulationScript::parse(SCENARIO).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            move |event: &AppEvent| seen.lock().unwrap().push(event.clone())
        };

        run_script(&Config::default(), &script, sink).await.unwrap();

        let seen = seen.lock().unwrap();
        let kinds: Vec<_> = seen.iter().map(AppEvent::as_str).collect();
        assert_eq!(
            kinds,
            vec![
                "meeting-started",
                "recording-started",
                "recording-stopped",
                "recording-completed",
                "meeting-ended",
            ]
        );
        match &seen[0] {
            AppEvent::MeetingStarted { meeting } => {
                assert_eq!(meeting.title, "Design review");
                assert_eq!(meeting.participants.len(), 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
