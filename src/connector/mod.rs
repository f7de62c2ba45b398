//! Dashboard-side client of the extension.
//!
//! Opens a single port into the background, dispatches incoming events to
//! registered callbacks and sends recording commands back. There is no
//! reconnection: once the port closes the connector stays disconnected until
//! `connect` is called again.

use tracing::{debug, info, warn};

use crate::config::ConnectorConfig;
use crate::protocol::{AppCommand, AppEvent, MeetingSession, RecordingArtifact};
use crate::transport::{ExtensionRuntime, ExternalPort};

type Handler<T> = Box<dyn Fn(&T) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorOptions {
    pub extension_id: String,
    pub port_name: String,
    /// Origin of the page the connector runs in.
    pub origin: String,
}

impl ConnectorOptions {
    pub fn from_config(config: &ConnectorConfig, origin: impl Into<String>) -> Self {
        Self {
            extension_id: config.extension_id.clone(),
            port_name: config.port_name.clone(),
            origin: origin.into(),
        }
    }
}

pub struct ExternalConnector {
    options: ConnectorOptions,
    port: Option<ExternalPort>,
    message_handlers: Vec<Handler<AppEvent>>,
    started_handlers: Vec<Handler<MeetingSession>>,
    ended_handlers: Vec<Box<dyn Fn(&str) + Send + Sync>>,
    completed_handlers: Vec<Handler<RecordingArtifact>>,
}

impl ExternalConnector {
    pub fn new(options: ConnectorOptions) -> Self {
        Self {
            options,
            port: None,
            message_handlers: Vec::new(),
            started_handlers: Vec::new(),
            ended_handlers: Vec::new(),
            completed_handlers: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Open the port. `false` when the extension is missing or refuses this
    /// origin. Calling it while connected replaces the current port.
    pub async fn connect(&mut self, runtime: &ExtensionRuntime) -> bool {
        if self.port.is_some() {
            debug!("Replacing existing extension port");
            self.disconnect().await;
        }

        match runtime
            .connect_external(
                &self.options.extension_id,
                &self.options.origin,
                &self.options.port_name,
            )
            .await
        {
            Ok(port) => {
                info!(
                    "Connected to extension {} as {}",
                    self.options.extension_id,
                    port.id()
                );
                self.port = Some(port);
                true
            }
            Err(e) => {
                warn!("Could not connect to extension: {}", e);
                false
            }
        }
    }

    pub async fn start_recording(&mut self) -> bool {
        self.send_command(AppCommand::StartRecording).await
    }

    pub async fn stop_recording(&mut self) -> bool {
        self.send_command(AppCommand::StopRecording).await
    }

    async fn send_command(&mut self, command: AppCommand) -> bool {
        let Some(port) = &self.port else {
            debug!("Not connected, dropping {:?}", command);
            return false;
        };

        match port.post(command).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send {:?}: {}", command, e);
                self.port = None;
                false
            }
        }
    }

    /// Called for every event, before the typed callbacks.
    pub fn on_message(&mut self, handler: impl Fn(&AppEvent) + Send + Sync + 'static) {
        self.message_handlers.push(Box::new(handler));
    }

    pub fn on_meeting_started(&mut self, handler: impl Fn(&MeetingSession) + Send + Sync + 'static) {
        self.started_handlers.push(Box::new(handler));
    }

    pub fn on_meeting_ended(&mut self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.ended_handlers.push(Box::new(handler));
    }

    pub fn on_recording_completed(
        &mut self,
        handler: impl Fn(&RecordingArtifact) + Send + Sync + 'static,
    ) {
        self.completed_handlers.push(Box::new(handler));
    }

    /// Wait for the next event and dispatch it. `None` once the port closed,
    /// or immediately when not connected.
    pub async fn next_event(&mut self) -> Option<AppEvent> {
        let port = self.port.as_mut()?;
        match port.recv().await {
            Some(event) => {
                self.dispatch(&event);
                Some(event)
            }
            None => {
                info!("Extension port closed");
                self.port = None;
                None
            }
        }
    }

    pub async fn run_until_disconnected(&mut self) {
        while self.next_event().await.is_some() {}
    }

    pub async fn disconnect(&mut self) {
        if let Some(port) = self.port.take() {
            info!("Disconnecting from extension");
            port.disconnect().await;
        }
    }

    fn dispatch(&self, event: &AppEvent) {
        debug!("Dashboard received {}", event.as_str());
        for handler in &self.message_handlers {
            handler(event);
        }

        match event {
            AppEvent::MeetingStarted { meeting } => {
                for handler in &self.started_handlers {
                    handler(meeting);
                }
            }
            AppEvent::MeetingEnded { meeting_id } => {
                for handler in &self.ended_handlers {
                    handler(meeting_id);
                }
            }
            AppEvent::RecordingCompleted(artifact) => {
                for handler in &self.completed_handlers {
                    handler(artifact);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::background::{BackgroundHandle, Coordinator, MemoryBadge};
    use crate::config::BadgeConfig;
    use crate::protocol::{ContentCommand, ContentEvent};
    use crate::transport::{ExtensionHost, OriginPolicy, TabId};

    const ORIGIN: &str = "http://localhost:5173";

    struct Setup {
        runtime: ExtensionRuntime,
        background: BackgroundHandle,
        shutdown: CancellationToken,
    }

    fn setup() -> Setup {
        let (tx, rx) = mpsc::channel(16);
        let background = BackgroundHandle::new(tx);
        let shutdown = CancellationToken::new();
        let coordinator = Coordinator::new(Box::new(MemoryBadge::default()), BadgeConfig::default());
        tokio::spawn(coordinator.run(rx, shutdown.clone()));

        let host = ExtensionHost::new(
            "meet-enhancer",
            OriginPolicy::new(ConnectorConfig::default().allowed_origins),
            background.clone(),
        );

        Setup {
            runtime: ExtensionRuntime::new([host]),
            background,
            shutdown,
        }
    }

    fn connector(origin: &str) -> ExternalConnector {
        ExternalConnector::new(ConnectorOptions::from_config(
            &ConnectorConfig::default(),
            origin,
        ))
    }

    async fn start_meeting(
        background: &BackgroundHandle,
        code: &str,
    ) -> (TabId, mpsc::UnboundedReceiver<ContentCommand>) {
        let (tab, commands) = background.open_tab().await.unwrap();
        background
            .content_event(
                tab,
                ContentEvent::MeetingDetected {
                    meeting_id: code.to_string(),
                    meeting_code: code.to_string(),
                    title: "Standup".to_string(),
                    url: format!("https://meet.google.com/{code}"),
                    participants: Vec::new(),
                },
            )
            .await
            .unwrap();
        (tab, commands)
    }

    #[tokio::test]
    async fn test_connect_requires_installed_extension() {
        let mut c = connector(ORIGIN);
        assert!(!c.connect(&ExtensionRuntime::empty()).await);
        assert!(!c.is_connected());
        assert!(!c.start_recording().await);
    }

    #[tokio::test]
    async fn test_connect_rejects_unlisted_origin() {
        let s = setup();
        let mut c = connector("https://evil.example");
        assert!(!c.connect(&s.runtime).await);
        assert!(!c.stop_recording().await);
        s.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_wildcard_origin_connects() {
        let s = setup();
        let mut c = connector("https://app.tempo.new");
        assert!(c.connect(&s.runtime).await);
        assert!(c.is_connected());
        s.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_callbacks_receive_replayed_meeting() {
        let s = setup();
        start_meeting(&s.background, "abc-defg-hij").await;

        let started = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut c = connector(ORIGIN);
        {
            let started = started.clone();
            c.on_meeting_started(move |m| started.lock().unwrap().push(m.meeting_id.clone()));
            let seen = seen.clone();
            c.on_message(move |e| seen.lock().unwrap().push(e.as_str()));
        }

        assert!(c.connect(&s.runtime).await);
        let event = c.next_event().await.unwrap();

        assert_eq!(event.as_str(), "meeting-started");
        assert_eq!(*started.lock().unwrap(), vec!["abc-defg-hij".to_string()]);
        assert_eq!(*seen.lock().unwrap(), vec!["meeting-started"]);
        s.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_commands_reach_meeting_tab() {
        let s = setup();
        let (_tab, mut commands) = start_meeting(&s.background, "abc-defg-hij").await;

        let mut c = connector(ORIGIN);
        assert!(c.connect(&s.runtime).await);
        assert!(c.start_recording().await);
        assert_eq!(commands.recv().await, Some(ContentCommand::StartRecording));
        assert!(c.stop_recording().await);
        assert_eq!(commands.recv().await, Some(ContentCommand::StopRecording));
        s.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_meeting_ended_callback() {
        let s = setup();
        let (tab, _commands) = start_meeting(&s.background, "abc-defg-hij").await;

        let ended = Arc::new(Mutex::new(None));
        let mut c = connector(ORIGIN);
        {
            let ended = ended.clone();
            c.on_meeting_ended(move |id| *ended.lock().unwrap() = Some(id.to_string()));
        }
        assert!(c.connect(&s.runtime).await);
        c.next_event().await.unwrap();

        s.background
            .content_event(
                tab,
                ContentEvent::MeetingEnded {
                    meeting_id: "abc-defg-hij".to_string(),
                },
            )
            .await
            .unwrap();
        c.next_event().await.unwrap();

        assert_eq!(ended.lock().unwrap().as_deref(), Some("abc-defg-hij"));
        s.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_second_connector_closes_first() {
        let s = setup();
        let mut first = connector(ORIGIN);
        let mut second = connector(ORIGIN);

        assert!(first.connect(&s.runtime).await);
        assert!(second.connect(&s.runtime).await);

        assert!(first.next_event().await.is_none());
        assert!(!first.is_connected());
        assert!(second.is_connected());

        let snapshot = s.background.snapshot().await.unwrap();
        assert!(snapshot.connection.is_some());
        s.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_disconnect_clears_background_connection() {
        let s = setup();
        let mut c = connector(ORIGIN);
        assert!(c.connect(&s.runtime).await);

        c.disconnect().await;
        assert!(!c.is_connected());
        assert!(c.next_event().await.is_none());
        assert_eq!(s.background.snapshot().await.unwrap().connection, None);
        s.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_coordinator_shutdown_disconnects() {
        let s = setup();
        let mut c = connector(ORIGIN);
        assert!(c.connect(&s.runtime).await);

        s.shutdown.cancel();
        c.run_until_disconnected().await;
        assert!(!c.is_connected());
    }
}
