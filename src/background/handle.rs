//! Inputs to the coordinator and the cloneable handle that sends them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::state::CoordinatorState;
use crate::protocol::{AppCommand, ContentCommand, ContentEvent, MeetingSession};
use crate::transport::{ContentTab, ExternalConnection, TabId, TransportError};

/// Everything the coordinator reacts to. Each input is handled to completion
/// before the next one is read.
#[derive(Debug)]
pub enum CoordinatorInput {
    Content { tab: TabId, event: ContentEvent },
    TabOpened(ContentTab),
    TabClosed(TabId),
    Attach(ExternalConnection),
    Detach(Uuid),
    App { connection: Uuid, command: AppCommand },
    /// Recording request from the extension popup.
    Local(AppCommand),
    Snapshot(oneshot::Sender<CoordinatorSnapshot>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSnapshot {
    pub state: CoordinatorState,
    pub meeting: Option<MeetingSession>,
    pub connection: Option<Uuid>,
}

#[derive(Clone)]
pub struct BackgroundHandle {
    tx: mpsc::Sender<CoordinatorInput>,
    next_tab: Arc<AtomicU32>,
}

impl BackgroundHandle {
    pub fn new(tx: mpsc::Sender<CoordinatorInput>) -> Self {
        Self {
            tx,
            next_tab: Arc::new(AtomicU32::new(1)),
        }
    }

    async fn send(&self, input: CoordinatorInput) -> Result<(), TransportError> {
        self.tx
            .send(input)
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    /// Register a content script and get the channel its commands arrive on.
    pub async fn open_tab(
        &self,
    ) -> Result<(TabId, mpsc::UnboundedReceiver<ContentCommand>), TransportError> {
        let id = self.next_tab.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.send(CoordinatorInput::TabOpened(ContentTab::new(id, tx)))
            .await?;
        Ok((id, rx))
    }

    pub async fn close_tab(&self, tab: TabId) -> Result<(), TransportError> {
        self.send(CoordinatorInput::TabClosed(tab)).await
    }

    pub async fn content_event(&self, tab: TabId, event: ContentEvent) -> Result<(), TransportError> {
        self.send(CoordinatorInput::Content { tab, event }).await
    }

    pub async fn attach(&self, connection: ExternalConnection) -> Result<(), TransportError> {
        self.send(CoordinatorInput::Attach(connection)).await
    }

    pub async fn detach(&self, connection: Uuid) -> Result<(), TransportError> {
        self.send(CoordinatorInput::Detach(connection)).await
    }

    pub async fn command(&self, connection: Uuid, command: AppCommand) -> Result<(), TransportError> {
        self.send(CoordinatorInput::App {
            connection,
            command,
        })
        .await
    }

    pub async fn request_recording(&self, command: AppCommand) -> Result<(), TransportError> {
        self.send(CoordinatorInput::Local(command)).await
    }

    pub async fn snapshot(&self) -> Result<CoordinatorSnapshot, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoordinatorInput::Snapshot(tx)).await?;
        rx.await.map_err(|_| TransportError::Disconnected)
    }

    /// Current meeting for the popup. `None` when idle or when the background
    /// is gone.
    pub async fn meeting_info(&self) -> Option<MeetingSession> {
        self.snapshot().await.ok().and_then(|s| s.meeting)
    }
}
