//! Channels between the three contexts.
//!
//! Content tab and external port are plain tokio channels. Delivery between
//! two directly connected endpoints is FIFO; nothing orders messages across
//! the content → background → dashboard path.

pub mod origin;

pub use origin::OriginPolicy;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::background::BackgroundHandle;
use crate::protocol::{AppCommand, AppEvent, ContentCommand};

pub type TabId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Extension not installed: {0}")]
    NotInstalled(String),

    #[error("Origin not authorized: {0}")]
    UnauthorizedOrigin(String),

    #[error("Channel disconnected")]
    Disconnected,
}

/// Background-side handle for commanding one content script.
#[derive(Debug, Clone)]
pub struct ContentTab {
    id: TabId,
    commands: mpsc::UnboundedSender<ContentCommand>,
}

impl ContentTab {
    pub fn new(id: TabId, commands: mpsc::UnboundedSender<ContentCommand>) -> Self {
        Self { id, commands }
    }

    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn send(&self, command: ContentCommand) -> Result<(), TransportError> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::Disconnected)
    }
}

/// Background-side end of a dashboard connection.
#[derive(Debug)]
pub struct ExternalConnection {
    id: Uuid,
    origin: String,
    name: String,
    outbound: mpsc::UnboundedSender<AppEvent>,
}

impl ExternalConnection {
    pub fn new(origin: String, name: String, outbound: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            name,
            outbound,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the dashboard still holds its end.
    pub fn is_alive(&self) -> bool {
        !self.outbound.is_closed()
    }

    pub fn post(&self, event: AppEvent) -> Result<(), TransportError> {
        self.outbound
            .send(event)
            .map_err(|_| TransportError::Disconnected)
    }
}

/// Dashboard-side end of a connection into the extension.
pub struct ExternalPort {
    id: Uuid,
    events: mpsc::UnboundedReceiver<AppEvent>,
    background: BackgroundHandle,
}

impl ExternalPort {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event from the background. `None` once the background has let go
    /// of this connection.
    pub async fn recv(&mut self) -> Option<AppEvent> {
        self.events.recv().await
    }

    pub async fn post(&self, command: AppCommand) -> Result<(), TransportError> {
        self.background.command(self.id, command).await
    }

    pub async fn disconnect(mut self) {
        self.events.close();
        if self.background.detach(self.id).await.is_err() {
            debug!("Background already gone while disconnecting {}", self.id);
        }
    }
}

/// The extension as an external page sees it: an id, an origin allow list
/// and the background that accepts connections.
#[derive(Clone)]
pub struct ExtensionHost {
    id: String,
    policy: OriginPolicy,
    background: BackgroundHandle,
}

impl ExtensionHost {
    pub fn new(id: impl Into<String>, policy: OriginPolicy, background: BackgroundHandle) -> Self {
        Self {
            id: id.into(),
            policy,
            background,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn accept(&self, origin: &str, name: &str) -> Result<ExternalPort, TransportError> {
        if !self.policy.is_allowed(origin) {
            warn!("Rejected external connection from {}", origin);
            return Err(TransportError::UnauthorizedOrigin(origin.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let connection = ExternalConnection::new(origin.to_string(), name.to_string(), tx);
        let id = connection.id();
        self.background.attach(connection).await?;

        info!("External connection {} established with {}", id, origin);
        Ok(ExternalPort {
            id,
            events: rx,
            background: self.background.clone(),
        })
    }
}

/// Extensions installed in the browser, keyed by extension id.
#[derive(Clone, Default)]
pub struct ExtensionRuntime {
    extensions: Arc<HashMap<String, ExtensionHost>>,
}

impl ExtensionRuntime {
    pub fn new(hosts: impl IntoIterator<Item = ExtensionHost>) -> Self {
        let extensions = hosts
            .into_iter()
            .map(|host| (host.id.clone(), host))
            .collect();
        Self {
            extensions: Arc::new(extensions),
        }
    }

    /// A runtime without the extension, as a browser that never installed it.
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn connect_external(
        &self,
        extension_id: &str,
        origin: &str,
        name: &str,
    ) -> Result<ExternalPort, TransportError> {
        let host = self
            .extensions
            .get(extension_id)
            .ok_or_else(|| TransportError::NotInstalled(extension_id.to_string()))?;
        host.accept(origin, name).await
    }
}
