use crate::background::{ActionBadge, BackgroundHandle, Coordinator};
use crate::config::Config;
use crate::connector::{ConnectorOptions, ExternalConnector};
use crate::content::ContentScript;
use crate::media::MediaDevices;
use crate::page::HostPage;
use crate::transport::{ExtensionHost, ExtensionRuntime, OriginPolicy, TabId};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Running extension: the background coordinator, the runtime dashboards
/// connect through, and the content scripts of every open tab.
pub struct Bridge {
    config: Config,
    background: BackgroundHandle,
    runtime: ExtensionRuntime,
    shutdown: CancellationToken,
    coordinator: JoinHandle<()>,
    tabs: Vec<JoinHandle<()>>,
}

impl Bridge {
    pub fn start(config: &Config, badge: Box<dyn ActionBadge>) -> Self {
        info!("Starting extension background");

        let (tx, rx) = mpsc::channel(config.channel.coordinator_capacity.max(1));
        let background = BackgroundHandle::new(tx);
        let shutdown = CancellationToken::new();

        let coordinator = Coordinator::new(badge, config.badge.clone());
        let coordinator = tokio::spawn(coordinator.run(rx, shutdown.clone()));

        let host = ExtensionHost::new(
            config.connector.extension_id.clone(),
            OriginPolicy::new(config.connector.allowed_origins.iter()),
            background.clone(),
        );
        info!(
            "Extension {} accepts connections from {:?}",
            host.id(),
            config.connector.allowed_origins
        );

        Self {
            config: config.clone(),
            background,
            runtime: ExtensionRuntime::new([host]),
            shutdown,
            coordinator,
            tabs: Vec::new(),
        }
    }

    pub fn background(&self) -> &BackgroundHandle {
        &self.background
    }

    pub fn runtime(&self) -> &ExtensionRuntime {
        &self.runtime
    }

    /// Load a content script into `page`.
    pub async fn open_tab(
        &mut self,
        page: Arc<dyn HostPage>,
        media: Arc<dyn MediaDevices>,
    ) -> Result<TabId> {
        let (tab, commands) = self
            .background
            .open_tab()
            .await
            .context("Background is not running")?;

        let script = ContentScript::new(
            page,
            media,
            self.background.clone(),
            tab,
            commands,
            &self.config.detection,
            &self.config.recording,
        )?;
        self.tabs.push(tokio::spawn(script.run(self.shutdown.child_token())));

        info!("Opened tab {}", tab);
        Ok(tab)
    }

    /// A dashboard connector for a page served from `origin`. Not connected yet.
    pub fn connector(&self, origin: &str) -> ExternalConnector {
        ExternalConnector::new(ConnectorOptions::from_config(&self.config.connector, origin))
    }

    pub async fn shutdown(self) {
        info!("Shutting down");
        self.shutdown.cancel();

        for tab in self.tabs {
            if let Err(e) = tab.await {
                warn!("Content script task failed: {}", e);
            }
        }
        if let Err(e) = self.coordinator.await {
            warn!("Coordinator task failed: {}", e);
        }
    }
}
