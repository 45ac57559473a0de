// src/monitor.rs
//! Main GGA monitor coordination

use crate::{
    display::terminal::TerminalDisplay,
    error::{GgaError, Result},
    gps::LinkData,
    link::{Connector, Endpoint, GgaClient, LinkEvent, LinkSettings, TcpConnector},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, PoisonError, RwLock,
};
use tracing::info;

/// Subscribes to a [`GgaClient`] and keeps a [`LinkData`] snapshot for the
/// display
pub struct GgaMonitor {
    data: Arc<RwLock<LinkData>>,
    running: Arc<AtomicBool>,
    client: Option<GgaClient>,
}

impl GgaMonitor {
    /// Create a new monitor
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LinkData::new())),
            running: Arc::new(AtomicBool::new(true)),
            client: None,
        }
    }

    /// Start following a receiver over TCP
    pub fn start(&mut self, endpoint: Endpoint, settings: LinkSettings) -> Result<()> {
        self.start_with(TcpConnector, endpoint, settings)
    }

    pub fn start_with(
        &mut self,
        connector: impl Connector + 'static,
        endpoint: Endpoint,
        settings: LinkSettings,
    ) -> Result<()> {
        if self.client.is_some() {
            return Err(GgaError::Other("monitor already started".to_string()));
        }

        info!(%endpoint, "Starting GGA monitor");
        *self.data.write().unwrap_or_else(PoisonError::into_inner) =
            LinkData::for_endpoint(&endpoint.to_string());

        let mut client = GgaClient::with_connector(connector, endpoint, settings);
        let mut events = client.subscribe();
        client.start();

        let data = Arc::clone(&self.data);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                log_event(&event);
                data.write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply(&event);
            }
        });

        self.client = Some(client);
        Ok(())
    }

    /// Full-screen terminal display until Ctrl+C
    pub async fn run_display(&self) -> Result<()> {
        let terminal_display = TerminalDisplay::new();
        terminal_display.run(Arc::clone(&self.data), Arc::clone(&self.running)).await
    }

    /// Block until Ctrl+C, for runs without the display
    pub async fn wait_for_shutdown(&self) -> Result<()> {
        tokio::signal::ctrl_c().await?;
        self.running.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Stop the monitor and dispose the link
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(client) = self.client.take() {
            client.dispose();
        }
    }

    /// Check if the monitor is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.client.as_ref().map_or(false, GgaClient::is_connected)
    }

    /// Get a clone of the current snapshot
    pub fn get_data(&self) -> LinkData {
        self.data.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for GgaMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn log_event(event: &LinkEvent) {
    match event {
        LinkEvent::Fix(fix) => match fix.position() {
            Some((latitude, longitude)) => info!(latitude, longitude, "position fix"),
            None => info!("receiver reports no fix"),
        },
        // the link logs its own transitions
        LinkEvent::Connected | LinkEvent::Disconnected => {}
    }
}
