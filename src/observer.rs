//! Observer hook for lifecycle events.
//!
//! Attach an [`Observer`] with [`spawn_observer`] to react to events
//! outside the dispatch loop (logging, metrics, test assertions). The
//! built-in [`LogObserver`] forwards everything to `tracing`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::event::{Event, EventKind};

#[async_trait]
pub trait Observer: Send + Sync {
    async fn on_event(&self, event: &Event);
}

/// Forwards lifecycle events to `tracing`.
pub struct LogObserver;

#[async_trait]
impl Observer for LogObserver {
    async fn on_event(&self, e: &Event) {
        let plugin = e.plugin.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::PluginInitialized => info!(plugin, "plugin initialized"),
            EventKind::PluginStarted => info!(plugin, "plugin started"),
            EventKind::PluginStopped => info!(plugin, "plugin stopped"),
            EventKind::PluginFailed => {
                error!(plugin, error = e.error.as_deref(), "plugin hook failed");
            }
            EventKind::TaskFailed => {
                error!(error = e.error.as_deref(), "posted task failed");
            }
            EventKind::ShutdownRequested => info!("shutdown requested"),
        }
    }
}

/// Pumps a bus subscription into an observer on a background task.
///
/// The task ends when the sending side of the channel closes (application
/// dropped). Missed events under load are skipped, not replayed.
pub fn spawn_observer(
    observer: Arc<dyn Observer>,
    mut rx: broadcast::Receiver<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => observer.on_event(&event).await,
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    })
}
