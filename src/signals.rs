//! Termination-signal integration.
//!
//! [`Application::install_signal_handlers`](crate::Application::install_signal_handlers)
//! spawns a watcher that calls `quit` when the process receives a
//! termination signal, so the application unwinds through the regular
//! drain-and-shutdown path instead of dying mid-flight.
//!
//! Unix listens for SIGINT, SIGTERM and SIGQUIT; other platforms fall
//! back to Ctrl-C.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::Application;

impl Application {
    /// Spawns a background task that calls [`quit`](Application::quit)
    /// on the first termination signal. Must be called from within the
    /// runtime; call it once, before `exec`.
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let app = Arc::clone(self);
        tokio::spawn(async move {
            match wait_for_termination().await {
                Ok(()) => {
                    info!("termination signal received, quitting");
                    app.quit();
                }
                Err(err) => warn!(error = %err, "failed to listen for termination signals"),
            }
        });
    }
}

#[cfg(unix)]
async fn wait_for_termination() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
        _ = sigquit.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
