//! Lifecycle events, consumed via
//! [`Application::subscribe`](crate::Application::subscribe).

use std::time::SystemTime;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A plugin's initialize hook completed.
    PluginInitialized,
    /// A plugin's startup hook completed.
    PluginStarted,
    /// A plugin's shutdown hook completed.
    PluginStopped,
    /// A plugin hook returned an error.
    PluginFailed,
    /// A posted work item returned an error inside `exec`.
    TaskFailed,
    /// `quit` was called (directly or by a signal handler).
    ShutdownRequested,
}

/// A timestamped lifecycle event, optionally carrying the plugin name
/// and an error rendering.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub plugin: Option<String>,
    pub error: Option<String>,
    pub at: SystemTime,
}

impl Event {
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            plugin: None,
            error: None,
            at: SystemTime::now(),
        }
    }

    pub fn with_plugin(mut self, name: impl Into<String>) -> Self {
        self.plugin = Some(name.into());
        self
    }

    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }
}
