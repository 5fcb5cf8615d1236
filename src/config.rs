//! # Application configuration.
//!
//! [`AppConfig`] carries the embedder-facing knobs: the program identity
//! shown by `--help`/`--version` and the event bus capacity.

/// Static configuration of an [`Application`](crate::Application).
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Program name shown in help output.
    pub name: String,
    /// Version string reported by `--version`.
    pub version: String,
    /// One-line description shown in help output.
    pub about: Option<String>,
    /// Capacity of the lifecycle event channel.
    pub bus_capacity: usize,
}

impl Default for AppConfig {
    /// Provides a default configuration:
    /// - `name = "app"`
    /// - `version = "0.0.0"`
    /// - `about = None`
    /// - `bus_capacity = 256`
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            version: "0.0.0".to_string(),
            about: None,
            bus_capacity: 256,
        }
    }
}
