//! # Error types used by the chassis runtime and plugins.
//!
//! Three error enums, one per failure surface:
//!
//! - [`AppError`] errors raised by the framework itself (configuration,
//!   lifecycle, dispatch).
//! - [`PluginError`] errors raised by a plugin's lifecycle hooks.
//! - [`TaskError`] errors raised by posted work items.
//!
//! A [`PluginError`] escaping a hook is wrapped into
//! [`AppError::Lifecycle`] together with the plugin name and the
//! [`Phase`] that was running.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Lifecycle phase a plugin hook was running in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialize,
    Startup,
    Shutdown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initialize => f.write_str("initialization"),
            Phase::Startup => f.write_str("startup"),
            Phase::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// # Errors produced by the application framework.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AppError {
    /// A plugin name was requested (via `--plugin` or a declared
    /// dependency) that no registered descriptor matches.
    #[error("plugin '{name}' is not registered")]
    UnknownPlugin {
        /// The unresolved plugin name.
        name: String,
    },

    /// Typed access to a plugin that was never activated for this run.
    #[error("plugin '{name}' is not active")]
    PluginNotActive {
        /// The inactive plugin name.
        name: String,
    },

    /// The registered descriptor for this name belongs to a different type.
    #[error("plugin '{name}' is registered with a different type")]
    PluginTypeMismatch {
        /// The colliding plugin name.
        name: String,
    },

    /// The declared dependency graph contains a cycle.
    #[error("dependency cycle detected at plugin '{name}'")]
    DependencyCycle {
        /// A plugin on the cycle.
        name: String,
    },

    /// Two plugins (or a plugin and a built-in) declared the same option.
    #[error("option '{name}' declared by both '{first}' and '{second}'")]
    DuplicateOption {
        /// The colliding option name.
        name: String,
        /// Owner of the earlier declaration.
        first: String,
        /// Owner of the later declaration.
        second: String,
    },

    /// The command line did not parse against the merged option schema.
    #[error("invalid command line: {reason}")]
    InvalidArguments {
        /// Rendered parser diagnostic.
        reason: String,
    },

    /// The configuration file was unreadable or inconsistent with the schema.
    #[error("config file {path:?}: {reason}")]
    ConfigFile {
        /// Path given via `--config-file`.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A plugin lifecycle hook failed.
    #[error("plugin '{plugin}' failed during {phase}: {source}")]
    Lifecycle {
        /// Name of the failing plugin.
        plugin: &'static str,
        /// Phase the hook was running in.
        phase: Phase,
        /// The hook's own error.
        source: PluginError,
    },

    /// A posted work item failed inside the dispatch loop.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// `exec` was entered while another task is already driving the loop.
    #[error("the dispatch loop is already running")]
    AlreadyRunning,
}

impl AppError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            AppError::UnknownPlugin { .. } => "unknown_plugin",
            AppError::PluginNotActive { .. } => "plugin_not_active",
            AppError::PluginTypeMismatch { .. } => "plugin_type_mismatch",
            AppError::DependencyCycle { .. } => "dependency_cycle",
            AppError::DuplicateOption { .. } => "duplicate_option",
            AppError::InvalidArguments { .. } => "invalid_arguments",
            AppError::ConfigFile { .. } => "config_file",
            AppError::Lifecycle { .. } => "lifecycle",
            AppError::Task(_) => "task",
            AppError::AlreadyRunning => "already_running",
        }
    }
}

/// # Errors produced by plugin lifecycle hooks.
///
/// Plugins return these from `initialize`/`startup`/`shutdown`; the
/// framework wraps them with the plugin name and phase before surfacing.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PluginError {
    /// Generic hook failure with a plugin-supplied reason.
    #[error("{reason}")]
    Failed {
        /// Human-readable cause.
        reason: String,
    },

    /// A required option was absent from the parsed map.
    #[error("missing option '{name}'")]
    MissingOption {
        /// The absent option name.
        name: String,
    },

    /// An option was present but carried an unusable value.
    #[error("invalid value for option '{name}': {reason}")]
    InvalidOption {
        /// The offending option name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl PluginError {
    /// Convenience constructor for [`PluginError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        PluginError::Failed {
            reason: reason.into(),
        }
    }
}

/// # Errors produced by posted work items.
///
/// A work item returning an error aborts the dispatch loop; `exec`
/// drains the queue, shuts every started plugin down, and surfaces the
/// error to the embedder.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The work item failed with a caller-supplied reason.
    #[error("task failed: {reason}")]
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        TaskError::Failed {
            reason: reason.into(),
        }
    }
}
