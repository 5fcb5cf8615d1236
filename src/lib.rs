//! # chassis
//!
//! **Chassis** is an in-process application framework for long-running
//! services assembled from a fixed set of declaratively-declared plugins.
//!
//! It drives every plugin through a dependency-ordered lifecycle, merges
//! the options each plugin declares into one command line, dispatches
//! posted work on a single cooperative worker, and guarantees that every
//! started plugin is stopped exactly once, in reverse startup order,
//! even when work items or other plugins fail.
//!
//! ## Features
//!
//! | Area              | Description                                                        | Key types / traits                  |
//! |-------------------|--------------------------------------------------------------------|-------------------------------------|
//! | **Plugins**       | Named, dependency-declaring units with lifecycle hooks.            | [`Plugin`], [`PluginMeta`]          |
//! | **Lifecycle**     | registered → initialized → started → stopped, dependency-ordered.  | [`PluginState`], [`StateCell`]      |
//! | **Options**       | Per-plugin CLI and config-file options merged into one schema.     | [`OptionGroup`], [`OptionMap`]      |
//! | **Dispatch**      | Priority-ordered, FIFO-within-priority single-worker loop.         | [`Priority`], [`Application::post`] |
//! | **Shutdown**      | Drain-on-quit, reverse-order stop, error containment.              | [`Application::quit`], [`ScopedApp`]|
//! | **Observability** | Broadcast lifecycle events, pluggable observers.                   | [`Event`], [`Observer`]             |
//! | **Errors**        | Typed errors per failure surface.                                  | [`AppError`], [`PluginError`]       |
//!
//! ```no_run
//! use async_trait::async_trait;
//! use chassis::{
//!     AppConfig, Application, OptionGroup, OptionMap, Plugin, PluginError, PluginMeta,
//!     Priority, StateCell,
//! };
//!
//! #[derive(Default)]
//! struct EchoPlugin {
//!     state: StateCell,
//! }
//!
//! #[async_trait]
//! impl Plugin for EchoPlugin {
//!     fn name(&self) -> &'static str {
//!         Self::NAME
//!     }
//!
//!     fn state_cell(&self) -> &StateCell {
//!         &self.state
//!     }
//!
//!     fn declare_options(&self, cli: &mut OptionGroup, _cfg: &mut OptionGroup) {
//!         cli.text("greeting", "what to echo", Some("hello"));
//!     }
//!
//!     async fn initialize(&self, options: &OptionMap) -> Result<(), PluginError> {
//!         println!("{}", options.text("greeting")?);
//!         Ok(())
//!     }
//! }
//!
//! impl PluginMeta for EchoPlugin {
//!     const NAME: &'static str = "echo";
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     chassis::register_plugin::<EchoPlugin>();
//!
//!     let app = Application::new(AppConfig::default());
//!     if !app.initialize::<(EchoPlugin,)>(std::env::args().collect()).await? {
//!         return Ok(());
//!     }
//!     app.startup().await?;
//!
//!     let quitter = app.clone();
//!     app.post(Priority::LOW, move || {
//!         quitter.quit();
//!         Ok(())
//!     });
//!
//!     app.exec().await?;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod application;
mod bus;
mod config;
mod error;
mod event;
mod executor;
mod lifecycle;
mod observer;
mod options;
mod plugin;
mod queue;
mod registry;
mod signals;

// ---- Public re-exports ----

pub use application::{AppHandle, Application, ScopedApp};
pub use config::AppConfig;
pub use error::{AppError, Phase, PluginError, TaskError};
pub use event::{Event, EventKind};
pub use observer::{spawn_observer, LogObserver, Observer};
pub use options::{OptionGroup, OptionMap, OptionValue};
pub use plugin::{Plugin, PluginMeta, PluginSet, PluginState, StateCell};
pub use queue::Priority;
pub use registry::register_plugin;
