//! # Application facade and scoped lifetime wrapper.
//!
//! [`Application`] wires the executor, the registry, the lifecycle engine
//! and the options aggregator together behind the embedder-facing calls:
//! `initialize`, `startup`, `exec`, `quit`, `post`, `get_plugin`.
//!
//! One task drives `initialize`/`startup`/`exec`; `post`, `quit` and
//! `subscribe` are callable from anywhere. [`ScopedApp`] guarantees that
//! quit is requested when the guard leaves scope, and the process-wide
//! registry stays reusable for a fresh application afterwards.

use std::ops::Deref;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::bus::Bus;
use crate::config::AppConfig;
use crate::error::{AppError, TaskError};
use crate::event::{Event, EventKind};
use crate::executor::Executor;
use crate::lifecycle::{self, ActiveSet};
use crate::options::{self, OptionMap, OptionSchema};
use crate::plugin::{PluginMeta, PluginSet, PluginState};
use crate::queue::Priority;

/// The root object an embedder holds.
///
/// Owns the plugin instances, the option map, the event bus and the
/// executor; field order keeps the plugin set ahead of the executor so
/// plugins are torn down first.
pub struct Application {
    cfg: AppConfig,
    bus: Bus,
    active: RwLock<ActiveSet>,
    options: RwLock<Option<Arc<OptionMap>>>,
    executor: Arc<Executor>,
    weak: Weak<Application>,
}

impl Application {
    pub fn new(cfg: AppConfig) -> Arc<Self> {
        let bus = Bus::new(cfg.bus_capacity);
        Arc::new_cyclic(|weak| Self {
            cfg,
            bus,
            active: RwLock::new(ActiveSet::empty(AppHandle { inner: weak.clone() })),
            options: RwLock::new(None),
            executor: Executor::new(),
            weak: weak.clone(),
        })
    }

    /// A non-owning handle plugins and background tasks can hold to post
    /// work or request quit without keeping the application alive.
    pub fn app_handle(&self) -> AppHandle {
        AppHandle {
            inner: self.weak.clone(),
        }
    }

    /// Parses argv against the aggregated option schema and initializes
    /// the activated plugins in dependency order.
    ///
    /// `Roots` are activated for every run; `--plugin NAME` adds more,
    /// and declared dependencies are pulled in transitively. Returns
    /// `Ok(false)` when `--help` or `--version` short-circuited the run
    /// (the embedder should exit cleanly), `Ok(true)` once every
    /// activated plugin is initialized.
    pub async fn initialize<Roots: PluginSet>(
        &self,
        args: Vec<String>,
    ) -> Result<bool, AppError> {
        Roots::register();

        *self.write_active() = ActiveSet::from_registry(self.app_handle());

        let schema = {
            let active = self.read_active();
            let mut handles: Vec<_> = active.all_handles();
            handles.sort_by_key(|h| h.name());
            OptionSchema::collect(&handles)?
        };

        let command = schema.command(
            &self.cfg.name,
            &self.cfg.version,
            self.cfg.about.as_deref(),
        );
        let matches = match command.try_get_matches_from(args) {
            Ok(matches) => matches,
            Err(err) => {
                use clap::error::ErrorKind;
                return match err.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                        let _ = err.print();
                        Ok(false)
                    }
                    _ => Err(AppError::InvalidArguments {
                        reason: err.to_string(),
                    }),
                };
            }
        };

        let config_path = matches.get_one::<String>("config-file").map(PathBuf::from);
        let config_table = match &config_path {
            Some(path) => Some(options::load_config_table(path)?),
            None => None,
        };
        let config = config_path
            .as_deref()
            .zip(config_table.as_ref());
        let option_map = Arc::new(schema.option_map(&matches, config)?);

        let mut roots: Vec<String> = matches
            .get_many::<String>("plugin")
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        roots.extend(Roots::names().into_iter().map(str::to_string));

        let order = {
            let mut active = self.write_active();
            for root in &roots {
                active.activate(root)?;
            }
            active.activation_order()
        };

        debug!(plugins = order.len(), "activation order resolved");
        lifecycle::initialize_plugins(&order, &option_map, &self.bus).await?;

        *self
            .options
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(option_map);
        Ok(true)
    }

    /// Starts every initialized plugin in activation order.
    pub async fn startup(&self) -> Result<(), AppError> {
        let order = self.read_active().activation_order();
        lifecycle::startup_plugins(&order, &self.bus).await?;
        info!(plugins = order.len(), "application started");
        Ok(())
    }

    /// Runs the dispatch loop on the calling task until [`quit`] is
    /// called or a posted action fails, then drains the queue, stops
    /// every started plugin in reverse activation order, and surfaces
    /// the first captured error (a runtime error wins over a shutdown
    /// error).
    ///
    /// [`quit`]: Application::quit
    pub async fn exec(&self) -> Result<(), AppError> {
        let run_result = match self.executor.run().await {
            Err(err @ AppError::AlreadyRunning) => return Err(err),
            other => other,
        };
        if let Err(err) = &run_result {
            error!(error = %err, "task failed inside exec, shutting down");
            self.bus
                .publish(Event::now(EventKind::TaskFailed).with_error(err.to_string()));
        }

        self.executor.drain();
        self.executor.stop();

        let order = self.read_active().activation_order();
        let stop_result = lifecycle::shutdown_plugins(&order, &self.bus).await;
        info!("application stopped");

        match run_result {
            Err(err) => Err(err),
            Ok(()) => stop_result,
        }
    }

    /// Requests shutdown: pending work is discarded and the dispatch
    /// loop returns at the next boundary. Thread-safe, idempotent; an
    /// action already running completes first.
    pub fn quit(&self) {
        self.bus.publish(Event::now(EventKind::ShutdownRequested));
        self.executor.drain();
        self.executor.stop();
    }

    /// Posts a work item for prioritized execution on the dispatch loop.
    /// Thread-safe; silently discarded once the application is quitting.
    pub fn post<F>(&self, priority: Priority, action: F)
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        self.executor.post(priority, action);
    }

    /// Posts a work item after `delay`. The deferred post dies with the
    /// run; must be called from within the runtime.
    pub fn post_after<F>(&self, delay: Duration, priority: Priority, action: F)
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        self.executor.post_after(delay, priority, action);
    }

    /// Typed access to an activated plugin.
    pub fn get_plugin<P: PluginMeta>(&self) -> Result<Arc<P>, AppError> {
        let active = self.read_active();
        let handle = active.handle(P::NAME).ok_or_else(|| AppError::UnknownPlugin {
            name: P::NAME.to_string(),
        })?;
        if handle.state() == PluginState::Registered {
            return Err(AppError::PluginNotActive {
                name: P::NAME.to_string(),
            });
        }
        handle
            .instance
            .clone()
            .downcast::<P>()
            .map_err(|_| AppError::PluginTypeMismatch {
                name: P::NAME.to_string(),
            })
    }

    /// Subscribes to lifecycle events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// The option map produced by [`initialize`](Application::initialize).
    pub fn options(&self) -> Option<Arc<OptionMap>> {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a task is currently driving `exec`.
    pub fn is_running(&self) -> bool {
        self.executor.is_running()
    }

    fn read_active(&self) -> std::sync::RwLockReadGuard<'_, ActiveSet> {
        self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_active(&self) -> std::sync::RwLockWriteGuard<'_, ActiveSet> {
        self.active.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Non-owning reference to an [`Application`].
///
/// Handed to every plugin via [`Plugin::attach`](crate::Plugin::attach)
/// and cloneable into posted closures and background tasks. All calls
/// are no-ops once the application has been dropped.
#[derive(Clone)]
pub struct AppHandle {
    inner: Weak<Application>,
}

impl AppHandle {
    /// Upgrades to the owning application, if it is still alive.
    pub fn upgrade(&self) -> Option<Arc<Application>> {
        self.inner.upgrade()
    }

    /// Posts a work item; dropped silently if the application is gone.
    pub fn post<F>(&self, priority: Priority, action: F)
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        if let Some(app) = self.inner.upgrade() {
            app.post(priority, action);
        }
    }

    /// Posts a work item after `delay`; dropped silently if the
    /// application is gone.
    pub fn post_after<F>(&self, delay: Duration, priority: Priority, action: F)
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        if let Some(app) = self.inner.upgrade() {
            app.post_after(delay, priority, action);
        }
    }

    /// Requests shutdown of the owning application.
    pub fn quit(&self) {
        if let Some(app) = self.inner.upgrade() {
            app.quit();
        }
    }
}

/// Lifetime guard around an [`Application`].
///
/// Dereferences to the application; requests quit when dropped so a task
/// still driving `exec` unwinds through the regular drain-and-shutdown
/// path. Two scoped applications used in sequence behave identically,
/// since the process-wide registry carries only descriptors across
/// instances.
pub struct ScopedApp {
    app: Arc<Application>,
}

impl ScopedApp {
    pub fn new(cfg: AppConfig) -> Self {
        Self {
            app: Application::new(cfg),
        }
    }

    /// A cloneable handle, e.g. for spawning `exec` onto another task.
    pub fn handle(&self) -> Arc<Application> {
        Arc::clone(&self.app)
    }
}

impl Deref for ScopedApp {
    type Target = Application;

    fn deref(&self) -> &Self::Target {
        &self.app
    }
}

impl Drop for ScopedApp {
    fn drop(&mut self) {
        self.app.quit();
    }
}
