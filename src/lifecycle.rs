//! # Lifecycle engine: activation order and phase walkers.
//!
//! [`ActiveSet`] holds one application's plugin instances and the
//! activation-order list. Resolution is a depth-first walk over declared
//! dependencies: a plugin lands on the list only after everything it
//! requires, so the same list drives initialization and startup, and its
//! reverse drives shutdown. Recomputing a topological order per phase is
//! never needed.
//!
//! The walkers contain errors instead of aborting half-way:
//!
//! - an `initialize`/`startup` hook failure shuts down everything already
//!   started, then surfaces the original error;
//! - a `shutdown` hook failure is captured, the reverse walk continues,
//!   and the first captured error is returned once every plugin has been
//!   stopped.

use std::collections::{HashMap, HashSet};

use tracing::{debug, error};

use crate::application::AppHandle;
use crate::bus::Bus;
use crate::error::{AppError, Phase};
use crate::event::{Event, EventKind};
use crate::options::OptionMap;
use crate::plugin::PluginState;
use crate::registry::{self, PluginHandle};

/// Per-application plugin instances plus the activation-order list.
pub(crate) struct ActiveSet {
    app: AppHandle,
    handles: HashMap<&'static str, PluginHandle>,
    activated: HashSet<&'static str>,
    order: Vec<PluginHandle>,
}

impl ActiveSet {
    pub(crate) fn empty(app: AppHandle) -> Self {
        Self {
            app,
            handles: HashMap::new(),
            activated: HashSet::new(),
            order: Vec::new(),
        }
    }

    /// Instantiates every registered descriptor for this application and
    /// attaches each instance to it.
    ///
    /// All instances are created up front so the options aggregator can
    /// query each plugin's declarations; only activated ones ever leave
    /// the `registered` state.
    pub(crate) fn from_registry(app: AppHandle) -> Self {
        let mut set = Self::empty(app);
        for desc in registry::descriptors() {
            let handle = desc.instantiate();
            handle.plugin.attach(set.app.clone());
            set.handles.insert(desc.name, handle);
        }
        set
    }

    pub(crate) fn handle(&self, name: &str) -> Option<&PluginHandle> {
        self.handles.get(name)
    }

    /// Clones every instantiated handle, activated or not (the options
    /// aggregator queries all registered plugins).
    pub(crate) fn all_handles(&self) -> Vec<PluginHandle> {
        self.handles.values().cloned().collect()
    }

    /// Clones the activation-order list for a phase walk.
    pub(crate) fn activation_order(&self) -> Vec<PluginHandle> {
        self.order.clone()
    }

    /// Marks `root` and, depth-first, everything it depends on for
    /// activation. Idempotent per name, so repeated `--plugin` flags
    /// dedupe silently.
    pub(crate) fn activate(&mut self, root: &str) -> Result<(), AppError> {
        let mut visiting = Vec::new();
        self.activate_inner(root, &mut visiting)
    }

    fn activate_inner(
        &mut self,
        name: &str,
        visiting: &mut Vec<&'static str>,
    ) -> Result<(), AppError> {
        if self.activated.contains(name) {
            return Ok(());
        }
        let desc = registry::descriptor(name).ok_or_else(|| AppError::UnknownPlugin {
            name: name.to_string(),
        })?;
        if visiting.contains(&desc.name) {
            return Err(AppError::DependencyCycle {
                name: desc.name.to_string(),
            });
        }
        visiting.push(desc.name);
        for dep in desc.dependencies {
            self.activate_inner(dep, visiting)?;
        }
        visiting.pop();

        let handle = match self.handles.get(desc.name) {
            Some(handle) => handle.clone(),
            // Registered after this application snapshotted the table.
            None => {
                let handle = desc.instantiate();
                handle.plugin.attach(self.app.clone());
                self.handles.insert(desc.name, handle.clone());
                handle
            }
        };
        self.activated.insert(desc.name);
        self.order.push(handle);
        Ok(())
    }
}

/// Runs every pending initialize hook in activation order.
pub(crate) async fn initialize_plugins(
    order: &[PluginHandle],
    options: &OptionMap,
    bus: &Bus,
) -> Result<(), AppError> {
    for handle in order {
        if handle.state() >= PluginState::Initialized {
            continue;
        }
        debug!(plugin = handle.name(), "initializing plugin");
        if let Err(source) = handle.plugin.initialize(options).await {
            return Err(unwind(order, handle, Phase::Initialize, source, bus).await);
        }
        handle.plugin.state_cell().set(PluginState::Initialized);
        bus.publish(Event::now(EventKind::PluginInitialized).with_plugin(handle.name()));
    }
    Ok(())
}

/// Runs every pending startup hook in activation order.
pub(crate) async fn startup_plugins(order: &[PluginHandle], bus: &Bus) -> Result<(), AppError> {
    for handle in order {
        if handle.state() != PluginState::Initialized {
            continue;
        }
        debug!(plugin = handle.name(), "starting plugin");
        if let Err(source) = handle.plugin.startup().await {
            return Err(unwind(order, handle, Phase::Startup, source, bus).await);
        }
        handle.plugin.state_cell().set(PluginState::Started);
        bus.publish(Event::now(EventKind::PluginStarted).with_plugin(handle.name()));
    }
    Ok(())
}

/// Stops every started plugin in reverse activation order.
///
/// The state flips to `stopped` before the hook runs, so a failing hook
/// is never re-entered. The first hook error is returned after the walk
/// completes; later ones are logged.
pub(crate) async fn shutdown_plugins(order: &[PluginHandle], bus: &Bus) -> Result<(), AppError> {
    let mut first_error: Option<AppError> = None;
    for handle in order.iter().rev() {
        if handle.state() != PluginState::Started {
            continue;
        }
        handle.plugin.state_cell().set(PluginState::Stopped);
        debug!(plugin = handle.name(), "stopping plugin");
        match handle.plugin.shutdown().await {
            Ok(()) => {
                bus.publish(Event::now(EventKind::PluginStopped).with_plugin(handle.name()));
            }
            Err(source) => {
                let err = AppError::Lifecycle {
                    plugin: handle.name(),
                    phase: Phase::Shutdown,
                    source,
                };
                error!(plugin = handle.name(), error = %err, "shutdown hook failed");
                bus.publish(
                    Event::now(EventKind::PluginFailed)
                        .with_plugin(handle.name())
                        .with_error(err.to_string()),
                );
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Wraps a failed initialize/startup hook, stops whatever already
/// started, and hands back the original error.
async fn unwind(
    order: &[PluginHandle],
    failed: &PluginHandle,
    phase: Phase,
    source: crate::error::PluginError,
    bus: &Bus,
) -> AppError {
    let err = AppError::Lifecycle {
        plugin: failed.name(),
        phase,
        source,
    };
    error!(plugin = failed.name(), error = %err, "lifecycle hook failed");
    bus.publish(
        Event::now(EventKind::PluginFailed)
            .with_plugin(failed.name())
            .with_error(err.to_string()),
    );
    if let Err(stop_err) = shutdown_plugins(order, bus).await {
        error!(error = %stop_err, %phase, "shutdown after a failed lifecycle phase also failed");
    }
    err
}
