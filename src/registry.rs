//! # Process-wide plugin registry.
//!
//! The descriptor table maps plugin names to factories and declared
//! dependency lists. It is shared by every [`Application`] instance in
//! the process and only ever grows; registration is idempotent so test
//! binaries can register the same plugin before each case. Live plugin
//! instances are per-application and live in the lifecycle engine's
//! active set, not here.
//!
//! [`Application`]: crate::Application

use std::any::Any;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::plugin::{Plugin, PluginMeta, PluginState};

/// A live plugin attached to one application: the trait object the
/// lifecycle engine drives, and the erased instance typed access
/// downcasts from.
#[derive(Clone)]
pub(crate) struct PluginHandle {
    pub(crate) plugin: Arc<dyn Plugin>,
    pub(crate) instance: Arc<dyn Any + Send + Sync>,
}

impl PluginHandle {
    pub(crate) fn name(&self) -> &'static str {
        self.plugin.name()
    }

    pub(crate) fn state(&self) -> PluginState {
        self.plugin.state()
    }
}

/// Identity of a registered plugin type. Immutable after registration.
#[derive(Clone, Copy)]
pub(crate) struct Descriptor {
    pub(crate) name: &'static str,
    pub(crate) dependencies: &'static [&'static str],
    build: fn() -> PluginHandle,
}

impl Descriptor {
    /// Constructs a fresh instance for one application.
    pub(crate) fn instantiate(&self) -> PluginHandle {
        (self.build)()
    }
}

static DESCRIPTORS: LazyLock<DashMap<&'static str, Descriptor>> = LazyLock::new(DashMap::new);

fn build_handle<P: PluginMeta>() -> PluginHandle {
    let plugin = Arc::new(P::default());
    PluginHandle {
        instance: plugin.clone(),
        plugin,
    }
}

/// Records `P`'s descriptor and, recursively, the descriptors of its
/// declared dependency types. Idempotent; safe to call before any
/// application exists, which is also the only supported time to call it.
///
/// The insert-before-recurse order makes registration terminate even on
/// a cyclic declaration; the cycle itself is diagnosed when the plugin
/// is first resolved for activation.
pub fn register_plugin<P: PluginMeta>() {
    if DESCRIPTORS.contains_key(P::NAME) {
        return;
    }
    DESCRIPTORS.insert(
        P::NAME,
        Descriptor {
            name: P::NAME,
            dependencies: P::dependencies(),
            build: build_handle::<P>,
        },
    );
    P::register_dependencies();
}

/// Looks a descriptor up by name (used for `--plugin` validation and
/// dependency resolution).
pub(crate) fn descriptor(name: &str) -> Option<Descriptor> {
    DESCRIPTORS.get(name).map(|entry| *entry.value())
}

/// Snapshot of every registered descriptor.
pub(crate) fn descriptors() -> Vec<Descriptor> {
    DESCRIPTORS.iter().map(|entry| *entry.value()).collect()
}
