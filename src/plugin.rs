//! # Plugin trait surface and lifecycle states.
//!
//! A plugin is a named, dependency-declaring unit of functionality with
//! hooks for option declaration, initialization, startup and shutdown.
//! Two traits split the surface:
//!
//! - [`Plugin`] is the object-safe runtime interface the framework drives.
//!   Hooks take `&self`; a plugin owns whatever interior mutability its
//!   captured configuration needs.
//! - [`PluginMeta`] carries the static identity (name, declared
//!   dependencies, registration of dependency types) used by the registry
//!   and by typed access.
//!
//! States move strictly forward:
//!
//! ```text
//! registered ──initialize──▶ initialized ──startup──▶ started ──shutdown──▶ stopped
//! ```
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use chassis::{OptionGroup, OptionMap, Plugin, PluginError, PluginMeta, StateCell};
//!
//! #[derive(Default)]
//! struct HeartbeatPlugin {
//!     state: StateCell,
//! }
//!
//! #[async_trait]
//! impl Plugin for HeartbeatPlugin {
//!     fn name(&self) -> &'static str {
//!         Self::NAME
//!     }
//!
//!     fn state_cell(&self) -> &StateCell {
//!         &self.state
//!     }
//!
//!     fn declare_options(&self, cli: &mut OptionGroup, _cfg: &mut OptionGroup) {
//!         cli.u64("beat-ms", "heartbeat period in milliseconds", Some(1000));
//!     }
//!
//!     async fn initialize(&self, options: &OptionMap) -> Result<(), PluginError> {
//!         let _period = options.u64("beat-ms")?;
//!         Ok(())
//!     }
//! }
//!
//! impl PluginMeta for HeartbeatPlugin {
//!     const NAME: &'static str = "heartbeat";
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;

use crate::application::AppHandle;
use crate::error::PluginError;
use crate::options::{OptionGroup, OptionMap};
use crate::registry;

/// Lifecycle state of a plugin instance. Strictly monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginState {
    Registered = 0,
    Initialized = 1,
    Started = 2,
    Stopped = 3,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginState::Registered => f.write_str("registered"),
            PluginState::Initialized => f.write_str("initialized"),
            PluginState::Started => f.write_str("started"),
            PluginState::Stopped => f.write_str("stopped"),
        }
    }
}

/// Atomic holder for a plugin's lifecycle state.
///
/// Embed one in each plugin struct and hand it out via
/// [`Plugin::state_cell`]; only the lifecycle engine advances it.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(PluginState::Registered as u8))
    }

    pub fn get(&self) -> PluginState {
        match self.0.load(Ordering::Acquire) {
            0 => PluginState::Registered,
            1 => PluginState::Initialized,
            2 => PluginState::Started,
            _ => PluginState::Stopped,
        }
    }

    pub(crate) fn set(&self, state: PluginState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// # Object-safe runtime interface of a plugin.
///
/// Hooks run on the task driving the application (`initialize`,
/// `startup`, `exec`); plugins that want to be driven from elsewhere
/// route through [`Application::post`](crate::Application::post).
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Stable plugin name; must equal [`PluginMeta::NAME`].
    fn name(&self) -> &'static str;

    /// Access to the embedded state holder.
    fn state_cell(&self) -> &StateCell;

    /// Current lifecycle state.
    fn state(&self) -> PluginState {
        self.state_cell().get()
    }

    /// Called once when the instance is bound to an application, before
    /// any other hook. Plugins that post work or request quit keep the
    /// (non-owning) handle.
    fn attach(&self, _app: AppHandle) {}

    /// Contributes option declarations. `cli` options are accepted on the
    /// command line only; `cfg` options are shared between the command
    /// line and the configuration file.
    fn declare_options(&self, _cli: &mut OptionGroup, _cfg: &mut OptionGroup) {}

    /// Captures configuration from the parsed option map. Dependencies
    /// are already initialized when this runs.
    async fn initialize(&self, _options: &OptionMap) -> Result<(), PluginError> {
        Ok(())
    }

    /// Begins operation. Dependencies are already started.
    async fn startup(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Releases resources. Everything depending on this plugin has
    /// already been stopped.
    async fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// # Static identity of a plugin type.
///
/// Used by [`register_plugin`](crate::register_plugin) and by typed
/// access via [`Application::get_plugin`](crate::Application::get_plugin).
/// Declare dependencies with the [`plugin_requires!`](crate::plugin_requires)
/// macro instead of spelling out both methods.
pub trait PluginMeta: Plugin + Default {
    /// Process-wide unique plugin name.
    const NAME: &'static str;

    /// Names of plugins that must be initialized and started before this
    /// one.
    fn dependencies() -> &'static [&'static str] {
        &[]
    }

    /// Registers the descriptor of every declared dependency type.
    fn register_dependencies() {}
}

/// Declares plugin dependencies inside a [`PluginMeta`] impl.
///
/// Expands to both `dependencies()` and `register_dependencies()` so the
/// declared list and the registered types cannot drift apart.
#[macro_export]
macro_rules! plugin_requires {
    ($($dep:ty),+ $(,)?) => {
        fn dependencies() -> &'static [&'static str] {
            &[$(<$dep as $crate::PluginMeta>::NAME),+]
        }

        fn register_dependencies() {
            $($crate::register_plugin::<$dep>();)+
        }
    };
}

/// A set of plugin types activated by default when the application
/// initializes, regardless of `--plugin` flags.
///
/// Implemented for `()` and for tuples of [`PluginMeta`] types up to four
/// entries; a single default root is spelled `(MyPlugin,)`.
pub trait PluginSet {
    /// Registers every plugin type in the set (idempotent).
    fn register();

    /// Names of the plugins in the set.
    fn names() -> Vec<&'static str>;
}

impl PluginSet for () {
    fn register() {}

    fn names() -> Vec<&'static str> {
        Vec::new()
    }
}

macro_rules! impl_plugin_set {
    ($($ty:ident),+) => {
        impl<$($ty: PluginMeta),+> PluginSet for ($($ty,)+) {
            fn register() {
                $(registry::register_plugin::<$ty>();)+
            }

            fn names() -> Vec<&'static str> {
                vec![$($ty::NAME),+]
            }
        }
    };
}

impl_plugin_set!(P1);
impl_plugin_set!(P1, P2);
impl_plugin_set!(P1, P2, P3);
impl_plugin_set!(P1, P2, P3, P4);
