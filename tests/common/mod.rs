//! Shared test fixtures: a small plugin family with declared
//! dependencies (`gateway` → `net` → `store`) plus hooks that can be
//! told to fail.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chassis::{
    AppConfig, Application, OptionGroup, OptionMap, Plugin, PluginError, PluginMeta, StateCell,
};

pub fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

pub fn new_app() -> Arc<Application> {
    Application::new(AppConfig::default())
}

/// Shared shutdown tally, set on a plugin after startup the way an
/// embedder would wire late state into a live instance.
type Counter = Mutex<Option<Arc<AtomicU32>>>;

fn bump(counter: &Counter) {
    if let Some(counter) = counter.lock().unwrap().as_ref() {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Storage-flavored plugin with command-line-only options.
#[derive(Default, Debug)]
pub struct StorePlugin {
    state: StateCell,
    readonly: AtomicBool,
    replay: AtomicBool,
    dbsize: AtomicU64,
    shutdown_counter: Counter,
}

impl StorePlugin {
    pub fn dbsize(&self) -> u64 {
        self.dbsize.load(Ordering::Relaxed)
    }

    pub fn readonly(&self) -> bool {
        self.readonly.load(Ordering::Relaxed)
    }

    pub fn replay(&self) -> bool {
        self.replay.load(Ordering::Relaxed)
    }

    pub fn set_shutdown_counter(&self, counter: Arc<AtomicU32>) {
        *self.shutdown_counter.lock().unwrap() = Some(counter);
    }
}

#[async_trait]
impl Plugin for StorePlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state_cell(&self) -> &StateCell {
        &self.state
    }

    fn declare_options(&self, cli: &mut OptionGroup, _cfg: &mut OptionGroup) {
        cli.flag("readonly", "open the store in read-only mode")
            .flag("replay", "clear the store and replay the log")
            .u64("dbsize", "minimum size of the store in MB", Some(8 * 1024));
    }

    async fn initialize(&self, options: &OptionMap) -> Result<(), PluginError> {
        self.readonly.store(options.flag("readonly"), Ordering::Relaxed);
        self.replay.store(options.flag("replay"), Ordering::Relaxed);
        self.dbsize.store(options.u64("dbsize")?, Ordering::Relaxed);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        bump(&self.shutdown_counter);
        Ok(())
    }
}

impl PluginMeta for StorePlugin {
    const NAME: &'static str = "store";
}

/// Network-flavored plugin depending on the store. The endpoint is a
/// shared option, settable from the config file as well.
#[derive(Default)]
pub struct NetPlugin {
    state: StateCell,
    endpoint: Mutex<String>,
    fail_on_shutdown: AtomicBool,
    shutdown_counter: Counter,
}

impl NetPlugin {
    pub fn endpoint(&self) -> String {
        self.endpoint.lock().unwrap().clone()
    }

    pub fn set_shutdown_counter(&self, counter: Arc<AtomicU32>) {
        *self.shutdown_counter.lock().unwrap() = Some(counter);
    }
}

#[async_trait]
impl Plugin for NetPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state_cell(&self) -> &StateCell {
        &self.state
    }

    fn declare_options(&self, cli: &mut OptionGroup, cfg: &mut OptionGroup) {
        cfg.text("endpoint", "address and port to listen on", Some("127.0.0.1:9876"));
        cli.flag("fail-on-shutdown", "fail inside the shutdown hook");
    }

    async fn initialize(&self, options: &OptionMap) -> Result<(), PluginError> {
        *self.endpoint.lock().unwrap() = options.text("endpoint")?.to_string();
        self.fail_on_shutdown
            .store(options.flag("fail-on-shutdown"), Ordering::Relaxed);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        bump(&self.shutdown_counter);
        if self.fail_on_shutdown.load(Ordering::Relaxed) {
            return Err(PluginError::failed("failing in shutdown"));
        }
        Ok(())
    }
}

impl PluginMeta for NetPlugin {
    const NAME: &'static str = "net";
    chassis::plugin_requires!(StorePlugin);
}

/// Top of the dependency chain; declares nothing itself.
#[derive(Default)]
pub struct GatewayPlugin {
    state: StateCell,
}

#[async_trait]
impl Plugin for GatewayPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state_cell(&self) -> &StateCell {
        &self.state
    }
}

impl PluginMeta for GatewayPlugin {
    const NAME: &'static str = "gateway";
    chassis::plugin_requires!(NetPlugin);
}

/// Fails its initialize hook; depends on the store.
#[derive(Default)]
pub struct FailInitPlugin {
    state: StateCell,
}

#[async_trait]
impl Plugin for FailInitPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state_cell(&self) -> &StateCell {
        &self.state
    }

    async fn initialize(&self, _options: &OptionMap) -> Result<(), PluginError> {
        Err(PluginError::failed("refusing to initialize"))
    }
}

impl PluginMeta for FailInitPlugin {
    const NAME: &'static str = "fail_init";
    chassis::plugin_requires!(StorePlugin);
}

/// Fails its startup hook; depends on the store.
#[derive(Default)]
pub struct FailStartPlugin {
    state: StateCell,
}

#[async_trait]
impl Plugin for FailStartPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state_cell(&self) -> &StateCell {
        &self.state
    }

    async fn startup(&self) -> Result<(), PluginError> {
        Err(PluginError::failed("refusing to start"))
    }
}

impl PluginMeta for FailStartPlugin {
    const NAME: &'static str = "fail_start";
    chassis::plugin_requires!(StorePlugin);
}
