//! Two-plugin demo: a queue plugin feeding a worker plugin.
//!
//! ```text
//! cargo run --example two_plugins -- --plugin worker --batch 5
//! cargo run --example two_plugins -- --help
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chassis::{
    AppConfig, AppHandle, Application, LogObserver, OptionGroup, OptionMap, Plugin, PluginError,
    PluginMeta, Priority, StateCell,
};

/// Holds a bounded amount of demo work.
#[derive(Default)]
struct QueuePlugin {
    state: StateCell,
    depth: AtomicU64,
}

impl QueuePlugin {
    fn take(&self) -> Option<u64> {
        self.depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
    }
}

#[async_trait]
impl Plugin for QueuePlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state_cell(&self) -> &StateCell {
        &self.state
    }

    fn declare_options(&self, _cli: &mut OptionGroup, cfg: &mut OptionGroup) {
        cfg.u64("batch", "number of demo work items to enqueue", Some(10));
    }

    async fn initialize(&self, options: &OptionMap) -> Result<(), PluginError> {
        self.depth.store(options.u64("batch")?, Ordering::SeqCst);
        Ok(())
    }
}

impl PluginMeta for QueuePlugin {
    const NAME: &'static str = "queue";
}

/// Drains the queue plugin through posted work items, then quits.
#[derive(Default)]
struct WorkerPlugin {
    state: StateCell,
    app: Mutex<Option<AppHandle>>,
}

impl WorkerPlugin {
    fn pump(app: AppHandle, queue: Arc<QueuePlugin>) {
        app.clone().post(Priority::MEDIUM, move || {
            match queue.take() {
                Some(depth_before) => {
                    tracing::info!(remaining = depth_before - 1, "processed one item");
                    WorkerPlugin::pump(app, queue);
                }
                None => {
                    tracing::info!("queue drained, quitting");
                    app.quit();
                }
            }
            Ok(())
        });
    }
}

#[async_trait]
impl Plugin for WorkerPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state_cell(&self) -> &StateCell {
        &self.state
    }

    fn attach(&self, app: AppHandle) {
        *self.app.lock().unwrap() = Some(app);
    }

    async fn startup(&self) -> Result<(), PluginError> {
        let app = self
            .app
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PluginError::failed("worker not attached"))?;
        let queue = app
            .upgrade()
            .ok_or_else(|| PluginError::failed("application already gone"))?
            .get_plugin::<QueuePlugin>()
            .map_err(|e| PluginError::failed(e.to_string()))?;
        WorkerPlugin::pump(app, queue);
        Ok(())
    }
}

impl PluginMeta for WorkerPlugin {
    const NAME: &'static str = "worker";
    chassis::plugin_requires!(QueuePlugin);
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    chassis::register_plugin::<WorkerPlugin>();

    let app = Application::new(AppConfig {
        name: "two_plugins".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        about: Some("chassis demo: a queue plugin feeding a worker plugin".to_string()),
        ..AppConfig::default()
    });
    chassis::spawn_observer(Arc::new(LogObserver), app.subscribe());

    if !app
        .initialize::<(WorkerPlugin,)>(std::env::args().collect())
        .await?
    {
        return Ok(());
    }
    app.startup().await?;
    app.exec().await?;
    Ok(())
}
