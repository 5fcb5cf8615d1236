//! Minimal long-running service: one heartbeat plugin, shut down by
//! Ctrl-C through the regular drain-and-stop path.
//!
//! ```text
//! cargo run --example quit_on_signal -- --beat-ms 500
//! ```

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chassis::{
    AppConfig, AppHandle, Application, OptionGroup, OptionMap, Plugin, PluginError, PluginMeta,
    Priority, StateCell,
};

#[derive(Default)]
struct HeartbeatPlugin {
    state: StateCell,
    app: Mutex<Option<AppHandle>>,
    period: Mutex<Duration>,
}

impl HeartbeatPlugin {
    fn beat(app: AppHandle, period: Duration) {
        app.clone().post_after(period, Priority::LOW, move || {
            tracing::info!("heartbeat");
            HeartbeatPlugin::beat(app, period);
            Ok(())
        });
    }
}

#[async_trait]
impl Plugin for HeartbeatPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state_cell(&self) -> &StateCell {
        &self.state
    }

    fn attach(&self, app: AppHandle) {
        *self.app.lock().unwrap() = Some(app);
    }

    fn declare_options(&self, _cli: &mut OptionGroup, cfg: &mut OptionGroup) {
        cfg.u64("beat-ms", "heartbeat period in milliseconds", Some(1000));
    }

    async fn initialize(&self, options: &OptionMap) -> Result<(), PluginError> {
        *self.period.lock().unwrap() = Duration::from_millis(options.u64("beat-ms")?);
        Ok(())
    }

    async fn startup(&self) -> Result<(), PluginError> {
        let app = self
            .app
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PluginError::failed("heartbeat not attached"))?;
        HeartbeatPlugin::beat(app, *self.period.lock().unwrap());
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        tracing::info!("heartbeat stopped");
        Ok(())
    }
}

impl PluginMeta for HeartbeatPlugin {
    const NAME: &'static str = "heartbeat";
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    chassis::register_plugin::<HeartbeatPlugin>();

    let app = Application::new(AppConfig {
        name: "quit_on_signal".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        about: Some("chassis demo: heartbeat until Ctrl-C".to_string()),
        ..AppConfig::default()
    });

    if !app
        .initialize::<(HeartbeatPlugin,)>(std::env::args().collect())
        .await?
    {
        return Ok(());
    }
    app.startup().await?;
    app.install_signal_handlers();
    app.exec().await?;
    Ok(())
}
