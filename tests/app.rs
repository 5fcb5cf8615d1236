//! End-to-end application scenarios: option delivery, startup/shutdown,
//! error containment, drain-on-quit, and sequential scoped lifetimes.

mod common;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use chassis::{AppConfig, AppError, Plugin, PluginState, Priority, ScopedApp, TaskError};

use common::{argv, new_app, NetPlugin, StorePlugin};

#[tokio::test]
async fn options_reach_plugins_verbatim() {
    let app = new_app();

    let ready = app
        .initialize::<(NetPlugin,)>(argv(&[
            "test",
            "--plugin",
            "store",
            "--readonly",
            "--replay",
            "--dbsize",
            "10000",
            "--plugin",
            "net",
            "--endpoint",
            "127.0.0.1:55",
            "--fail-on-shutdown",
        ]))
        .await
        .unwrap();
    assert!(ready);

    let store = app.get_plugin::<StorePlugin>().unwrap();
    assert_eq!(store.dbsize(), 10000);
    assert!(store.readonly());
    assert!(store.replay());

    let net = app.get_plugin::<NetPlugin>().unwrap();
    assert_eq!(net.endpoint(), "127.0.0.1:55");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn configured_plugins_start_and_stop() {
    let app = new_app();
    assert!(app
        .initialize::<(NetPlugin,)>(argv(&["test"]))
        .await
        .unwrap());
    app.startup().await.unwrap();

    let store = app.get_plugin::<StorePlugin>().unwrap();
    let net = app.get_plugin::<NetPlugin>().unwrap();
    assert_eq!(store.state(), PluginState::Started);
    assert_eq!(net.state(), PluginState::Started);

    let exec = tokio::spawn({
        let app = app.clone();
        async move { app.exec().await }
    });
    app.quit();
    exec.await.unwrap().unwrap();

    assert_eq!(store.state(), PluginState::Stopped);
    assert_eq!(net.state(), PluginState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sequential_scoped_applications_both_run_cleanly() {
    for round in 0..2 {
        let app = ScopedApp::new(AppConfig::default());
        assert!(
            app.initialize::<(NetPlugin,)>(argv(&["test"]))
                .await
                .unwrap(),
            "initialize failed on round {round}"
        );
        app.startup().await.unwrap();

        let store = app.get_plugin::<StorePlugin>().unwrap();
        let net = app.get_plugin::<NetPlugin>().unwrap();
        assert_eq!(store.state(), PluginState::Started);
        assert_eq!(net.state(), PluginState::Started);

        let exec = tokio::spawn({
            let app = app.handle();
            async move { app.exec().await }
        });
        app.quit();
        exec.await.unwrap().unwrap();

        assert_eq!(store.state(), PluginState::Stopped);
        assert_eq!(net.state(), PluginState::Stopped);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn task_error_in_exec_shuts_every_plugin_down() {
    let app = new_app();
    assert!(app
        .initialize::<(NetPlugin,)>(argv(&["test"]))
        .await
        .unwrap());
    app.startup().await.unwrap();

    let counter = Arc::new(AtomicU32::new(0));
    app.get_plugin::<StorePlugin>()
        .unwrap()
        .set_shutdown_counter(counter.clone());
    app.get_plugin::<NetPlugin>()
        .unwrap()
        .set_shutdown_counter(counter.clone());

    let exec = tokio::spawn({
        let app = app.clone();
        async move { app.exec().await }
    });
    app.post(Priority::HIGH, || Err(TaskError::failed("boom in store")));

    let err = exec.await.unwrap().unwrap_err();
    assert!(matches!(err, AppError::Task(_)), "got {err:?}");
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_hook_error_does_not_truncate_shutdown() {
    let app = new_app();
    assert!(app
        .initialize::<(NetPlugin,)>(argv(&["test", "--fail-on-shutdown"]))
        .await
        .unwrap());
    app.startup().await.unwrap();

    let counter = Arc::new(AtomicU32::new(0));
    let store = app.get_plugin::<StorePlugin>().unwrap();
    store.set_shutdown_counter(counter.clone());
    app.get_plugin::<NetPlugin>()
        .unwrap()
        .set_shutdown_counter(counter.clone());

    let exec = tokio::spawn({
        let app = app.clone();
        async move { app.exec().await }
    });
    app.post(Priority::HIGH, || Err(TaskError::failed("boom in store")));

    // The runtime error wins over the shutdown error, and the failing
    // first-to-stop plugin does not keep the second from stopping.
    let err = exec.await.unwrap().unwrap_err();
    assert!(matches!(err, AppError::Task(_)), "got {err:?}");
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(store.state(), PluginState::Stopped);
}

fn fib(n: u64) -> u64 {
    if n <= 1 {
        n
    } else {
        fib(n - 1) + fib(n - 2)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn quit_discards_pending_work() {
    let app = new_app();
    assert!(app
        .initialize::<(NetPlugin,)>(argv(&["test"]))
        .await
        .unwrap());
    app.startup().await.unwrap();

    let counter = Arc::new(AtomicU32::new(0));
    app.get_plugin::<StorePlugin>()
        .unwrap()
        .set_shutdown_counter(counter.clone());
    app.get_plugin::<NetPlugin>()
        .unwrap()
        .set_shutdown_counter(counter.clone());

    let exec = tokio::spawn({
        let app = app.clone();
        async move { app.exec().await }
    });

    let executed = Arc::new(AtomicU64::new(0));
    for _ in 0..100 {
        let executed = executed.clone();
        app.post(Priority::HIGH, move || {
            std::hint::black_box(fib(30));
            executed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    app.quit();

    exec.await.unwrap().unwrap();
    assert!(
        executed.load(Ordering::SeqCst) < 100,
        "quit should have discarded pending work"
    );
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
