use std::{net::SocketAddr, sync::Arc, time::Duration};

use synthctl_client::{AsyncServer, BootStatus, ServerError, ServerRegistry};
use synthctl_shared::{AddAction, Controls, OscMessage, Response, ServerRequest};
use synthctl_test::{init_logging, options_for, quiet_config, FakeEngine, FakeEngineConfig, FakeLauncher};

fn engine_on(port: u16) -> FakeEngine {
    FakeEngine::start(FakeEngineConfig {
        addr: SocketAddr::from(([127, 0, 0, 1], port)),
        ..FakeEngineConfig::default()
    })
}

fn fresh_server() -> AsyncServer {
    AsyncServer::with_registry(quiet_config(), Arc::new(ServerRegistry::new()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_proxy_mirrors_nodes() {
    init_logging();
    let engine = engine_on(57700);
    let server = fresh_server();
    server
        .connect(options_for(engine.addr()), engine.socket())
        .await
        .unwrap();
    assert_eq!(server.client_id(), Some(0));

    let group = server.add_group(1, AddAction::AddToHead, false).unwrap();
    let synth = server
        .add_synth(group, AddAction::AddToTail, "default", Controls::new().with("amp", 0.1f32))
        .unwrap();
    server.sync().await.unwrap();

    assert_eq!(engine.children(group), Some(vec![synth]));
    let engine_tree = server.query_tree(0, true).await.unwrap().unwrap();
    let mirror_tree = server
        .with_node_tree(|tree| tree.to_query_tree(0, true))
        .unwrap()
        .unwrap();
    assert_eq!(engine_tree, mirror_tree);

    server.disconnect().await.unwrap();
    assert_eq!(server.boot_status(), BootStatus::Offline);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_boot_and_quit() {
    init_logging();
    let engine = engine_on(57701);
    let server = fresh_server();
    let (launcher, probe) = FakeLauncher::new();

    server
        .boot(options_for(engine.addr()), launcher.boxed(), engine.socket())
        .await
        .unwrap();
    assert!(server.is_owner());
    assert_eq!(server.disconnect().await, Err(ServerError::OwnedServerShutdown));

    server.quit(false).await.unwrap();
    assert!(engine.has_quit());
    assert_eq!(probe.terminations(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_settle_independently() {
    init_logging();
    let engine = engine_on(57702);
    let server = fresh_server();
    server
        .connect(options_for(engine.addr()), engine.socket())
        .await
        .unwrap();

    let (first, second, version) = tokio::join!(
        server.sync(),
        server.sync(),
        server.communicate(ServerRequest::Version, None),
    );
    first.unwrap();
    second.unwrap();
    assert!(matches!(version.unwrap(), Some(Response::Version(_))));
    assert_eq!(engine.received("/sync").len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_timeout_yields_none_and_sync_errors() {
    init_logging();
    let engine = engine_on(57703);
    let server = fresh_server();
    server
        .connect(options_for(engine.addr()), engine.socket())
        .await
        .unwrap();
    engine.set_muted(true);

    let reply = server
        .communicate(ServerRequest::Status, Some(Duration::from_millis(30)))
        .await
        .unwrap();
    assert!(reply.is_none());
    assert!(matches!(server.sync().await, Err(ServerError::Correlator(_))));
    // only the persistent notification handlers remain
    assert_eq!(server.core().correlator().registration_count(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_wait_releases_its_handler() {
    init_logging();
    let engine = engine_on(57704);
    let server = fresh_server();
    server
        .connect(options_for(engine.addr()), engine.socket())
        .await
        .unwrap();
    engine.set_muted(true);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        server.communicate(ServerRequest::Version, Some(Duration::from_secs(30))),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(server.core().correlator().registration_count(), 8);

    engine.set_muted(false);
    engine.inject(OscMessage::new(
        "/version.reply",
        vec!["scsynth".into(), 3.into(), 13.into(), ".0".into(), "main".into(), "late".into()],
    ));
    server.sync().await.unwrap();
    assert_eq!(server.core().correlator().registration_count(), 8);
    assert!(server.is_running());
}
