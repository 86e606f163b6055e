use std::{net::SocketAddr, sync::Arc, time::Duration};

use synthctl_client::{BootStatus, ProcessError, Server, ServerError, ServerRegistry};
use synthctl_shared::AddAction;
use synthctl_test::{
    connected_pair, init_logging, options_for, quiet_config, wait_until, FakeEngine,
    FakeEngineConfig, FakeLauncher, LocalSocket,
};

const WAIT: Duration = Duration::from_secs(2);

fn engine_on(port: u16, maximum_logins: i32) -> FakeEngine {
    FakeEngine::start(FakeEngineConfig {
        addr: SocketAddr::from(([127, 0, 0, 1], port)),
        maximum_logins,
        ..FakeEngineConfig::default()
    })
}

fn fresh_server() -> Server {
    Server::with_registry(quiet_config(), Arc::new(ServerRegistry::new()))
}

#[test]
fn connect_creates_default_groups_and_disconnect_logs_out() {
    init_logging();
    let (engine, server) = connected_pair(57300, 1);

    assert_eq!(server.boot_status(), BootStatus::Online);
    assert!(!server.is_owner());
    assert_eq!(server.client_id(), Some(0));
    assert_eq!(server.default_group(), Some(1));
    assert_eq!(server.server_addr(), Some(engine.addr()));

    server.sync().unwrap();
    assert_eq!(engine.children(0), Some(vec![1]));
    assert_eq!(engine.logged_in(), vec![0]);

    server.disconnect().unwrap();
    assert_eq!(server.boot_status(), BootStatus::Offline);
    assert!(wait_until(WAIT, || engine.logged_in().is_empty()));
    assert!(server.with_node_tree(|tree| tree.len()).is_err());
}

#[test]
fn boot_owns_the_engine_until_quit() {
    init_logging();
    let engine = engine_on(57301, 1);
    let server = fresh_server();
    let (launcher, probe) = FakeLauncher::new();

    server
        .boot(options_for(engine.addr()), launcher.boxed(), engine.socket())
        .unwrap();
    assert!(server.is_owner());
    assert_eq!(probe.boots(), 1);
    assert!(probe.is_running());

    assert_eq!(server.disconnect(), Err(ServerError::OwnedServerShutdown));
    server.quit(false).unwrap();

    assert_eq!(server.boot_status(), BootStatus::Offline);
    assert!(engine.has_quit());
    assert_eq!(probe.terminations(), 1);
    assert!(!server.is_owner());
}

#[test]
fn failed_boot_leaves_proxy_offline() {
    init_logging();
    let engine = engine_on(57302, 1);
    let server = fresh_server();
    let error = ProcessError::BootTimeout {
        timeout: Duration::from_millis(10),
    };
    let (launcher, probe) = FakeLauncher::failing(error.clone());

    let result = server.boot(options_for(engine.addr()), launcher.boxed(), engine.socket());
    assert_eq!(result, Err(ServerError::Process(error)));
    assert_eq!(server.boot_status(), BootStatus::Offline);
    assert_eq!(probe.boots(), 1);
    assert!(engine.received_messages().is_empty());
}

#[test]
fn quitting_an_unowned_engine_needs_force() {
    init_logging();
    let (engine, server) = connected_pair(57303, 1);

    assert_eq!(server.quit(false), Err(ServerError::UnownedServerShutdown));
    assert!(server.is_running());

    server.quit(true).unwrap();
    assert!(engine.has_quit());
    assert_eq!(server.boot_status(), BootStatus::Offline);
}

#[test]
fn second_connect_is_rejected_while_online() {
    init_logging();
    let (engine, server) = connected_pair(57304, 1);
    let result = server.connect(options_for(engine.addr()), engine.socket());
    assert_eq!(
        result,
        Err(ServerError::AlreadyRunning {
            status: BootStatus::Online
        })
    );
    assert!(server.is_running());
}

#[test]
fn full_engine_refuses_another_client() {
    init_logging();
    let (engine, first) = connected_pair(57305, 1);
    let second = fresh_server();

    let result = second.connect(options_for(engine.addr()), engine.socket());
    assert_eq!(result, Err(ServerError::TooManyClients));
    assert_eq!(second.boot_status(), BootStatus::Offline);
    assert!(first.is_running());
    assert_eq!(engine.logged_in(), vec![0]);
}

#[test]
fn clients_sharing_an_engine_get_disjoint_ids() {
    init_logging();
    let (engine, first) = connected_pair(57306, 2);
    let second = fresh_server();
    second
        .connect(options_for(engine.addr()), engine.socket())
        .unwrap();

    assert_eq!(second.client_id(), Some(1));
    assert_eq!(second.default_group(), Some(2));

    let first_node = first.add_group(1, AddAction::AddToHead, false).unwrap();
    let second_node = second.add_group(2, AddAction::AddToHead, false).unwrap();
    assert_eq!(first_node, 1000);
    assert_eq!(second_node, (1 << 26) | 1000);

    first.sync().unwrap();
    second.sync().unwrap();
    assert!(engine.contains(first_node));
    assert!(engine.contains(second_node));
}

#[test]
fn registry_rejects_a_second_proxy_for_the_same_engine() {
    init_logging();
    let engine = engine_on(57307, 2);
    let registry = Arc::new(ServerRegistry::new());
    let first = Server::with_registry(quiet_config(), registry.clone());
    let second = Server::with_registry(quiet_config(), registry.clone());

    first
        .connect(options_for(engine.addr()), engine.socket())
        .unwrap();
    assert!(registry.contains(&engine.addr()));

    let result = second.connect(options_for(engine.addr()), engine.socket());
    assert_eq!(
        result,
        Err(ServerError::AlreadyRegistered {
            addr: engine.addr()
        })
    );
    assert_eq!(second.boot_status(), BootStatus::Offline);

    first.disconnect().unwrap();
    assert!(registry.is_empty());
    second
        .connect(options_for(engine.addr()), engine.socket())
        .unwrap();
    assert_eq!(registry.len(), 1);
}

#[test]
fn registry_shuts_down_every_proxy() {
    init_logging();
    let first_engine = engine_on(57308, 1);
    let second_engine = engine_on(57309, 1);
    let registry = Arc::new(ServerRegistry::new());
    let first = Server::with_registry(quiet_config(), registry.clone());
    let second = Server::with_registry(quiet_config(), registry.clone());
    first
        .connect(options_for(first_engine.addr()), first_engine.socket())
        .unwrap();
    second
        .connect(options_for(second_engine.addr()), second_engine.socket())
        .unwrap();
    assert_eq!(registry.len(), 2);

    registry.shutdown_all();

    assert_eq!(first.boot_status(), BootStatus::Offline);
    assert_eq!(second.boot_status(), BootStatus::Offline);
    assert!(registry.is_empty());
    assert!(wait_until(WAIT, || first_engine.logged_in().is_empty()));
}

#[test]
fn operations_fail_while_offline() {
    let server = fresh_server();
    assert_eq!(server.boot_status(), BootStatus::Offline);
    assert_eq!(server.add_group(1, AddAction::AddToHead, false), Err(ServerError::Offline));
    assert_eq!(server.sync(), Err(ServerError::Offline));
    assert_eq!(server.disconnect(), Err(ServerError::Offline));
    assert_eq!(server.quit(true), Err(ServerError::Offline));
    assert!(server.client_id().is_none());
}

#[test]
fn refused_socket_can_be_retried() {
    init_logging();
    let engine = engine_on(57310, 1);
    let server = fresh_server();

    let result = server.connect(options_for(engine.addr()), LocalSocket::refusing(engine.addr()));
    assert!(matches!(result, Err(ServerError::Connect(_))));
    assert_eq!(server.boot_status(), BootStatus::Offline);

    server
        .connect(options_for(engine.addr()), engine.socket())
        .unwrap();
    assert!(server.is_running());
}

#[test]
fn silent_engine_fails_the_handshake() {
    init_logging();
    let engine = engine_on(57311, 1);
    engine.set_muted(true);
    let server = fresh_server();

    let result = server.connect(options_for(engine.addr()), engine.socket());
    assert!(matches!(result, Err(ServerError::HandshakeFailed { .. })));
    assert_eq!(server.boot_status(), BootStatus::Offline);
    assert!(server.server_addr().is_none());
}

#[test]
fn dropping_the_proxy_logs_out() {
    init_logging();
    let (engine, server) = connected_pair(57312, 1);
    server.sync().unwrap();
    drop(server);
    assert!(wait_until(WAIT, || engine.logged_in().is_empty()));
    assert_eq!(engine.received("/notify").len(), 2);
}
