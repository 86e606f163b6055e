use std::{net::SocketAddr, sync::Arc, thread, time::Duration};

use synthctl_client::{BootStatus, ClientConfig, HealthCheckConfig, Server, ServerRegistry};
use synthctl_test::{init_logging, options_for, quiet_config, wait_until, FakeEngine, FakeEngineConfig};

fn watched_config() -> ClientConfig {
    ClientConfig {
        health_check: HealthCheckConfig {
            active: true,
            timeout: Duration::from_millis(20),
            backoff_factor: 1.0,
            max_attempts: 3,
        },
        ..quiet_config()
    }
}

fn engine_on(port: u16, answer_status: bool) -> FakeEngine {
    FakeEngine::start(FakeEngineConfig {
        addr: SocketAddr::from(([127, 0, 0, 1], port)),
        answer_status,
        ..FakeEngineConfig::default()
    })
}

#[test]
fn answered_polls_keep_the_proxy_online() {
    init_logging();
    let engine = engine_on(57600, true);
    let server = Server::with_registry(watched_config(), Arc::new(ServerRegistry::new()));
    server
        .connect(options_for(engine.addr()), engine.socket())
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || server.status().is_some()));
    thread::sleep(Duration::from_millis(200));
    assert!(server.is_running());

    let status = server.status().unwrap();
    assert_eq!(status.group_count, 2);
    assert_eq!(status.actual_sample_rate, 44100.0);
    assert!(engine.received("/status").len() > 1);
}

#[test]
fn unanswered_polls_shut_the_proxy_down() {
    init_logging();
    let engine = engine_on(57601, false);
    let registry = Arc::new(ServerRegistry::new());
    let server = Server::with_registry(watched_config(), registry.clone());
    server
        .connect(options_for(engine.addr()), engine.socket())
        .unwrap();
    assert!(server.is_running());

    assert!(wait_until(Duration::from_secs(3), || server.boot_status() == BootStatus::Offline));
    assert!(registry.is_empty());
    assert!(wait_until(Duration::from_secs(1), || engine.logged_in().is_empty()));
    assert_eq!(engine.received("/status").len(), 3);

    engine.set_answer_status(true);
    server
        .connect(options_for(engine.addr()), engine.socket())
        .unwrap();
    assert!(server.is_running());
}

#[test]
fn engine_going_quiet_is_noticed() {
    init_logging();
    let engine = engine_on(57602, true);
    let server = Server::with_registry(watched_config(), Arc::new(ServerRegistry::new()));
    server
        .connect(options_for(engine.addr()), engine.socket())
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || server.status().is_some()));

    engine.set_answer_status(false);
    assert!(wait_until(Duration::from_secs(3), || !server.is_running()));
}
