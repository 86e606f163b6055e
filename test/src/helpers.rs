use std::{
    net::SocketAddr,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use synthctl_client::{ClientConfig, HealthCheckConfig, Server, ServerRegistry};
use synthctl_shared::ServerOptions;

use crate::fake_engine::{FakeEngine, FakeEngineConfig};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

/// Client settings with short timeouts and no status polling.
pub fn quiet_config() -> ClientConfig {
    ClientConfig {
        request_timeout: Duration::from_millis(500),
        quit_timeout: Duration::from_millis(200),
        health_check: HealthCheckConfig {
            active: false,
            ..HealthCheckConfig::default()
        },
        ..ClientConfig::default()
    }
}

/// Engine options matching a fake engine listening on `addr`.
pub fn options_for(addr: SocketAddr) -> ServerOptions {
    ServerOptions {
        ip_address: addr.ip().to_string(),
        port: addr.port(),
        ..ServerOptions::default()
    }
}

/// A fake engine on `port` and a proxy connected to it, with its own
/// registry.
pub fn connected_pair(port: u16, maximum_logins: i32) -> (FakeEngine, Server) {
    let engine = FakeEngine::start(FakeEngineConfig {
        addr: SocketAddr::from(([127, 0, 0, 1], port)),
        maximum_logins,
        ..FakeEngineConfig::default()
    });
    let server = Server::with_registry(quiet_config(), Arc::new(ServerRegistry::new()));
    server
        .connect(options_for(engine.addr()), engine.socket())
        .expect("connect to fake engine");
    (engine, server)
}
