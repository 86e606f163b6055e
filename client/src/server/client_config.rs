use std::{default::Default, time::Duration};

use super::health_check::HealthCheckConfig;

/// Contains Config properties which will be used by a Server proxy
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// How long `communicate` waits for a reply when no timeout is given
    pub request_timeout: Duration,
    /// How long the inbound pump sleeps when the socket has nothing to read
    pub receive_poll_interval: Duration,
    /// How long an owning proxy waits for `/done /quit` before terminating
    /// the engine process
    pub quit_timeout: Duration,
    /// How long to wait for a launched engine to report readiness
    pub boot_timeout: Duration,
    /// Scheduling latency added to timed bundles
    pub latency: Duration,
    /// Configuration used to watch that the engine is still answering
    pub health_check: HealthCheckConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(1),
            receive_poll_interval: Duration::from_millis(1),
            quit_timeout: Duration::from_secs(1),
            boot_timeout: Duration::from_secs(10),
            latency: Duration::from_millis(100),
            health_check: HealthCheckConfig::default(),
        }
    }
}
