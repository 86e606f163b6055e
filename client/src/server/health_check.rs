use std::time::{Duration, Instant};

/// Longest wait between polls, however far the backoff has grown
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Settings for the `/status` watcher
#[derive(Clone, Debug)]
pub struct HealthCheckConfig {
    /// Whether the watcher runs at all
    pub active: bool,
    /// Wait before the first retry; each further miss multiplies it by
    /// `backoff_factor`
    pub timeout: Duration,
    pub backoff_factor: f64,
    /// Missed replies tolerated before the proxy shuts itself down
    pub max_attempts: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            active: true,
            timeout: Duration::from_secs(1),
            backoff_factor: 1.5,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthAction {
    /// Nothing due yet
    Wait,
    /// Send another `/status`
    SendStatus,
    /// The engine missed too many replies
    GiveUp,
}

/// Tracks outstanding `/status` polls and decides when to give up
#[derive(Debug)]
pub struct HealthMonitor {
    config: HealthCheckConfig,
    attempts: u32,
    deadline: Instant,
}

impl HealthMonitor {
    /// The first poll is due immediately.
    pub fn new(config: HealthCheckConfig, now: Instant) -> Self {
        Self {
            config,
            attempts: 0,
            deadline: now,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn poll(&mut self, now: Instant) -> HealthAction {
        if now < self.deadline {
            return HealthAction::Wait;
        }
        if self.attempts >= self.config.max_attempts {
            return HealthAction::GiveUp;
        }
        let wait = self.backoff(self.attempts);
        self.deadline = now + wait;
        self.attempts += 1;
        HealthAction::SendStatus
    }

    /// A `/status.reply` arrived.
    pub fn on_reply(&mut self, now: Instant) {
        self.attempts = 0;
        self.deadline = now + self.config.timeout.min(MAX_POLL_INTERVAL);
    }

    /// `timeout * backoff_factor ^ attempts`, capped at [`MAX_POLL_INTERVAL`].
    fn backoff(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts).unwrap_or(i32::MAX);
        let factor = self.config.backoff_factor.max(1.0).powi(exponent);
        Duration::try_from_secs_f64(self.config.timeout.as_secs_f64() * factor)
            .unwrap_or(MAX_POLL_INTERVAL)
            .min(MAX_POLL_INTERVAL)
    }

    /// Time left until the next poll is due.
    pub fn until_due(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}
