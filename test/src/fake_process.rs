use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use synthctl_client::{ProcessError, ProcessLauncher};
use synthctl_shared::ServerOptions;

#[derive(Default)]
struct Counters {
    boots: AtomicUsize,
    terminations: AtomicUsize,
    running: AtomicBool,
}

/// Process launcher that pretends to start an engine
pub struct FakeLauncher {
    counters: Arc<Counters>,
    boot_error: Option<ProcessError>,
}

/// Observes a [`FakeLauncher`] after it has been handed to a proxy
#[derive(Clone)]
pub struct LauncherProbe {
    counters: Arc<Counters>,
}

impl FakeLauncher {
    pub fn new() -> (Self, LauncherProbe) {
        let counters = Arc::new(Counters::default());
        let launcher = Self {
            counters: counters.clone(),
            boot_error: None,
        };
        (launcher, LauncherProbe { counters })
    }

    /// A launcher whose boot always fails with `error`.
    pub fn failing(error: ProcessError) -> (Self, LauncherProbe) {
        let (mut launcher, probe) = Self::new();
        launcher.boot_error = Some(error);
        (launcher, probe)
    }

    pub fn boxed(self) -> Box<dyn ProcessLauncher> {
        Box::new(self)
    }
}

impl ProcessLauncher for FakeLauncher {
    fn boot(&mut self, _options: &ServerOptions, _timeout: Duration) -> Result<(), ProcessError> {
        self.counters.boots.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.boot_error {
            return Err(error.clone());
        }
        self.counters.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        self.counters.running.load(Ordering::SeqCst)
    }

    fn terminate(&mut self) -> Result<(), ProcessError> {
        if self.counters.running.swap(false, Ordering::SeqCst) {
            self.counters.terminations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl LauncherProbe {
    pub fn boots(&self) -> usize {
        self.counters.boots.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.counters.terminations.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.counters.running.load(Ordering::SeqCst)
    }
}
