use std::{
    io::{BufRead, BufReader, Read},
    process::{Child, Command, Stdio},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use thiserror::Error;

use synthctl_shared::ServerOptions;

const READY_LINES: [&str; 2] = ["SuperCollider 3 server ready", "Supernova ready"];
const ERROR_PREFIXES: [&str; 3] = ["Exception", "ERROR", "*** ERROR"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("Could not launch `{executable}`: {reason}")]
    Spawn { executable: String, reason: String },

    #[error("Engine did not report readiness within {timeout:?}")]
    BootTimeout { timeout: Duration },

    #[error("Engine exited during boot")]
    Exited,

    #[error("Engine reported an error during boot: {line}")]
    EngineError { line: String },

    #[error("Could not terminate the engine: {reason}")]
    Terminate { reason: String },

    #[error("An engine process is already running")]
    AlreadyRunning,
}

/// Starts and stops an engine process
///
/// Server proxies only talk to the process through this seam, so tests can
/// stand in a fake.
pub trait ProcessLauncher: Send {
    /// Launches the engine and blocks until it reports readiness.
    fn boot(&mut self, options: &ServerOptions, timeout: Duration) -> Result<(), ProcessError>;
    fn is_running(&mut self) -> bool;
    fn terminate(&mut self) -> Result<(), ProcessError>;
}

/// Launches `scsynth` (or `supernova`) as a child process
#[derive(Default)]
pub struct ScsynthProcess {
    child: Option<Child>,
    output: Option<Receiver<String>>,
}

impl ScsynthProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines printed by the engine since the last call.
    pub fn drain_output(&self) -> Vec<String> {
        self.output
            .as_ref()
            .map(|output| output.try_iter().collect())
            .unwrap_or_default()
    }

    fn spawn_reader<R: Read + Send + 'static>(stream: R, sender: mpsc::Sender<String>) {
        thread::spawn(move || {
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else {
                    break;
                };
                debug!("engine: {}", line);
                if sender.send(line).is_err() {
                    break;
                }
            }
        });
    }
}

impl ProcessLauncher for ScsynthProcess {
    fn boot(&mut self, options: &ServerOptions, timeout: Duration) -> Result<(), ProcessError> {
        if self.is_running() {
            return Err(ProcessError::AlreadyRunning);
        }
        let arguments = options.serialize();
        let Some((executable, rest)) = arguments.split_first() else {
            return Err(ProcessError::Spawn {
                executable: options.executable.clone(),
                reason: "empty command line".to_string(),
            });
        };
        info!("Booting: {}", arguments.join(" "));

        let mut child = Command::new(executable)
            .args(rest)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| ProcessError::Spawn {
                executable: executable.clone(),
                reason: error.to_string(),
            })?;

        let (sender, receiver) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            Self::spawn_reader(stdout, sender.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            Self::spawn_reader(stderr, sender);
        }
        self.child = Some(child);

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.terminate()?;
                return Err(ProcessError::BootTimeout { timeout });
            }
            match receiver.recv_timeout(remaining) {
                Ok(line) => {
                    if READY_LINES.iter().any(|ready| line.starts_with(ready)) {
                        self.output = Some(receiver);
                        return Ok(());
                    }
                    if ERROR_PREFIXES.iter().any(|prefix| line.starts_with(prefix)) {
                        self.terminate()?;
                        return Err(ProcessError::EngineError { line });
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.terminate()?;
                    return Err(ProcessError::Exited);
                }
            }
        }
    }

    fn is_running(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) | None => false,
        }
    }

    fn terminate(&mut self) -> Result<(), ProcessError> {
        self.output = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if let Ok(Some(status)) = child.try_wait() {
            debug!("Engine already exited with {}", status);
            return Ok(());
        }
        child.kill().map_err(|error| ProcessError::Terminate {
            reason: error.to_string(),
        })?;
        match child.wait() {
            Ok(status) => info!("Engine terminated with {}", status),
            Err(error) => warn!("Could not reap engine process: {}", error),
        }
        Ok(())
    }
}

impl Drop for ScsynthProcess {
    fn drop(&mut self) {
        if let Err(error) = self.terminate() {
            warn!("{}", error);
        }
    }
}
