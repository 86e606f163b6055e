//! Test doubles for driving synthctl proxies without a real engine: an
//! in-memory transport, a scripted engine and a fake process launcher.

pub mod fake_process;
pub mod helpers;
pub mod local_socket;

pub use fake_engine::{FakeEngine, FakeEngineConfig};
pub use fake_process::{FakeLauncher, LauncherProbe};
pub use helpers::*;
pub use local_socket::{EngineEnd, LocalSocket, LocalSocketPair};
