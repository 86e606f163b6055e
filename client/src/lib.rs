//! # synthctl Client
//! Drives a SuperCollider synthesis engine over OSC/UDP: correlates
//! requests with their replies, mirrors the engine's node tree and manages
//! the engine's lifecycle, through a blocking [`Server`] or, with the
//! `async_server` feature, a tokio based `AsyncServer`.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

#[macro_use]
extern crate cfg_if;

pub mod transport;
pub mod shared {
    pub use synthctl_shared::*;
}

mod correlator;
mod node_tree;
mod server;

pub use correlator::{
    callback_table::{CallbackHandle, ResponseCallback},
    capture::{Capture, CaptureDirection, CaptureEntry},
    correlator::Correlator,
    error::CorrelatorError,
};
pub use node_tree::{
    error::NodeTreeError,
    node::{Node, NodeKind},
    node_tree::NodeTree,
};
pub use server::{
    boot_status::BootStatus,
    client_config::ClientConfig,
    server_core::ServerCore,
    error::ServerError,
    health_check::{HealthAction, HealthCheckConfig, HealthMonitor},
    process::{ProcessError, ProcessLauncher, ScsynthProcess},
    registry::{RegistryEntry, ServerRegistry},
    session::{Buffer, BusGroup, Session},
    Server,
};

cfg_if! {
    if #[cfg(feature = "async_server")] {
        pub use server::AsyncServer;
    }
}
