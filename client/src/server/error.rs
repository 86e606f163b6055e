use std::net::SocketAddr;

use thiserror::Error;

use synthctl_shared::{AllocatorError, OptionsError};

use crate::{
    correlator::error::CorrelatorError, node_tree::error::NodeTreeError,
    transport::ConnectError,
};

use super::{boot_status::BootStatus, process::ProcessError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServerError {
    #[error("Server is offline")]
    Offline,

    #[error("Server is already {status:?}")]
    AlreadyRunning { status: BootStatus },

    #[error("Engine refused the login: too many clients")]
    TooManyClients,

    #[error("Handshake with {addr} failed: {reason}")]
    HandshakeFailed { addr: SocketAddr, reason: String },

    #[error("Cannot quit an engine this proxy did not boot; disconnect or force the quit")]
    UnownedServerShutdown,

    #[error("Cannot disconnect from an engine this proxy booted; quit it instead")]
    OwnedServerShutdown,

    #[error("A proxy for {addr} is already registered")]
    AlreadyRegistered { addr: SocketAddr },

    #[error("No {kind} ids left for a block of {count}")]
    AllocationExhausted { kind: &'static str, count: usize },

    #[error("Unknown {kind} {id}")]
    UnknownResource { kind: &'static str, id: i32 },

    #[error("{command} failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Allocator(#[from] AllocatorError),

    #[error(transparent)]
    Correlator(#[from] CorrelatorError),

    #[error(transparent)]
    NodeTree(#[from] NodeTreeError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Connect(#[from] ConnectError),
}
