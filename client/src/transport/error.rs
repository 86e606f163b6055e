use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not open a socket to {addr}: {reason}")]
pub struct ConnectError {
    pub addr: SocketAddr,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to send a {len} byte datagram: {reason}")]
pub struct SendError {
    pub len: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to receive a datagram: {reason}")]
pub struct RecvError {
    pub reason: String,
}
