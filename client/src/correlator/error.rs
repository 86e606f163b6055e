use std::time::Duration;

use thiserror::Error;

use synthctl_shared::ResponseError;

use crate::transport::SendError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorrelatorError {
    #[error("Not connected to an engine")]
    NotConnected,

    #[error("Timed out after {timeout:?} waiting for {pattern}")]
    Timeout { pattern: String, timeout: Duration },

    #[error("Datagram of {size} bytes exceeds the {limit} byte limit")]
    OversizeBundle { size: usize, limit: usize },

    #[error("Reply waiter was dropped before {pattern} arrived")]
    Cancelled { pattern: String },

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}
