use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use synthctl_shared::{OscMessage, OscPacket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEntry {
    pub timestamp: Instant,
    pub direction: CaptureDirection,
    pub packet: OscPacket,
}

pub(crate) type CaptureLog = Arc<Mutex<Vec<CaptureEntry>>>;

/// Records every packet sent and received while it is alive
///
/// Obtained from [`Correlator::capture`](crate::Correlator::capture). The
/// correlator stops feeding it once the handle is dropped.
pub struct Capture {
    log: CaptureLog,
}

impl Capture {
    pub(crate) fn new(log: CaptureLog) -> Self {
        Self { log }
    }

    pub fn entries(&self) -> Vec<CaptureEntry> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Flattened messages in one direction, in order.
    pub fn messages(&self, direction: CaptureDirection) -> Vec<OscMessage> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.direction == direction)
            .flat_map(|entry| entry.packet.into_messages())
            .collect()
    }

    pub fn sent_messages(&self) -> Vec<OscMessage> {
        self.messages(CaptureDirection::Sent)
    }

    pub fn received_messages(&self) -> Vec<OscMessage> {
        self.messages(CaptureDirection::Received)
    }

    pub fn clear(&self) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
