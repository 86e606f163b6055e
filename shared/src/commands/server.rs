use crate::osc::{argument::OscArgument, message::OscMessage};
use crate::types::SyncId;

use super::{
    pattern::{Pattern, ReplyPatterns},
    request::Command,
};

/// Requests addressed to the engine as a whole
#[derive(Debug, Clone, PartialEq)]
pub enum ServerRequest {
    /// Subscribe to (or unsubscribe from) node notifications
    Notify { enabled: bool },
    Status,
    Sync { sync_id: SyncId },
    Quit,
    Version,
    /// 0 off, 1 parsed, 2 hex, 3 both
    DumpOsc { level: i32 },
    ClearSchedule,
}

impl Command for ServerRequest {
    fn address(&self) -> &'static str {
        match self {
            ServerRequest::Notify { .. } => "/notify",
            ServerRequest::Status => "/status",
            ServerRequest::Sync { .. } => "/sync",
            ServerRequest::Quit => "/quit",
            ServerRequest::Version => "/version",
            ServerRequest::DumpOsc { .. } => "/dumpOSC",
            ServerRequest::ClearSchedule => "/clearSched",
        }
    }

    fn to_osc(&self) -> OscMessage {
        let arguments = match self {
            ServerRequest::Notify { enabled } => vec![OscArgument::Int(i32::from(*enabled))],
            ServerRequest::Sync { sync_id } => vec![OscArgument::Int(*sync_id)],
            ServerRequest::DumpOsc { level } => vec![OscArgument::Int(*level)],
            ServerRequest::Status
            | ServerRequest::Quit
            | ServerRequest::Version
            | ServerRequest::ClearSchedule => Vec::new(),
        };
        OscMessage::new(self.address(), arguments)
    }

    fn reply_patterns(&self) -> Option<ReplyPatterns> {
        match self {
            ServerRequest::Notify { .. } => Some(ReplyPatterns::with_failure(
                Pattern::new("/done").str("/notify"),
                Pattern::new("/fail").str("/notify"),
            )),
            ServerRequest::Status => Some(ReplyPatterns::success(Pattern::new("/status.reply"))),
            ServerRequest::Sync { sync_id } => {
                Some(ReplyPatterns::success(Pattern::new("/synced").int(*sync_id)))
            }
            ServerRequest::Quit => Some(ReplyPatterns::success(Pattern::new("/done").str("/quit"))),
            ServerRequest::Version => Some(ReplyPatterns::success(Pattern::new("/version.reply"))),
            ServerRequest::DumpOsc { .. } | ServerRequest::ClearSchedule => None,
        }
    }
}
