use crate::osc::{argument::OscArgument, message::OscMessage};

use super::{
    pattern::{Pattern, ReplyPatterns},
    request::{push_completion, Command, Requestable},
};

/// Synth definition management. Compiled definitions are opaque bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthDefRequest {
    Receive {
        payload: Vec<u8>,
        completion: Option<Box<Requestable>>,
    },
    Load {
        path: String,
        completion: Option<Box<Requestable>>,
    },
    LoadDirectory {
        path: String,
        completion: Option<Box<Requestable>>,
    },
    Free { names: Vec<String> },
    FreeAll,
}

impl SynthDefRequest {
    pub fn completion(&self) -> Option<&Requestable> {
        match self {
            SynthDefRequest::Receive { completion, .. }
            | SynthDefRequest::Load { completion, .. }
            | SynthDefRequest::LoadDirectory { completion, .. } => completion.as_deref(),
            SynthDefRequest::Free { .. } | SynthDefRequest::FreeAll => None,
        }
    }

    pub fn without_completion(&self) -> Self {
        let mut request = self.clone();
        match &mut request {
            SynthDefRequest::Receive { completion, .. }
            | SynthDefRequest::Load { completion, .. }
            | SynthDefRequest::LoadDirectory { completion, .. } => *completion = None,
            SynthDefRequest::Free { .. } | SynthDefRequest::FreeAll => {}
        }
        request
    }
}

impl Command for SynthDefRequest {
    fn address(&self) -> &'static str {
        match self {
            SynthDefRequest::Receive { .. } => "/d_recv",
            SynthDefRequest::Load { .. } => "/d_load",
            SynthDefRequest::LoadDirectory { .. } => "/d_loadDir",
            SynthDefRequest::Free { .. } => "/d_free",
            SynthDefRequest::FreeAll => "/d_freeAll",
        }
    }

    fn to_osc(&self) -> OscMessage {
        let mut arguments = Vec::new();
        match self {
            SynthDefRequest::Receive {
                payload,
                completion,
            } => {
                arguments.push(OscArgument::Blob(payload.clone()));
                push_completion(&mut arguments, completion);
            }
            SynthDefRequest::Load { path, completion }
            | SynthDefRequest::LoadDirectory { path, completion } => {
                arguments.push(OscArgument::String(path.clone()));
                push_completion(&mut arguments, completion);
            }
            SynthDefRequest::Free { names } => {
                arguments.extend(names.iter().map(|name| OscArgument::String(name.clone())));
            }
            SynthDefRequest::FreeAll => {}
        }
        OscMessage::new(self.address(), arguments)
    }

    fn reply_patterns(&self) -> Option<ReplyPatterns> {
        match self {
            SynthDefRequest::Free { .. } | SynthDefRequest::FreeAll => None,
            _ => Some(ReplyPatterns::success(
                Pattern::new("/done").str(self.address()),
            )),
        }
    }
}
