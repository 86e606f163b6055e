use crate::osc::{argument::OscArgument, message::OscMessage};
use crate::types::BufferId;

use super::{
    pattern::{Pattern, ReplyPatterns},
    request::{push_completion, Command, Requestable},
};

#[derive(Debug, Clone, PartialEq)]
pub enum BufferRequest {
    Allocate {
        buffer_id: BufferId,
        frame_count: i32,
        channel_count: i32,
        completion: Option<Box<Requestable>>,
    },
    Free {
        buffer_id: BufferId,
        completion: Option<Box<Requestable>>,
    },
    Zero {
        buffer_id: BufferId,
        completion: Option<Box<Requestable>>,
    },
    Query { buffer_ids: Vec<BufferId> },
    /// Set individual samples by index
    Set {
        buffer_id: BufferId,
        items: Vec<(i32, f32)>,
    },
    /// Set runs of consecutive samples, each starting at an index
    SetN {
        buffer_id: BufferId,
        items: Vec<(i32, Vec<f32>)>,
    },
    /// Read samples back as a `/b_set` reply
    Get {
        buffer_id: BufferId,
        indices: Vec<i32>,
    },
    /// Read `(start, count)` runs back as a `/b_setn` reply
    GetN {
        buffer_id: BufferId,
        items: Vec<(i32, i32)>,
    },
    /// Set `count` samples from each start index to one value
    Fill {
        buffer_id: BufferId,
        items: Vec<(i32, i32, f32)>,
    },
    /// Run a wave fill command such as `sine1` or `cheby`
    Generate {
        buffer_id: BufferId,
        command: String,
        flags: GenerateFlags,
        values: Vec<f32>,
    },
}

/// Flag word of `/b_gen` wave fill commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerateFlags {
    pub normalize: bool,
    pub wavetable: bool,
    pub clear_first: bool,
}

impl GenerateFlags {
    pub fn as_i32(&self) -> i32 {
        i32::from(self.normalize) | i32::from(self.wavetable) << 1 | i32::from(self.clear_first) << 2
    }
}

impl BufferRequest {
    pub fn completion(&self) -> Option<&Requestable> {
        match self {
            BufferRequest::Allocate { completion, .. }
            | BufferRequest::Free { completion, .. }
            | BufferRequest::Zero { completion, .. } => completion.as_deref(),
            _ => None,
        }
    }

    pub fn without_completion(&self) -> Self {
        let mut request = self.clone();
        match &mut request {
            BufferRequest::Allocate { completion, .. }
            | BufferRequest::Free { completion, .. }
            | BufferRequest::Zero { completion, .. } => *completion = None,
            _ => {}
        }
        request
    }
}

impl Command for BufferRequest {
    fn address(&self) -> &'static str {
        match self {
            BufferRequest::Allocate { .. } => "/b_alloc",
            BufferRequest::Free { .. } => "/b_free",
            BufferRequest::Zero { .. } => "/b_zero",
            BufferRequest::Query { .. } => "/b_query",
            BufferRequest::Set { .. } => "/b_set",
            BufferRequest::SetN { .. } => "/b_setn",
            BufferRequest::Get { .. } => "/b_get",
            BufferRequest::GetN { .. } => "/b_getn",
            BufferRequest::Fill { .. } => "/b_fill",
            BufferRequest::Generate { .. } => "/b_gen",
        }
    }

    fn to_osc(&self) -> OscMessage {
        let mut arguments = Vec::new();
        match self {
            BufferRequest::Allocate {
                buffer_id,
                frame_count,
                channel_count,
                completion,
            } => {
                arguments.push(OscArgument::Int(*buffer_id));
                arguments.push(OscArgument::Int(*frame_count));
                arguments.push(OscArgument::Int(*channel_count));
                push_completion(&mut arguments, completion);
            }
            BufferRequest::Free {
                buffer_id,
                completion,
            }
            | BufferRequest::Zero {
                buffer_id,
                completion,
            } => {
                arguments.push(OscArgument::Int(*buffer_id));
                push_completion(&mut arguments, completion);
            }
            BufferRequest::Query { buffer_ids } => {
                arguments.extend(buffer_ids.iter().map(|buffer_id| OscArgument::Int(*buffer_id)));
            }
            BufferRequest::Set { buffer_id, items } => {
                arguments.push(OscArgument::Int(*buffer_id));
                for (index, value) in items {
                    arguments.push(OscArgument::Int(*index));
                    arguments.push(OscArgument::Float(*value));
                }
            }
            BufferRequest::SetN { buffer_id, items } => {
                arguments.push(OscArgument::Int(*buffer_id));
                for (start, values) in items {
                    arguments.push(OscArgument::Int(*start));
                    arguments.push(OscArgument::Int(values.len() as i32));
                    arguments.extend(values.iter().map(|value| OscArgument::Float(*value)));
                }
            }
            BufferRequest::Get { buffer_id, indices } => {
                arguments.push(OscArgument::Int(*buffer_id));
                arguments.extend(indices.iter().map(|index| OscArgument::Int(*index)));
            }
            BufferRequest::GetN { buffer_id, items } => {
                arguments.push(OscArgument::Int(*buffer_id));
                for (start, count) in items {
                    arguments.push(OscArgument::Int(*start));
                    arguments.push(OscArgument::Int(*count));
                }
            }
            BufferRequest::Fill { buffer_id, items } => {
                arguments.push(OscArgument::Int(*buffer_id));
                for (start, count, value) in items {
                    arguments.push(OscArgument::Int(*start));
                    arguments.push(OscArgument::Int(*count));
                    arguments.push(OscArgument::Float(*value));
                }
            }
            BufferRequest::Generate {
                buffer_id,
                command,
                flags,
                values,
            } => {
                arguments.push(OscArgument::Int(*buffer_id));
                arguments.push(OscArgument::String(command.clone()));
                arguments.push(OscArgument::Int(flags.as_i32()));
                arguments.extend(values.iter().map(|value| OscArgument::Float(*value)));
            }
        }
        OscMessage::new(self.address(), arguments)
    }

    fn reply_patterns(&self) -> Option<ReplyPatterns> {
        match self {
            BufferRequest::Allocate { buffer_id, .. } => Some(ReplyPatterns::with_failure(
                Pattern::new("/done").str("/b_alloc").int(*buffer_id),
                Pattern::new("/fail").str("/b_alloc"),
            )),
            BufferRequest::Free { buffer_id, .. } => Some(ReplyPatterns::with_failure(
                Pattern::new("/done").str("/b_free").int(*buffer_id),
                Pattern::new("/fail").str("/b_free"),
            )),
            BufferRequest::Zero { buffer_id, .. } => Some(ReplyPatterns::with_failure(
                Pattern::new("/done").str("/b_zero").int(*buffer_id),
                Pattern::new("/fail").str("/b_zero"),
            )),
            BufferRequest::Query { buffer_ids } => buffer_ids
                .last()
                .map(|buffer_id| ReplyPatterns::success(Pattern::new("/b_info").int(*buffer_id))),
            BufferRequest::Get { buffer_id, .. } => Some(ReplyPatterns::with_failure(
                Pattern::new("/b_set").int(*buffer_id),
                Pattern::new("/fail").str("/b_get"),
            )),
            BufferRequest::GetN { buffer_id, .. } => Some(ReplyPatterns::with_failure(
                Pattern::new("/b_setn").int(*buffer_id),
                Pattern::new("/fail").str("/b_getn"),
            )),
            BufferRequest::Generate { buffer_id, .. } => Some(ReplyPatterns::with_failure(
                Pattern::new("/done").str("/b_gen").int(*buffer_id),
                Pattern::new("/fail").str("/b_gen"),
            )),
            BufferRequest::Set { .. } | BufferRequest::SetN { .. } | BufferRequest::Fill { .. } => None,
        }
    }
}
