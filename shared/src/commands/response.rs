use crate::osc::{argument::OscArgument, message::OscMessage};
use crate::types::{BufferId, BusId, NodeId, SyncId};

use super::{
    arguments::ArgumentCursor, controls::Controls, error::ResponseError,
    node_action::NodeAction, query_tree::QueryTreeGroup,
};

/// `/done`: the command that completed and any extra arguments
#[derive(Debug, Clone, PartialEq)]
pub struct DoneInfo {
    pub command: String,
    pub arguments: Vec<OscArgument>,
}

/// `/fail`: the command that failed and the engine's explanation
#[derive(Debug, Clone, PartialEq)]
pub struct FailInfo {
    pub command: String,
    pub reason: Vec<OscArgument>,
}

impl FailInfo {
    pub fn reason_text(&self) -> String {
        self.reason
            .iter()
            .map(|argument| match argument.as_str() {
                Some(text) => text.to_string(),
                None => argument.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Node notification or `/n_info` query reply
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub action: NodeAction,
    pub node_id: NodeId,
    pub parent_id: Option<NodeId>,
    pub previous_id: Option<NodeId>,
    pub next_id: Option<NodeId>,
    pub is_group: bool,
    pub head_id: Option<NodeId>,
    pub tail_id: Option<NodeId>,
    pub synthdef: Option<String>,
    pub controls: Option<Controls>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSetInfo {
    pub node_id: NodeId,
    pub controls: Controls,
}

/// `/n_setn`: runs of consecutive control values
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSetNInfo {
    pub node_id: NodeId,
    pub items: Vec<(String, Vec<f32>)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferInfoItem {
    pub buffer_id: BufferId,
    pub frame_count: i32,
    pub channel_count: i32,
    pub sample_rate: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferInfo {
    pub items: Vec<BufferInfoItem>,
}

/// `/b_set`: sample values by index
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSetInfo {
    pub buffer_id: BufferId,
    pub items: Vec<(i32, f32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferSetNInfo {
    pub buffer_id: BufferId,
    pub items: Vec<(i32, Vec<f32>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlBusSetInfo {
    pub items: Vec<(BusId, f32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlBusSetNInfo {
    pub items: Vec<(BusId, Vec<f32>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncedInfo {
    pub sync_id: SyncId,
}

/// Engine load snapshot from `/status.reply`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusInfo {
    pub ugen_count: i32,
    pub synth_count: i32,
    pub group_count: i32,
    pub synthdef_count: i32,
    pub average_cpu_usage: f32,
    pub peak_cpu_usage: f32,
    pub target_sample_rate: f64,
    pub actual_sample_rate: f64,
}

/// `/tr` fired by a SendTrig unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerInfo {
    pub node_id: NodeId,
    pub trigger_id: i32,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub program_name: String,
    pub major: i32,
    pub minor: i32,
    pub patch: String,
    pub branch: String,
    pub commit: String,
}

/// Every reply the engine sends, decoded
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Done(DoneInfo),
    Fail(FailInfo),
    Node(NodeInfo),
    NodeSet(NodeSetInfo),
    NodeSetN(NodeSetNInfo),
    BufferInfo(BufferInfo),
    BufferSet(BufferSetInfo),
    BufferSetN(BufferSetNInfo),
    ControlBusSet(ControlBusSetInfo),
    ControlBusSetN(ControlBusSetNInfo),
    Synced(SyncedInfo),
    Status(StatusInfo),
    QueryTree(QueryTreeGroup),
    Trigger(TriggerInfo),
    SynthDefRemoved { name: String },
    Version(VersionInfo),
}

impl Response {
    pub fn from_message(message: &OscMessage) -> Result<Response, ResponseError> {
        let mut cursor = ArgumentCursor::new(message);
        if let Some(action) = NodeAction::from_address(&message.address) {
            return Ok(Response::Node(decode_node_info(action, &mut cursor)?));
        }
        let response = match message.address.as_str() {
            "/done" => Response::Done(DoneInfo {
                command: cursor.string()?,
                arguments: cursor.rest(),
            }),
            "/fail" => Response::Fail(FailInfo {
                command: cursor.string()?,
                reason: cursor.rest(),
            }),
            "/n_set" => {
                let node_id = cursor.int()?;
                let pair_count = cursor.expect_items(2)?;
                let mut controls = Controls::new();
                for _ in 0..pair_count {
                    let name = cursor.control_name()?;
                    let value = cursor.control_value()?;
                    controls.set(name, value);
                }
                Response::NodeSet(NodeSetInfo { node_id, controls })
            }
            "/n_setn" => {
                let node_id = cursor.int()?;
                let items = decode_runs(&mut cursor, ArgumentCursor::control_name)?;
                Response::NodeSetN(NodeSetNInfo { node_id, items })
            }
            "/b_set" => {
                let buffer_id = cursor.int()?;
                let item_count = cursor.expect_items(2)?;
                let mut items = Vec::with_capacity(item_count);
                for _ in 0..item_count {
                    items.push((cursor.int()?, cursor.float()?));
                }
                Response::BufferSet(BufferSetInfo { buffer_id, items })
            }
            "/b_setn" => {
                let buffer_id = cursor.int()?;
                let items = decode_runs(&mut cursor, ArgumentCursor::int)?;
                Response::BufferSetN(BufferSetNInfo { buffer_id, items })
            }
            "/c_setn" => Response::ControlBusSetN(ControlBusSetNInfo {
                items: decode_runs(&mut cursor, ArgumentCursor::int)?,
            }),
            "/b_info" => {
                let item_count = cursor.expect_items(4)?;
                let mut items = Vec::with_capacity(item_count);
                for _ in 0..item_count {
                    items.push(BufferInfoItem {
                        buffer_id: cursor.int()?,
                        frame_count: cursor.int()?,
                        channel_count: cursor.int()?,
                        sample_rate: cursor.float()?,
                    });
                }
                Response::BufferInfo(BufferInfo { items })
            }
            "/c_set" => {
                let item_count = cursor.expect_items(2)?;
                let mut items = Vec::with_capacity(item_count);
                for _ in 0..item_count {
                    items.push((cursor.int()?, cursor.float()?));
                }
                Response::ControlBusSet(ControlBusSetInfo { items })
            }
            "/synced" => Response::Synced(SyncedInfo {
                sync_id: cursor.int()?,
            }),
            "/status.reply" => {
                // leading argument is unused
                cursor.next()?;
                Response::Status(StatusInfo {
                    ugen_count: cursor.int()?,
                    synth_count: cursor.int()?,
                    group_count: cursor.int()?,
                    synthdef_count: cursor.int()?,
                    average_cpu_usage: cursor.float()?,
                    peak_cpu_usage: cursor.float()?,
                    target_sample_rate: cursor.double()?,
                    actual_sample_rate: cursor.double()?,
                })
            }
            "/g_queryTree.reply" => Response::QueryTree(QueryTreeGroup::decode(&mut cursor)?),
            "/tr" => Response::Trigger(TriggerInfo {
                node_id: cursor.int()?,
                trigger_id: cursor.int()?,
                value: cursor.float()?,
            }),
            "/d_removed" => Response::SynthDefRemoved {
                name: cursor.string()?,
            },
            "/version.reply" => Response::Version(VersionInfo {
                program_name: cursor.string()?,
                major: cursor.int()?,
                minor: cursor.int()?,
                patch: cursor.string()?,
                branch: cursor.string()?,
                commit: cursor.string()?,
            }),
            _ => {
                return Err(ResponseError::UnknownAddress {
                    address: message.address.clone(),
                })
            }
        };
        Ok(response)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Response::Fail(_))
    }
}

/// Reads `key, count, value * count` runs until the arguments run out.
fn decode_runs<'a, K>(
    cursor: &mut ArgumentCursor<'a>,
    mut key: impl FnMut(&mut ArgumentCursor<'a>) -> Result<K, ResponseError>,
) -> Result<Vec<(K, Vec<f32>)>, ResponseError> {
    let mut runs = Vec::new();
    while cursor.has_more() {
        let start = key(cursor)?;
        let count = cursor.int()?.max(0) as usize;
        let mut values = Vec::with_capacity(count.min(cursor.remaining()));
        for _ in 0..count {
            values.push(cursor.float()?);
        }
        runs.push((start, values));
    }
    Ok(runs)
}

fn decode_node_info(
    action: NodeAction,
    cursor: &mut ArgumentCursor,
) -> Result<NodeInfo, ResponseError> {
    let node_id = cursor.int()?;
    let parent_id = cursor.optional_id()?;
    let previous_id = cursor.optional_id()?;
    let next_id = cursor.optional_id()?;
    let is_group = cursor.int()? == 1;
    let mut info = NodeInfo {
        action,
        node_id,
        parent_id,
        previous_id,
        next_id,
        is_group,
        head_id: None,
        tail_id: None,
        synthdef: None,
        controls: None,
    };
    if is_group {
        if cursor.has_more() {
            info.head_id = cursor.optional_id()?;
            info.tail_id = cursor.optional_id()?;
        }
    } else if cursor.has_more() {
        info.synthdef = Some(cursor.string()?);
        let control_count = cursor.int()?;
        let mut controls = Controls::new();
        for _ in 0..control_count.max(0) {
            let name = cursor.control_name()?;
            let value = cursor.control_value()?;
            controls.set(name, value);
        }
        info.controls = Some(controls);
    }
    Ok(info)
}
