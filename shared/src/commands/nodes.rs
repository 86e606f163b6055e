use crate::osc::{argument::OscArgument, message::OscMessage};
use crate::types::{BusId, NodeId};

use super::{
    add_action::AddAction,
    controls::Controls,
    pattern::{Pattern, ReplyPatterns},
    request::Command,
};

/// Requests acting on nodes of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum NodeRequest {
    Free { node_ids: Vec<NodeId> },
    /// Pause (`false`) or resume (`true`) each node
    Run { items: Vec<(NodeId, bool)> },
    Set { node_id: NodeId, controls: Controls },
    Query { node_id: NodeId },
    /// Map controls to read from control buses
    MapToControlBus { node_id: NodeId, mappings: Vec<(String, BusId)> },
    /// Map controls to read from audio buses
    MapToAudioBus { node_id: NodeId, mappings: Vec<(String, BusId)> },
    /// Move each first node immediately before each second node
    Before { pairs: Vec<(NodeId, NodeId)> },
    /// Move each first node immediately after each second node
    After { pairs: Vec<(NodeId, NodeId)> },
    Trace { node_ids: Vec<NodeId> },
    /// Set runs of consecutive controls, each starting at a named control
    SetN { node_id: NodeId, items: Vec<(String, Vec<f32>)> },
    /// Set `count` consecutive controls from a named control to one value
    Fill { node_id: NodeId, items: Vec<(String, i32, f32)> },
    /// Place the first node relative to the target and each following node
    /// after the one before it
    Order {
        add_action: AddAction,
        target_id: NodeId,
        node_ids: Vec<NodeId>,
    },
}

impl Command for NodeRequest {
    fn address(&self) -> &'static str {
        match self {
            NodeRequest::Free { .. } => "/n_free",
            NodeRequest::Run { .. } => "/n_run",
            NodeRequest::Set { .. } => "/n_set",
            NodeRequest::Query { .. } => "/n_query",
            NodeRequest::MapToControlBus { .. } => "/n_map",
            NodeRequest::MapToAudioBus { .. } => "/n_mapa",
            NodeRequest::Before { .. } => "/n_before",
            NodeRequest::After { .. } => "/n_after",
            NodeRequest::Trace { .. } => "/n_trace",
            NodeRequest::SetN { .. } => "/n_setn",
            NodeRequest::Fill { .. } => "/n_fill",
            NodeRequest::Order { .. } => "/n_order",
        }
    }

    fn to_osc(&self) -> OscMessage {
        let mut arguments = Vec::new();
        match self {
            NodeRequest::Free { node_ids } | NodeRequest::Trace { node_ids } => {
                arguments.extend(node_ids.iter().map(|node_id| OscArgument::Int(*node_id)));
            }
            NodeRequest::Run { items } => {
                for (node_id, running) in items {
                    arguments.push(OscArgument::Int(*node_id));
                    arguments.push(OscArgument::Int(i32::from(*running)));
                }
            }
            NodeRequest::Set { node_id, controls } => {
                arguments.push(OscArgument::Int(*node_id));
                arguments.extend(controls.to_arguments());
            }
            NodeRequest::Query { node_id } => arguments.push(OscArgument::Int(*node_id)),
            NodeRequest::MapToControlBus { node_id, mappings }
            | NodeRequest::MapToAudioBus { node_id, mappings } => {
                arguments.push(OscArgument::Int(*node_id));
                for (name, bus_id) in mappings {
                    arguments.push(OscArgument::String(name.clone()));
                    arguments.push(OscArgument::Int(*bus_id));
                }
            }
            NodeRequest::Before { pairs } | NodeRequest::After { pairs } => {
                for (node_id, target_id) in pairs {
                    arguments.push(OscArgument::Int(*node_id));
                    arguments.push(OscArgument::Int(*target_id));
                }
            }
            NodeRequest::SetN { node_id, items } => {
                arguments.push(OscArgument::Int(*node_id));
                for (name, values) in items {
                    arguments.push(OscArgument::String(name.clone()));
                    arguments.push(OscArgument::Int(values.len() as i32));
                    arguments.extend(values.iter().map(|value| OscArgument::Float(*value)));
                }
            }
            NodeRequest::Fill { node_id, items } => {
                arguments.push(OscArgument::Int(*node_id));
                for (name, count, value) in items {
                    arguments.push(OscArgument::String(name.clone()));
                    arguments.push(OscArgument::Int(*count));
                    arguments.push(OscArgument::Float(*value));
                }
            }
            NodeRequest::Order {
                add_action,
                target_id,
                node_ids,
            } => {
                arguments.push(OscArgument::Int(add_action.as_i32()));
                arguments.push(OscArgument::Int(*target_id));
                arguments.extend(node_ids.iter().map(|node_id| OscArgument::Int(*node_id)));
            }
        }
        OscMessage::new(self.address(), arguments)
    }

    fn reply_patterns(&self) -> Option<ReplyPatterns> {
        match self {
            NodeRequest::Free { node_ids } => node_ids
                .last()
                .map(|node_id| ReplyPatterns::success(Pattern::new("/n_end").int(*node_id))),
            NodeRequest::Query { node_id } => Some(ReplyPatterns::with_failure(
                Pattern::new("/n_info").int(*node_id),
                Pattern::new("/fail"),
            )),
            _ => None,
        }
    }
}
