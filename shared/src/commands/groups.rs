use crate::osc::{argument::OscArgument, message::OscMessage};
use crate::types::NodeId;

use super::{
    add_action::AddAction,
    pattern::{Pattern, ReplyPatterns},
    request::Command,
};

/// One group to create: id, placement and target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupNewItem {
    pub node_id: NodeId,
    pub add_action: AddAction,
    pub target_id: NodeId,
}

impl GroupNewItem {
    pub fn new(node_id: NodeId, add_action: AddAction, target_id: NodeId) -> Self {
        Self {
            node_id,
            add_action,
            target_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupRequest {
    New { items: Vec<GroupNewItem> },
    ParallelNew { items: Vec<GroupNewItem> },
    /// Move each node to the head of each group, as (group, node) pairs
    Head { pairs: Vec<(NodeId, NodeId)> },
    /// Move each node to the tail of each group, as (group, node) pairs
    Tail { pairs: Vec<(NodeId, NodeId)> },
    FreeAll { group_ids: Vec<NodeId> },
    DeepFree { group_ids: Vec<NodeId> },
    QueryTree { group_id: NodeId, include_controls: bool },
}

impl Command for GroupRequest {
    fn address(&self) -> &'static str {
        match self {
            GroupRequest::New { .. } => "/g_new",
            GroupRequest::ParallelNew { .. } => "/p_new",
            GroupRequest::Head { .. } => "/g_head",
            GroupRequest::Tail { .. } => "/g_tail",
            GroupRequest::FreeAll { .. } => "/g_freeAll",
            GroupRequest::DeepFree { .. } => "/g_deepFree",
            GroupRequest::QueryTree { .. } => "/g_queryTree",
        }
    }

    fn to_osc(&self) -> OscMessage {
        let mut arguments = Vec::new();
        match self {
            GroupRequest::New { items } | GroupRequest::ParallelNew { items } => {
                for item in items {
                    arguments.push(OscArgument::Int(item.node_id));
                    arguments.push(OscArgument::Int(item.add_action.as_i32()));
                    arguments.push(OscArgument::Int(item.target_id));
                }
            }
            GroupRequest::Head { pairs } | GroupRequest::Tail { pairs } => {
                for (group_id, node_id) in pairs {
                    arguments.push(OscArgument::Int(*group_id));
                    arguments.push(OscArgument::Int(*node_id));
                }
            }
            GroupRequest::FreeAll { group_ids } | GroupRequest::DeepFree { group_ids } => {
                arguments.extend(group_ids.iter().map(|group_id| OscArgument::Int(*group_id)));
            }
            GroupRequest::QueryTree {
                group_id,
                include_controls,
            } => {
                arguments.push(OscArgument::Int(*group_id));
                arguments.push(OscArgument::Int(i32::from(*include_controls)));
            }
        }
        OscMessage::new(self.address(), arguments)
    }

    fn reply_patterns(&self) -> Option<ReplyPatterns> {
        match self {
            GroupRequest::New { items } | GroupRequest::ParallelNew { items } => items
                .last()
                .map(|item| ReplyPatterns::success(Pattern::new("/n_go").int(item.node_id))),
            GroupRequest::QueryTree {
                group_id,
                include_controls,
            } => Some(ReplyPatterns::with_failure(
                Pattern::new("/g_queryTree.reply")
                    .int(i32::from(*include_controls))
                    .int(*group_id),
                Pattern::new("/fail").str("/g_queryTree"),
            )),
            _ => None,
        }
    }
}
