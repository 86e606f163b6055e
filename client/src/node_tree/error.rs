use thiserror::Error;

use synthctl_shared::{AddAction, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeTreeError {
    #[error("Node {node_id} is not in the tree")]
    NodeNotFound { node_id: NodeId },

    #[error("Target node {target_id} is not in the tree")]
    TargetNotFound { target_id: NodeId },

    #[error("Parent group {parent_id} of node {node_id} is not in the tree")]
    ParentNotFound { node_id: NodeId, parent_id: NodeId },

    #[error("Node {node_id} is a synth, not a group")]
    NotAGroup { node_id: NodeId },

    #[error("Node {node_id} is already registered")]
    AlreadyRegistered { node_id: NodeId },

    #[error("Node {node_id} was freed and the engine has not reported its end yet")]
    AwaitingRemoval { node_id: NodeId },

    #[error("Add action {add_action:?} cannot be used to {operation}")]
    InvalidAddAction {
        add_action: AddAction,
        operation: &'static str,
    },

    #[error("Moving node {node_id} relative to {target_id} would place it inside itself")]
    WouldCreateCycle { node_id: NodeId, target_id: NodeId },

    #[error("The root node cannot be {operation}")]
    RootNodeImmutable { operation: &'static str },
}
