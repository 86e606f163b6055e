use synthctl_shared::{Controls, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Children in execution order
    Group { children: Vec<NodeId> },
    Synth {
        /// Unknown for synths created by other clients and reported without it
        synthdef: Option<String>,
        controls: Controls,
    },
}

/// One node of the mirrored tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) node_id: NodeId,
    pub(crate) parent_id: Option<NodeId>,
    pub(crate) kind: NodeKind,
    pub(crate) is_paused: bool,
    pub(crate) is_permanent: bool,
}

impl Node {
    pub(crate) fn group(node_id: NodeId, is_permanent: bool) -> Self {
        Self::new(node_id, NodeKind::Group { children: Vec::new() }, is_permanent)
    }

    pub(crate) fn synth(
        node_id: NodeId,
        synthdef: Option<String>,
        controls: Controls,
        is_permanent: bool,
    ) -> Self {
        Self::new(node_id, NodeKind::Synth { synthdef, controls }, is_permanent)
    }

    fn new(node_id: NodeId, kind: NodeKind, is_permanent: bool) -> Self {
        Self {
            node_id,
            parent_id: None,
            kind,
            is_paused: false,
            is_permanent,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// `None` only for the root group
    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group { .. })
    }

    pub fn is_synth(&self) -> bool {
        !self.is_group()
    }

    /// Empty for synths.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Group { children } => children,
            NodeKind::Synth { .. } => &[],
        }
    }

    pub fn synthdef(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Synth { synthdef, .. } => synthdef.as_deref(),
            NodeKind::Group { .. } => None,
        }
    }

    pub fn controls(&self) -> Option<&Controls> {
        match &self.kind {
            NodeKind::Synth { controls, .. } => Some(controls),
            NodeKind::Group { .. } => None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Whether the id came from the permanent pool and goes back to it on
    /// removal
    pub fn is_permanent(&self) -> bool {
        self.is_permanent
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.kind {
            NodeKind::Group { children } => Some(children),
            NodeKind::Synth { .. } => None,
        }
    }
}
