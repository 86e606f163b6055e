use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use log::{debug, trace};

use synthctl_shared::{
    AddAction, Controls, GroupNewItem, GroupRequest, NodeAction, NodeId, NodeIdAllocator,
    NodeInfo, NodeRequest, QueryTreeGroup, QueryTreeNode, QueryTreeSynth, Request, Requestable,
    SynthRequest, NODE_ID_SLOT_BITS, ROOT_NODE_ID,
};

use super::{
    error::NodeTreeError,
    node::{Node, NodeKind},
};

/// Where a node lands when it is spliced into a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Head(NodeId),
    Tail(NodeId),
    Before(NodeId),
    After(NodeId),
}

/// Local mirror of the engine's node tree
///
/// Nodes live in an arena keyed by id. Every node except the root knows its
/// parent, and every group keeps its children in execution order. Local
/// operations mutate the mirror straight away and hand back the request that
/// makes the engine do the same; the engine's `/n_go`, `/n_end`, `/n_on`,
/// `/n_off` and `/n_move` notifications are folded in through
/// [`NodeTree::handle_node_info`].
///
/// Ids freed locally stay tombstoned until their `/n_end` arrives, so a late
/// `/n_go` for them cannot bring them back. A tombstoned id cannot be
/// registered again, and a permanent id only returns to the allocator once
/// its tombstone is consumed. Local moves are counted per
/// node and their `/n_move` echoes only confirm them, since replaying an echo
/// after later local edits would put the node back where it was.
pub struct NodeTree {
    nodes: HashMap<NodeId, Node>,
    tombstones: HashSet<NodeId>,
    pending_moves: HashMap<NodeId, u32>,
    allocator: Arc<NodeIdAllocator>,
}

impl NodeTree {
    pub fn new(allocator: Arc<NodeIdAllocator>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_NODE_ID, Node::group(ROOT_NODE_ID, false));
        Self {
            nodes,
            tombstones: HashSet::new(),
            pending_moves: HashMap::new(),
            allocator,
        }
    }

    pub fn allocator(&self) -> &Arc<NodeIdAllocator> {
        &self.allocator
    }

    // Queries

    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn children(&self, node_id: NodeId) -> Option<&[NodeId]> {
        self.nodes.get(&node_id).map(Node::children)
    }

    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(&node_id).and_then(Node::parent_id)
    }

    /// Number of mirrored nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root is left.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn is_tombstoned(&self, node_id: NodeId) -> bool {
        self.tombstones.contains(&node_id)
    }

    /// Local moves whose `/n_move` has not come back yet.
    pub fn pending_move_count(&self) -> usize {
        self.pending_moves.values().map(|count| *count as usize).sum()
    }

    /// Drops every outstanding move expectation. Once the engine has
    /// caught up, echoes still missing belong to moves it rejected.
    pub fn forget_pending_moves(&mut self) {
        if !self.pending_moves.is_empty() {
            debug!("Forgetting {} unconfirmed moves", self.pending_move_count());
            self.pending_moves.clear();
        }
    }

    /// `node_id` followed by everything below it, depth first in execution
    /// order. Empty if the node is unknown.
    pub fn descendants(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut node_ids = Vec::new();
        let mut stack = vec![node_id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            node_ids.push(current);
            stack.extend(node.children().iter().rev().copied());
        }
        node_ids
    }

    /// Whether `node_id` is `ancestor_id` or lies somewhere below it.
    pub fn is_within(&self, node_id: NodeId, ancestor_id: NodeId) -> bool {
        let mut current = Some(node_id);
        while let Some(id) = current {
            if id == ancestor_id {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    // Local operations

    /// Reserves an id, splices a new group in place and returns the
    /// `/g_new` that creates it on the engine.
    pub fn add_group(
        &mut self,
        target_id: NodeId,
        add_action: AddAction,
        permanent: bool,
    ) -> Result<(NodeId, Request), NodeTreeError> {
        self.resolve_placement(add_action, target_id)?;
        let node_id = self.reserve_node_id(permanent);
        self.insert_reserved(Node::group(node_id, permanent), add_action, target_id)?;
        let request = GroupRequest::New {
            items: vec![GroupNewItem::new(node_id, add_action, target_id)],
        };
        Ok((node_id, request.into()))
    }

    /// Reserves an id, splices a new synth in place and returns the `/s_new`
    /// that creates it on the engine.
    pub fn add_synth(
        &mut self,
        target_id: NodeId,
        add_action: AddAction,
        synthdef: &str,
        controls: Controls,
        permanent: bool,
    ) -> Result<(NodeId, Request), NodeTreeError> {
        self.resolve_placement(add_action, target_id)?;
        let node_id = self.reserve_node_id(permanent);
        let node = Node::synth(
            node_id,
            Some(synthdef.to_string()),
            controls.clone(),
            permanent,
        );
        self.insert_reserved(node, add_action, target_id)?;
        let request = SynthRequest::New {
            synthdef: synthdef.to_string(),
            node_id,
            add_action,
            target_id,
            controls,
        };
        Ok((node_id, request.into()))
    }

    /// Mirrors one of the engine's default groups at the tail of the root
    /// and keeps its id out of the permanent pool.
    pub fn add_default_group(&mut self, node_id: NodeId) -> Result<(), NodeTreeError> {
        self.insert(Node::group(node_id, false), AddAction::AddToTail, ROOT_NODE_ID)?;
        self.allocator.claim_permanent_node_id(node_id);
        Ok(())
    }

    /// Removes a node and everything below it. Returns every removed id,
    /// the node itself first, and the `/n_free` to send.
    pub fn free(&mut self, node_id: NodeId) -> Result<(Vec<NodeId>, Request), NodeTreeError> {
        if node_id == ROOT_NODE_ID {
            return Err(NodeTreeError::RootNodeImmutable { operation: "freed" });
        }
        if !self.contains(node_id) {
            return Err(NodeTreeError::NodeNotFound { node_id });
        }
        let removed = self.remove_subtree(node_id, true);
        let request = NodeRequest::Free {
            node_ids: vec![node_id],
        };
        Ok((removed, request.into()))
    }

    /// Moves an existing node relative to a target. `Replace` is rejected.
    pub fn move_node(
        &mut self,
        node_id: NodeId,
        add_action: AddAction,
        target_id: NodeId,
    ) -> Result<Request, NodeTreeError> {
        if node_id == ROOT_NODE_ID {
            return Err(NodeTreeError::RootNodeImmutable { operation: "moved" });
        }
        if !self.contains(node_id) {
            return Err(NodeTreeError::NodeNotFound { node_id });
        }
        let request: Request = match add_action {
            AddAction::AddToHead => GroupRequest::Head {
                pairs: vec![(target_id, node_id)],
            }
            .into(),
            AddAction::AddToTail => GroupRequest::Tail {
                pairs: vec![(target_id, node_id)],
            }
            .into(),
            AddAction::AddBefore => NodeRequest::Before {
                pairs: vec![(node_id, target_id)],
            }
            .into(),
            AddAction::AddAfter => NodeRequest::After {
                pairs: vec![(node_id, target_id)],
            }
            .into(),
            AddAction::Replace => {
                return Err(NodeTreeError::InvalidAddAction {
                    add_action,
                    operation: "move a node",
                })
            }
        };
        let position = self.resolve_placement(add_action, target_id)?;
        let parent_id = self.parent_of_position(position)?;
        if target_id == node_id || self.is_within(parent_id, node_id) {
            return Err(NodeTreeError::WouldCreateCycle { node_id, target_id });
        }
        self.reparent(node_id, position)?;
        *self.pending_moves.entry(node_id).or_default() += 1;
        Ok(request)
    }

    pub fn set_paused(&mut self, node_id: NodeId, paused: bool) -> Result<Request, NodeTreeError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(NodeTreeError::NodeNotFound { node_id })?;
        node.is_paused = paused;
        Ok(NodeRequest::Run {
            items: vec![(node_id, !paused)],
        }
        .into())
    }

    /// Merges `controls` into a synth, or into every synth below a group.
    pub fn set_controls(
        &mut self,
        node_id: NodeId,
        controls: &Controls,
    ) -> Result<Request, NodeTreeError> {
        self.merge_controls(node_id, controls)?;
        Ok(NodeRequest::Set {
            node_id,
            controls: controls.clone(),
        }
        .into())
    }

    /// Drops every node but the root and forgets all tombstones. Returns the
    /// removed ids.
    pub fn clear(&mut self) -> Vec<NodeId> {
        let top_level = self.children(ROOT_NODE_ID).map(<[NodeId]>::to_vec).unwrap_or_default();
        let mut removed = Vec::new();
        for node_id in top_level {
            removed.extend(self.remove_subtree(node_id, false));
        }
        for node_id in std::mem::take(&mut self.tombstones) {
            self.release_permanent_id(node_id);
        }
        self.pending_moves.clear();
        removed
    }

    // Outgoing requests

    /// Applies the optimistic effect of everything in `requestable`,
    /// completion messages included, in execution order.
    pub fn apply_local(&mut self, requestable: &Requestable) -> Result<(), NodeTreeError> {
        for request in requestable.linearize() {
            self.apply_request(&request)?;
        }
        Ok(())
    }

    /// Applies the optimistic effect of one request. Requests that do not
    /// touch the tree are ignored.
    pub fn apply_request(&mut self, request: &Request) -> Result<(), NodeTreeError> {
        match request {
            Request::Group(GroupRequest::New { items })
            | Request::Group(GroupRequest::ParallelNew { items }) => {
                for item in items {
                    let permanent = self.owns_permanent_id(item.node_id);
                    self.insert(
                        Node::group(item.node_id, permanent),
                        item.add_action,
                        item.target_id,
                    )?;
                }
            }
            Request::Group(GroupRequest::Head { pairs }) => {
                for &(group_id, node_id) in pairs {
                    self.move_node(node_id, AddAction::AddToHead, group_id)?;
                }
            }
            Request::Group(GroupRequest::Tail { pairs }) => {
                for &(group_id, node_id) in pairs {
                    self.move_node(node_id, AddAction::AddToTail, group_id)?;
                }
            }
            Request::Group(GroupRequest::FreeAll { group_ids }) => {
                for &group_id in group_ids {
                    let children = self
                        .children(group_id)
                        .ok_or(NodeTreeError::NodeNotFound { node_id: group_id })?
                        .to_vec();
                    for child_id in children {
                        self.remove_subtree(child_id, true);
                    }
                }
            }
            Request::Group(GroupRequest::DeepFree { group_ids }) => {
                for &group_id in group_ids {
                    if !self.contains(group_id) {
                        return Err(NodeTreeError::NodeNotFound { node_id: group_id });
                    }
                    let synth_ids: Vec<NodeId> = self
                        .descendants(group_id)
                        .into_iter()
                        .filter(|node_id| self.nodes.get(node_id).is_some_and(Node::is_synth))
                        .collect();
                    for synth_id in synth_ids {
                        self.remove_subtree(synth_id, true);
                    }
                }
            }
            Request::Synth(SynthRequest::New {
                synthdef,
                node_id,
                add_action,
                target_id,
                controls,
            }) => {
                let permanent = self.owns_permanent_id(*node_id);
                let node = Node::synth(*node_id, Some(synthdef.clone()), controls.clone(), permanent);
                self.insert(node, *add_action, *target_id)?;
            }
            Request::Node(NodeRequest::Free { node_ids }) => {
                for &node_id in node_ids {
                    self.free(node_id)?;
                }
            }
            Request::Node(NodeRequest::Run { items }) => {
                for &(node_id, running) in items {
                    self.set_paused(node_id, !running)?;
                }
            }
            Request::Node(NodeRequest::Set { node_id, controls }) => {
                self.merge_controls(*node_id, controls)?;
            }
            Request::Node(NodeRequest::Before { pairs }) => {
                for &(node_id, target_id) in pairs {
                    self.move_node(node_id, AddAction::AddBefore, target_id)?;
                }
            }
            Request::Node(NodeRequest::After { pairs }) => {
                for &(node_id, target_id) in pairs {
                    self.move_node(node_id, AddAction::AddAfter, target_id)?;
                }
            }
            Request::Node(NodeRequest::Order {
                add_action,
                target_id,
                node_ids,
            }) => {
                let mut anchor = (*add_action, *target_id);
                for &node_id in node_ids {
                    if node_id == anchor.1 {
                        continue;
                    }
                    self.move_node(node_id, anchor.0, anchor.1)?;
                    anchor = (AddAction::AddAfter, node_id);
                }
            }
            _ => {}
        }
        Ok(())
    }

    // Engine notifications

    /// Folds one `/n_*` notification into the mirror.
    pub fn handle_node_info(&mut self, info: &NodeInfo) -> Result<(), NodeTreeError> {
        let node_id = info.node_id;
        match info.action {
            NodeAction::Created => {
                if self.tombstones.contains(&node_id) {
                    debug!("Discarding stale /n_go for freed node {}", node_id);
                    return Ok(());
                }
                if self.contains(node_id) {
                    trace!("Node {} confirmed", node_id);
                    return Ok(());
                }
                let position = self.position_from_siblings(info)?;
                let permanent = self.owns_permanent_id(node_id);
                let node = if info.is_group {
                    Node::group(node_id, permanent)
                } else {
                    Node::synth(
                        node_id,
                        info.synthdef.clone(),
                        info.controls.clone().unwrap_or_default(),
                        permanent,
                    )
                };
                self.nodes.insert(node_id, node);
                if let Err(error) = self.reparent(node_id, position) {
                    self.nodes.remove(&node_id);
                    return Err(error);
                }
                if permanent {
                    self.allocator.claim_permanent_node_id(node_id);
                }
            }
            NodeAction::Removed => {
                if self.tombstones.remove(&node_id) {
                    self.release_permanent_id(node_id);
                    return Ok(());
                }
                if node_id != ROOT_NODE_ID && self.contains(node_id) {
                    self.remove_subtree(node_id, false);
                }
            }
            NodeAction::Activated | NodeAction::Deactivated => {
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    node.is_paused = info.action == NodeAction::Deactivated;
                }
            }
            NodeAction::Moved => {
                if self.tombstones.contains(&node_id) {
                    return Ok(());
                }
                if !self.contains(node_id) {
                    return Err(NodeTreeError::NodeNotFound { node_id });
                }
                if let Some(pending) = self.pending_moves.get_mut(&node_id) {
                    *pending -= 1;
                    if *pending == 0 {
                        self.pending_moves.remove(&node_id);
                    }
                    trace!("Move of node {} confirmed", node_id);
                    return Ok(());
                }
                let position = self.position_from_siblings(info)?;
                let parent_id = self.parent_of_position(position)?;
                if self.is_within(parent_id, node_id) {
                    return Err(NodeTreeError::WouldCreateCycle {
                        node_id,
                        target_id: parent_id,
                    });
                }
                self.reparent(node_id, position)?;
            }
            NodeAction::Queried => {}
        }
        Ok(())
    }

    // Rendering

    /// Snapshot of a group in the shape `/g_queryTree.reply` decodes to.
    pub fn to_query_tree(&self, group_id: NodeId, include_controls: bool) -> Option<QueryTreeGroup> {
        match self.query_node(group_id, include_controls)? {
            QueryTreeNode::Group(group) => Some(group),
            QueryTreeNode::Synth(_) => None,
        }
    }

    /// Text dump of the whole tree, one node per line.
    pub fn render(&self) -> String {
        self.to_query_tree(ROOT_NODE_ID, true)
            .map(|tree| tree.to_string())
            .unwrap_or_default()
    }

    fn query_node(&self, node_id: NodeId, include_controls: bool) -> Option<QueryTreeNode> {
        let node = self.nodes.get(&node_id)?;
        Some(match &node.kind {
            NodeKind::Group { children } => QueryTreeNode::Group(QueryTreeGroup {
                node_id,
                children: children
                    .iter()
                    .filter_map(|child_id| self.query_node(*child_id, include_controls))
                    .collect(),
            }),
            NodeKind::Synth { synthdef, controls } => QueryTreeNode::Synth(QueryTreeSynth {
                node_id,
                synthdef: synthdef.clone().unwrap_or_default(),
                controls: include_controls.then(|| controls.clone()),
            }),
        })
    }

    // Internals

    /// Permanent ids still mirrored or awaiting their `/n_end` are skipped;
    /// they go back to the pool when those nodes end.
    fn reserve_node_id(&self, permanent: bool) -> NodeId {
        if !permanent {
            return self.allocator.allocate_node_id(1);
        }
        let mut node_id = self.allocator.allocate_permanent_node_id();
        for _ in 1..self.allocator.initial_node_id() {
            if !self.contains(node_id) && !self.tombstones.contains(&node_id) {
                break;
            }
            node_id = self.allocator.allocate_permanent_node_id();
        }
        node_id
    }

    fn release_permanent_id(&self, node_id: NodeId) {
        if self.owns_permanent_id(node_id) {
            self.allocator.free_permanent_node_id(node_id);
        }
    }

    fn owns_permanent_id(&self, node_id: NodeId) -> bool {
        node_id >> NODE_ID_SLOT_BITS == i32::from(self.allocator.client_id())
            && self.allocator.is_permanent(node_id)
    }

    /// Inserts a node whose id was just reserved, giving a permanent id back
    /// if the insert is refused for any reason but the id being taken.
    fn insert_reserved(
        &mut self,
        node: Node,
        add_action: AddAction,
        target_id: NodeId,
    ) -> Result<(), NodeTreeError> {
        let node_id = node.node_id;
        let permanent = node.is_permanent;
        let result = self.insert(node, add_action, target_id);
        if let Err(error) = &result {
            let taken = matches!(
                error,
                NodeTreeError::AlreadyRegistered { .. } | NodeTreeError::AwaitingRemoval { .. }
            );
            if permanent && !taken {
                self.allocator.free_permanent_node_id(node_id);
            }
        }
        result
    }

    fn insert(&mut self, node: Node, add_action: AddAction, target_id: NodeId) -> Result<(), NodeTreeError> {
        let node_id = node.node_id;
        if self.contains(node_id) {
            return Err(NodeTreeError::AlreadyRegistered { node_id });
        }
        if self.tombstones.contains(&node_id) {
            return Err(NodeTreeError::AwaitingRemoval { node_id });
        }
        let position = self.resolve_placement(add_action, target_id)?;
        let permanent = node.is_permanent;
        self.nodes.insert(node_id, node);
        if let Err(error) = self.reparent(node_id, position) {
            self.nodes.remove(&node_id);
            return Err(error);
        }
        if permanent {
            self.allocator.claim_permanent_node_id(node_id);
        }
        if add_action == AddAction::Replace {
            self.remove_subtree(target_id, true);
        }
        Ok(())
    }

    /// Checks a target for an add action. `Replace` lands before its target.
    fn resolve_placement(&self, add_action: AddAction, target_id: NodeId) -> Result<Position, NodeTreeError> {
        let target = self
            .nodes
            .get(&target_id)
            .ok_or(NodeTreeError::TargetNotFound { target_id })?;
        match add_action {
            AddAction::AddToHead | AddAction::AddToTail => {
                if !target.is_group() {
                    return Err(NodeTreeError::NotAGroup { node_id: target_id });
                }
                Ok(if add_action == AddAction::AddToHead {
                    Position::Head(target_id)
                } else {
                    Position::Tail(target_id)
                })
            }
            AddAction::AddBefore | AddAction::AddAfter | AddAction::Replace => {
                if target.parent_id.is_none() {
                    return Err(NodeTreeError::RootNodeImmutable {
                        operation: "used as a sibling target",
                    });
                }
                Ok(if add_action == AddAction::AddAfter {
                    Position::After(target_id)
                } else {
                    Position::Before(target_id)
                })
            }
        }
    }

    /// Placement implied by a notification's parent and sibling ids.
    fn position_from_siblings(&self, info: &NodeInfo) -> Result<Position, NodeTreeError> {
        let node_id = info.node_id;
        let parent_id = info.parent_id.ok_or(NodeTreeError::ParentNotFound {
            node_id,
            parent_id: -1,
        })?;
        let parent = self
            .nodes
            .get(&parent_id)
            .ok_or(NodeTreeError::ParentNotFound { node_id, parent_id })?;
        if !parent.is_group() {
            return Err(NodeTreeError::NotAGroup { node_id: parent_id });
        }
        let sibling = |sibling_id: Option<NodeId>| {
            sibling_id.filter(|id| *id != node_id && parent.children().contains(id))
        };
        Ok(if let Some(previous_id) = sibling(info.previous_id) {
            Position::After(previous_id)
        } else if let Some(next_id) = sibling(info.next_id) {
            Position::Before(next_id)
        } else if info.previous_id.is_none() {
            Position::Head(parent_id)
        } else {
            Position::Tail(parent_id)
        })
    }

    fn parent_of_position(&self, position: Position) -> Result<NodeId, NodeTreeError> {
        match position {
            Position::Head(parent_id) | Position::Tail(parent_id) => Ok(parent_id),
            Position::Before(sibling_id) | Position::After(sibling_id) => self
                .parent(sibling_id)
                .ok_or(NodeTreeError::TargetNotFound {
                    target_id: sibling_id,
                }),
        }
    }

    /// The only place a node's parent changes.
    fn reparent(&mut self, node_id: NodeId, position: Position) -> Result<(), NodeTreeError> {
        let parent_id = self.parent_of_position(position)?;
        match self.nodes.get(&parent_id) {
            Some(parent) if parent.is_group() => {}
            Some(_) => return Err(NodeTreeError::NotAGroup { node_id: parent_id }),
            None => return Err(NodeTreeError::TargetNotFound { target_id: parent_id }),
        }
        if matches!(position, Position::Before(id) | Position::After(id) if id == node_id) {
            return Ok(());
        }

        self.detach(node_id);
        let Some(children) = self.nodes.get_mut(&parent_id).and_then(Node::children_mut) else {
            return Err(NodeTreeError::NotAGroup { node_id: parent_id });
        };
        let index = match position {
            Position::Head(_) => 0,
            Position::Tail(_) => children.len(),
            Position::Before(sibling_id) => children
                .iter()
                .position(|id| *id == sibling_id)
                .unwrap_or(children.len()),
            Position::After(sibling_id) => children
                .iter()
                .position(|id| *id == sibling_id)
                .map_or(children.len(), |index| index + 1),
        };
        children.insert(index, node_id);
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.parent_id = Some(parent_id);
        }
        Ok(())
    }

    fn detach(&mut self, node_id: NodeId) {
        let Some(parent_id) = self.nodes.get_mut(&node_id).and_then(|node| node.parent_id.take()) else {
            return;
        };
        if let Some(children) = self.nodes.get_mut(&parent_id).and_then(Node::children_mut) {
            children.retain(|id| *id != node_id);
        }
    }

    fn remove_subtree(&mut self, node_id: NodeId, tombstone: bool) -> Vec<NodeId> {
        self.detach(node_id);
        let mut removed = Vec::new();
        let mut stack = vec![node_id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.remove(&current) else {
                continue;
            };
            stack.extend(node.children().iter().rev().copied());
            self.pending_moves.remove(&current);
            if tombstone {
                self.tombstones.insert(current);
            } else if node.is_permanent {
                self.allocator.free_permanent_node_id(current);
            }
            removed.push(current);
        }
        removed
    }

    fn merge_controls(&mut self, node_id: NodeId, controls: &Controls) -> Result<(), NodeTreeError> {
        if !self.contains(node_id) {
            return Err(NodeTreeError::NodeNotFound { node_id });
        }
        for id in self.descendants(node_id) {
            if let Some(Node {
                kind: NodeKind::Synth {
                    controls: current, ..
                },
                ..
            }) = self.nodes.get_mut(&id)
            {
                current.merge(controls);
            }
        }
        Ok(())
    }
}
