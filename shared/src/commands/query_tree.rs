use std::fmt;

use crate::types::NodeId;

use super::{arguments::ArgumentCursor, controls::Controls, error::ResponseError};

/// A synth as reported by `/g_queryTree.reply`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTreeSynth {
    pub node_id: NodeId,
    pub synthdef: String,
    /// Present only when the query asked for controls
    pub controls: Option<Controls>,
}

/// A group as reported by `/g_queryTree.reply`, with its children in order
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTreeGroup {
    pub node_id: NodeId,
    pub children: Vec<QueryTreeNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryTreeNode {
    Group(QueryTreeGroup),
    Synth(QueryTreeSynth),
}

impl QueryTreeNode {
    pub fn node_id(&self) -> NodeId {
        match self {
            QueryTreeNode::Group(group) => group.node_id,
            QueryTreeNode::Synth(synth) => synth.node_id,
        }
    }

    fn decode(cursor: &mut ArgumentCursor, include_controls: bool) -> Result<Self, ResponseError> {
        let node_id = cursor.int()?;
        let child_count = cursor.int()?;
        if child_count < 0 {
            let synthdef = cursor.string()?;
            let controls = if include_controls {
                let control_count = cursor.int()?;
                let mut controls = Controls::new();
                for _ in 0..control_count.max(0) {
                    let name = cursor.control_name()?;
                    let value = cursor.control_value()?;
                    controls.set(name, value);
                }
                Some(controls)
            } else {
                None
            };
            return Ok(QueryTreeNode::Synth(QueryTreeSynth {
                node_id,
                synthdef,
                controls,
            }));
        }
        let mut children = Vec::with_capacity(child_count as usize);
        for _ in 0..child_count {
            children.push(QueryTreeNode::decode(cursor, include_controls)?);
        }
        Ok(QueryTreeNode::Group(QueryTreeGroup { node_id, children }))
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "    ".repeat(depth);
        match self {
            QueryTreeNode::Group(group) => {
                writeln!(f, "{}{} group", indent, group.node_id)?;
                for child in &group.children {
                    child.render(f, depth + 1)?;
                }
            }
            QueryTreeNode::Synth(synth) => {
                writeln!(f, "{}{} {}", indent, synth.node_id, synth.synthdef)?;
                if let Some(controls) = &synth.controls {
                    if !controls.is_empty() {
                        writeln!(f, "{}    {}", indent, controls)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl QueryTreeGroup {
    pub(crate) fn decode(cursor: &mut ArgumentCursor) -> Result<Self, ResponseError> {
        let include_controls = cursor.int()? != 0;
        match QueryTreeNode::decode(cursor, include_controls)? {
            QueryTreeNode::Group(group) => Ok(group),
            QueryTreeNode::Synth(synth) => Ok(QueryTreeGroup {
                node_id: synth.node_id,
                children: vec![QueryTreeNode::Synth(synth)],
            }),
        }
    }

    /// Every node id below (and including) this group, depth first.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut node_ids = vec![self.node_id];
        for child in &self.children {
            match child {
                QueryTreeNode::Group(group) => node_ids.extend(group.node_ids()),
                QueryTreeNode::Synth(synth) => node_ids.push(synth.node_id),
            }
        }
        node_ids
    }

    pub fn find(&self, node_id: NodeId) -> Option<&QueryTreeNode> {
        for child in &self.children {
            if child.node_id() == node_id {
                return Some(child);
            }
            if let QueryTreeNode::Group(group) = child {
                if let Some(found) = group.find(node_id) {
                    return Some(found);
                }
            }
        }
        None
    }
}

impl fmt::Display for QueryTreeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "NODE TREE {} group", self.node_id)?;
        for child in &self.children {
            child.render(f, 1)?;
        }
        Ok(())
    }
}
