use crate::osc::{argument::OscArgument, message::OscMessage};
use crate::types::NodeId;

use super::{
    add_action::AddAction,
    controls::Controls,
    pattern::{Pattern, ReplyPatterns},
    request::Command,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SynthRequest {
    New {
        synthdef: String,
        node_id: NodeId,
        add_action: AddAction,
        target_id: NodeId,
        controls: Controls,
    },
    /// Read control values back as an `/n_set` reply
    Get { node_id: NodeId, names: Vec<String> },
    /// Read `(control, count)` runs back as an `/n_setn` reply
    GetN { node_id: NodeId, items: Vec<(String, i32)> },
}

impl Command for SynthRequest {
    fn address(&self) -> &'static str {
        match self {
            SynthRequest::New { .. } => "/s_new",
            SynthRequest::Get { .. } => "/s_get",
            SynthRequest::GetN { .. } => "/s_getn",
        }
    }

    fn to_osc(&self) -> OscMessage {
        let mut arguments = Vec::new();
        match self {
            SynthRequest::New {
                synthdef,
                node_id,
                add_action,
                target_id,
                controls,
            } => {
                arguments.push(OscArgument::String(synthdef.clone()));
                arguments.push(OscArgument::Int(*node_id));
                arguments.push(OscArgument::Int(add_action.as_i32()));
                arguments.push(OscArgument::Int(*target_id));
                arguments.extend(controls.to_arguments());
            }
            SynthRequest::Get { node_id, names } => {
                arguments.push(OscArgument::Int(*node_id));
                arguments.extend(names.iter().map(|name| OscArgument::String(name.clone())));
            }
            SynthRequest::GetN { node_id, items } => {
                arguments.push(OscArgument::Int(*node_id));
                for (name, count) in items {
                    arguments.push(OscArgument::String(name.clone()));
                    arguments.push(OscArgument::Int(*count));
                }
            }
        }
        OscMessage::new(self.address(), arguments)
    }

    fn reply_patterns(&self) -> Option<ReplyPatterns> {
        match self {
            SynthRequest::New { node_id, .. } => {
                Some(ReplyPatterns::success(Pattern::new("/n_go").int(*node_id)))
            }
            SynthRequest::Get { node_id, .. } => {
                Some(ReplyPatterns::success(Pattern::new("/n_set").int(*node_id)))
            }
            SynthRequest::GetN { node_id, .. } => {
                Some(ReplyPatterns::success(Pattern::new("/n_setn").int(*node_id)))
            }
        }
    }
}
