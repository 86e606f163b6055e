use crate::osc::{argument::OscArgument, message::OscMessage};
use crate::types::BusId;

use super::{
    pattern::{Pattern, ReplyPatterns},
    request::Command,
};

#[derive(Debug, Clone, PartialEq)]
pub enum BusRequest {
    ControlSet { items: Vec<(BusId, f32)> },
    ControlGet { bus_ids: Vec<BusId> },
    /// Set `count` consecutive buses starting at each bus id
    ControlFill { items: Vec<(BusId, i32, f32)> },
    /// Set runs of consecutive buses, each starting at a bus id
    ControlSetN { items: Vec<(BusId, Vec<f32>)> },
    /// Read `(bus id, count)` runs back as a `/c_setn` reply
    ControlGetN { items: Vec<(BusId, i32)> },
}

impl Command for BusRequest {
    fn address(&self) -> &'static str {
        match self {
            BusRequest::ControlSet { .. } => "/c_set",
            BusRequest::ControlGet { .. } => "/c_get",
            BusRequest::ControlFill { .. } => "/c_fill",
            BusRequest::ControlSetN { .. } => "/c_setn",
            BusRequest::ControlGetN { .. } => "/c_getn",
        }
    }

    fn to_osc(&self) -> OscMessage {
        let mut arguments = Vec::new();
        match self {
            BusRequest::ControlSet { items } => {
                for (bus_id, value) in items {
                    arguments.push(OscArgument::Int(*bus_id));
                    arguments.push(OscArgument::Float(*value));
                }
            }
            BusRequest::ControlGet { bus_ids } => {
                arguments.extend(bus_ids.iter().map(|bus_id| OscArgument::Int(*bus_id)));
            }
            BusRequest::ControlFill { items } => {
                for (bus_id, count, value) in items {
                    arguments.push(OscArgument::Int(*bus_id));
                    arguments.push(OscArgument::Int(*count));
                    arguments.push(OscArgument::Float(*value));
                }
            }
            BusRequest::ControlSetN { items } => {
                for (bus_id, values) in items {
                    arguments.push(OscArgument::Int(*bus_id));
                    arguments.push(OscArgument::Int(values.len() as i32));
                    arguments.extend(values.iter().map(|value| OscArgument::Float(*value)));
                }
            }
            BusRequest::ControlGetN { items } => {
                for (bus_id, count) in items {
                    arguments.push(OscArgument::Int(*bus_id));
                    arguments.push(OscArgument::Int(*count));
                }
            }
        }
        OscMessage::new(self.address(), arguments)
    }

    fn reply_patterns(&self) -> Option<ReplyPatterns> {
        match self {
            BusRequest::ControlGet { bus_ids } => bus_ids
                .first()
                .map(|bus_id| ReplyPatterns::success(Pattern::new("/c_set").int(*bus_id))),
            BusRequest::ControlGetN { items } => items
                .first()
                .map(|(bus_id, _)| ReplyPatterns::success(Pattern::new("/c_setn").int(*bus_id))),
            _ => None,
        }
    }
}
