//! # synthctl Shared
//! OSC wire codec, identifier allocators and the request/response model
//! shared by the synthctl client crates. Nothing in here performs I/O.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod allocators;
mod commands;
mod constants;
mod options;
mod osc;
mod types;

pub use allocators::{
    block_allocator::{Block, BlockAllocator},
    error::AllocatorError,
    node_id_allocator::NodeIdAllocator,
};
pub use commands::{
    add_action::AddAction,
    buffers::{BufferRequest, GenerateFlags},
    bundle::RequestBundle,
    buses::BusRequest,
    controls::{ControlValue, Controls},
    error::ResponseError,
    groups::{GroupNewItem, GroupRequest},
    node_action::NodeAction,
    nodes::NodeRequest,
    pattern::{Pattern, PatternItem, ReplyPatterns},
    query_tree::{QueryTreeGroup, QueryTreeNode, QueryTreeSynth},
    request::{Command, Request, Requestable},
    response::{
        BufferInfo, BufferInfoItem, BufferSetInfo, BufferSetNInfo, ControlBusSetInfo,
        ControlBusSetNInfo, DoneInfo, FailInfo, NodeInfo, NodeSetInfo, NodeSetNInfo, Response,
        StatusInfo, SyncedInfo, TriggerInfo, VersionInfo,
    },
    server::ServerRequest,
    synthdefs::SynthDefRequest,
    synths::SynthRequest,
};
pub use constants::{
    DEFAULT_INITIAL_NODE_ID, DEFAULT_PORT, MAX_CLIENT_ID, MAX_DATAGRAM_SIZE, NODE_ID_SLOT_BITS,
    NODE_ID_SLOT_MASK, ROOT_NODE_ID,
};
pub use options::{error::OptionsError, server_options::ServerOptions};
pub use osc::{
    argument::OscArgument,
    bundle::{OscBundle, BUNDLE_HEADER_SIZE},
    dump::format_datagram,
    error::OscError,
    message::OscMessage,
    packet::OscPacket,
    time_tag::TimeTag,
};
pub use types::{BufferId, BusId, CalculationRate, ClientId, NodeId, SyncId};
