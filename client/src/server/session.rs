use std::{collections::BTreeMap, sync::Arc};

use log::debug;

use synthctl_shared::{
    AddAction, BlockAllocator, BufferId, BusId, CalculationRate, ClientId, GroupNewItem,
    GroupRequest, NodeId, NodeIdAllocator, Request, ServerOptions, ROOT_NODE_ID,
};

use crate::node_tree::node_tree::NodeTree;

use super::error::ServerError;

/// A contiguous run of buses handed to one caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusGroup {
    pub rate: CalculationRate,
    pub bus_id: BusId,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffer {
    pub buffer_id: BufferId,
    pub frame_count: i32,
    pub channel_count: i32,
}

/// Everything a proxy knows about the engine while it is logged in
///
/// Built after a successful `/notify` handshake and dropped on teardown.
/// Allocators are sized from this client's slice of the engine's id ranges.
pub struct Session {
    client_id: ClientId,
    options: ServerOptions,
    node_tree: NodeTree,
    audio_buses: BlockAllocator,
    control_buses: BlockAllocator,
    buffers: BlockAllocator,
    bus_groups: BTreeMap<(CalculationRate, BusId), BusGroup>,
    allocated_buffers: BTreeMap<BufferId, Buffer>,
}

impl Session {
    /// `options.maximum_logins` must already hold the engine's answer.
    pub fn new(client_id: ClientId, options: ServerOptions) -> Result<Self, ServerError> {
        let node_ids = Arc::new(NodeIdAllocator::new(client_id, options.initial_node_id)?);
        let mut node_tree = NodeTree::new(node_ids);
        for node_id in Self::default_group_ids(&options) {
            node_tree.add_default_group(node_id)?;
        }
        let audio = options.audio_bus_ids(client_id);
        let control = options.control_bus_ids(client_id);
        let buffers = options.buffer_ids(client_id);
        debug!(
            "Client {} owns audio buses {:?}, control buses {:?}, buffers {:?}",
            client_id, audio, control, buffers
        );
        Ok(Self {
            client_id,
            audio_buses: BlockAllocator::new(audio.start, audio.end),
            control_buses: BlockAllocator::new(control.start, control.end),
            buffers: BlockAllocator::new(buffers.start, buffers.end),
            options,
            node_tree,
            bus_groups: BTreeMap::new(),
            allocated_buffers: BTreeMap::new(),
        })
    }

    fn default_group_ids(options: &ServerOptions) -> impl Iterator<Item = NodeId> {
        1..=options.maximum_logins.max(1)
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn maximum_logins(&self) -> i32 {
        self.options.maximum_logins
    }

    /// Group that new nodes go into unless told otherwise.
    pub fn default_group(&self) -> NodeId {
        NodeId::from(self.client_id) + 1
    }

    /// The `/g_new` that client 0 sends to create every default group.
    pub fn default_groups_request(&self) -> Request {
        GroupRequest::New {
            items: Self::default_group_ids(&self.options)
                .map(|node_id| GroupNewItem::new(node_id, AddAction::AddToTail, ROOT_NODE_ID))
                .collect(),
        }
        .into()
    }

    pub fn node_tree(&self) -> &NodeTree {
        &self.node_tree
    }

    pub fn node_tree_mut(&mut self) -> &mut NodeTree {
        &mut self.node_tree
    }

    // Buses

    fn bus_allocator(&self, rate: CalculationRate) -> &BlockAllocator {
        match rate {
            CalculationRate::Audio => &self.audio_buses,
            CalculationRate::Control => &self.control_buses,
        }
    }

    pub fn allocate_bus_group(
        &mut self,
        rate: CalculationRate,
        count: usize,
    ) -> Result<BusGroup, ServerError> {
        let bus_id = self
            .bus_allocator(rate)
            .allocate(count)
            .ok_or(ServerError::AllocationExhausted {
                kind: rate.name(),
                count,
            })?;
        let group = BusGroup {
            rate,
            bus_id,
            count,
        };
        self.bus_groups.insert((rate, bus_id), group);
        Ok(group)
    }

    pub fn free_bus_group(&mut self, rate: CalculationRate, bus_id: BusId) -> Result<BusGroup, ServerError> {
        let group = self
            .bus_groups
            .remove(&(rate, bus_id))
            .ok_or(ServerError::UnknownResource {
                kind: rate.name(),
                id: bus_id,
            })?;
        self.bus_allocator(rate).free(bus_id)?;
        Ok(group)
    }

    pub fn bus_groups(&self) -> impl Iterator<Item = &BusGroup> {
        self.bus_groups.values()
    }

    // Buffers

    pub fn allocate_buffer(&mut self, frame_count: i32, channel_count: i32) -> Result<Buffer, ServerError> {
        let buffer_id = self.buffers.allocate(1).ok_or(ServerError::AllocationExhausted {
            kind: "buffer",
            count: 1,
        })?;
        let buffer = Buffer {
            buffer_id,
            frame_count,
            channel_count,
        };
        self.allocated_buffers.insert(buffer_id, buffer);
        Ok(buffer)
    }

    pub fn free_buffer(&mut self, buffer_id: BufferId) -> Result<Buffer, ServerError> {
        let buffer = self
            .allocated_buffers
            .remove(&buffer_id)
            .ok_or(ServerError::UnknownResource {
                kind: "buffer",
                id: buffer_id,
            })?;
        self.buffers.free(buffer_id)?;
        Ok(buffer)
    }

    pub fn buffer(&self, buffer_id: BufferId) -> Option<&Buffer> {
        self.allocated_buffers.get(&buffer_id)
    }

    /// Drops every mirrored node, bus group and buffer. Returns the node ids
    /// that were removed.
    pub fn release_all(&mut self) -> Vec<NodeId> {
        let node_ids = self.node_tree.clear();
        self.node_tree.allocator().reset();
        self.bus_groups.clear();
        self.allocated_buffers.clear();
        self.audio_buses.reset();
        self.control_buses.reset();
        self.buffers.reset();
        node_ids
    }
}
