use std::{
    collections::BTreeSet,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::constants::{DEFAULT_INITIAL_NODE_ID, MAX_CLIENT_ID, NODE_ID_SLOT_BITS, NODE_ID_SLOT_MASK};
use crate::types::{ClientId, NodeId};

use super::error::AllocatorError;

struct NodeIdState {
    next_ephemeral: i32,
    next_permanent: i32,
    freed_permanent: BTreeSet<i32>,
    claimed_permanent: BTreeSet<i32>,
}

/// Issues node ids tagged with the owning client's id
///
/// A node id carries the client id in bits 26..=30 and a 26-bit slot below
/// it, so several clients sharing one server never collide. Slots below
/// `initial_node_id` form the permanent pool (recycled through a free set);
/// slots from `initial_node_id` upwards form the ephemeral pool, a rolling
/// counter that wraps back to `initial_node_id`.
pub struct NodeIdAllocator {
    client_id: ClientId,
    initial_node_id: i32,
    mask: i32,
    state: Mutex<NodeIdState>,
}

impl NodeIdAllocator {
    pub fn new(client_id: ClientId, initial_node_id: i32) -> Result<Self, AllocatorError> {
        if client_id > MAX_CLIENT_ID {
            return Err(AllocatorError::ClientIdOutOfRange {
                client_id,
                maximum: MAX_CLIENT_ID,
            });
        }
        if initial_node_id < 1 || initial_node_id > NODE_ID_SLOT_MASK {
            return Err(AllocatorError::InitialNodeIdOutOfRange {
                initial_node_id,
                maximum: NODE_ID_SLOT_MASK,
            });
        }
        Ok(Self {
            client_id,
            initial_node_id,
            mask: i32::from(client_id) << NODE_ID_SLOT_BITS,
            state: Mutex::new(NodeIdState {
                next_ephemeral: initial_node_id,
                next_permanent: 1,
                freed_permanent: BTreeSet::new(),
                claimed_permanent: BTreeSet::new(),
            }),
        })
    }

    pub fn with_client_id(client_id: ClientId) -> Result<Self, AllocatorError> {
        Self::new(client_id, DEFAULT_INITIAL_NODE_ID)
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn initial_node_id(&self) -> i32 {
        self.initial_node_id
    }

    /// Reserves `count` consecutive ephemeral ids and returns the first.
    pub fn allocate_node_id(&self, count: usize) -> NodeId {
        let count = count.clamp(1, NODE_ID_SLOT_MASK as usize) as i32;
        let mut state = self.lock();
        let node_id = state.next_ephemeral;
        state.next_ephemeral += count;
        if state.next_ephemeral > NODE_ID_SLOT_MASK {
            state.next_ephemeral = (state.next_ephemeral % NODE_ID_SLOT_MASK) + self.initial_node_id;
        }
        node_id | self.mask
    }

    /// Reserves the smallest available permanent id.
    pub fn allocate_permanent_node_id(&self) -> NodeId {
        let mut guard = self.lock();
        let state = &mut *guard;
        let slot = match state.freed_permanent.pop_first() {
            Some(slot) => slot,
            None => {
                while state.claimed_permanent.remove(&state.next_permanent) {
                    state.next_permanent = (state.next_permanent + 1).min(self.initial_node_id - 1);
                }
                let slot = state.next_permanent;
                state.next_permanent = (slot + 1).min(self.initial_node_id - 1);
                slot
            }
        };
        slot | self.mask
    }

    /// Marks a permanent id that exists on the server without having been
    /// allocated here, such as a default group.
    pub fn claim_permanent_node_id(&self, node_id: NodeId) {
        if node_id & !NODE_ID_SLOT_MASK != self.mask {
            return;
        }
        let slot = node_id & NODE_ID_SLOT_MASK;
        if slot == 0 || slot >= self.initial_node_id {
            return;
        }
        let mut state = self.lock();
        if !state.freed_permanent.remove(&slot) && slot >= state.next_permanent {
            state.claimed_permanent.insert(slot);
        }
    }

    /// Returns a permanent id to the pool. Ephemeral ids and ids tagged for
    /// other clients are ignored.
    pub fn free_permanent_node_id(&self, node_id: NodeId) {
        if node_id & !NODE_ID_SLOT_MASK != self.mask {
            return;
        }
        let slot = node_id & NODE_ID_SLOT_MASK;
        if slot == 0 || slot >= self.initial_node_id {
            return;
        }
        self.lock().freed_permanent.insert(slot);
    }

    pub fn is_permanent(&self, node_id: NodeId) -> bool {
        (node_id & NODE_ID_SLOT_MASK) < self.initial_node_id
    }

    /// Forgets every reservation.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.next_ephemeral = self.initial_node_id;
        state.next_permanent = 1;
        state.freed_permanent.clear();
        state.claimed_permanent.clear();
    }

    fn lock(&self) -> MutexGuard<'_, NodeIdState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
