/// Largest UDP datagram the engine accepts
pub const MAX_DATAGRAM_SIZE: usize = 8192;

/// Number of low bits of a node id that hold the per-client slot
pub const NODE_ID_SLOT_BITS: u32 = 26;
pub const NODE_ID_SLOT_MASK: i32 = 0x03FF_FFFF;
pub const MAX_CLIENT_ID: u8 = 31;
pub const DEFAULT_INITIAL_NODE_ID: i32 = 1000;

pub const ROOT_NODE_ID: i32 = 0;
pub const DEFAULT_PORT: u16 = 57110;
