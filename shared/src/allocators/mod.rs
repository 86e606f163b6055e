pub mod block_allocator;
pub mod error;
pub mod node_id_allocator;
