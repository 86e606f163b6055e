use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocatorError {
    #[error("No allocated block contains index {index}")]
    BlockNotAllocated { index: i32 },

    #[error("Client id {client_id} is out of range, maximum is {maximum}")]
    ClientIdOutOfRange { client_id: u8, maximum: u8 },

    #[error("Initial node id {initial_node_id} must lie in 1..={maximum}")]
    InitialNodeIdOutOfRange { initial_node_id: i32, maximum: i32 },
}
