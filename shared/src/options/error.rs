use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("Audio bus channel count {audio_bus_channel_count} is smaller than the {hardware_channel_count} hardware input and output channels")]
    TooFewAudioBuses {
        audio_bus_channel_count: i32,
        hardware_channel_count: i32,
    },

    #[error("Maximum logins must lie in 1..=32, got {maximum_logins}")]
    InvalidMaximumLogins { maximum_logins: i32 },

    #[error("Initial node id must be positive, got {initial_node_id}")]
    InvalidInitialNodeId { initial_node_id: i32 },
}
