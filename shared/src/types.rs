/// Engine-wide node identifier (client tag in the high bits)
pub type NodeId = i32;
pub type BufferId = i32;
pub type BusId = i32;
pub type SyncId = i32;
pub type ClientId = u8;

/// Audio or control rate, used to pick a bus allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CalculationRate {
    Audio,
    Control,
}

impl CalculationRate {
    pub fn name(&self) -> &'static str {
        match self {
            CalculationRate::Audio => "audio",
            CalculationRate::Control => "control",
        }
    }
}
