/// Where a new node goes relative to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddAction {
    /// First child of the target group
    #[default]
    AddToHead,
    /// Last child of the target group
    AddToTail,
    /// Immediately before the target node
    AddBefore,
    /// Immediately after the target node
    AddAfter,
    /// Replaces the target node, which is freed
    Replace,
}

impl AddAction {
    pub fn as_i32(&self) -> i32 {
        match self {
            AddAction::AddToHead => 0,
            AddAction::AddToTail => 1,
            AddAction::AddBefore => 2,
            AddAction::AddAfter => 3,
            AddAction::Replace => 4,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(AddAction::AddToHead),
            1 => Some(AddAction::AddToTail),
            2 => Some(AddAction::AddBefore),
            3 => Some(AddAction::AddAfter),
            4 => Some(AddAction::Replace),
            _ => None,
        }
    }

    /// Whether the target must be a group.
    pub fn targets_group(&self) -> bool {
        matches!(self, AddAction::AddToHead | AddAction::AddToTail)
    }
}
