/// Node lifecycle notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeAction {
    Created,
    Removed,
    Activated,
    Deactivated,
    Moved,
    Queried,
}

impl NodeAction {
    pub fn from_address(address: &str) -> Option<Self> {
        match address {
            "/n_go" => Some(NodeAction::Created),
            "/n_end" => Some(NodeAction::Removed),
            "/n_on" => Some(NodeAction::Activated),
            "/n_off" => Some(NodeAction::Deactivated),
            "/n_move" => Some(NodeAction::Moved),
            "/n_info" => Some(NodeAction::Queried),
            _ => None,
        }
    }

    pub fn address(&self) -> &'static str {
        match self {
            NodeAction::Created => "/n_go",
            NodeAction::Removed => "/n_end",
            NodeAction::Activated => "/n_on",
            NodeAction::Deactivated => "/n_off",
            NodeAction::Moved => "/n_move",
            NodeAction::Queried => "/n_info",
        }
    }

    pub const ADDRESSES: [&'static str; 6] = ["/n_go", "/n_end", "/n_on", "/n_off", "/n_move", "/n_info"];
}
