use std::fmt;

use crate::osc::{argument::OscArgument, message::OscMessage};

/// One item of a reply pattern, also used as a key in callback tables
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternItem {
    Int(i32),
    Str(String),
}

impl PatternItem {
    /// Key for an inbound argument; floats with no fractional part match
    /// integer items.
    pub fn from_argument(argument: &OscArgument) -> Option<Self> {
        match argument {
            OscArgument::Int(value) => Some(PatternItem::Int(*value)),
            OscArgument::Float(value) if value.fract() == 0.0 => {
                Some(PatternItem::Int(*value as i32))
            }
            OscArgument::String(value) => Some(PatternItem::Str(value.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for PatternItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternItem::Int(value) => write!(f, "{}", value),
            PatternItem::Str(value) => write!(f, "'{}'", value),
        }
    }
}

/// Leading items an inbound message must carry: its address, then
/// optionally its first arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    items: Vec<PatternItem>,
}

impl Pattern {
    pub fn new(address: &str) -> Self {
        Self {
            items: vec![PatternItem::Str(address.to_string())],
        }
    }

    pub fn int(mut self, value: i32) -> Self {
        self.items.push(PatternItem::Int(value));
        self
    }

    pub fn str(mut self, value: &str) -> Self {
        self.items.push(PatternItem::Str(value.to_string()));
        self
    }

    pub fn address(&self) -> &str {
        match &self.items[0] {
            PatternItem::Str(address) => address,
            PatternItem::Int(_) => "",
        }
    }

    pub fn items(&self) -> &[PatternItem] {
        &self.items
    }

    pub fn matches(&self, message: &OscMessage) -> bool {
        if self.address() != message.address {
            return false;
        }
        let expected = &self.items[1..];
        if message.arguments.len() < expected.len() {
            return false;
        }
        expected
            .iter()
            .zip(message.arguments.iter())
            .all(|(item, argument)| PatternItem::from_argument(argument).as_ref() == Some(item))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, item) in self.items.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, "]")
    }
}

/// Success pattern plus an optional failure pattern for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPatterns {
    pub success: Pattern,
    pub failure: Option<Pattern>,
}

impl ReplyPatterns {
    pub fn success(success: Pattern) -> Self {
        Self {
            success,
            failure: None,
        }
    }

    pub fn with_failure(success: Pattern, failure: Pattern) -> Self {
        Self {
            success,
            failure: Some(failure),
        }
    }
}
