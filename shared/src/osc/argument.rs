use std::fmt;

/// A single typed OSC argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscArgument {
    Int(i32),
    Float(f32),
    Double(f64),
    String(String),
    Blob(Vec<u8>),
    True,
    False,
    Nil,
    Array(Vec<OscArgument>),
}

impl OscArgument {
    /// Appends this argument's type tag(s) to `tags`.
    pub(crate) fn push_type_tags(&self, tags: &mut String) {
        match self {
            OscArgument::Int(_) => tags.push('i'),
            OscArgument::Float(_) => tags.push('f'),
            OscArgument::Double(_) => tags.push('d'),
            OscArgument::String(_) => tags.push('s'),
            OscArgument::Blob(_) => tags.push('b'),
            OscArgument::True => tags.push('T'),
            OscArgument::False => tags.push('F'),
            OscArgument::Nil => tags.push('N'),
            OscArgument::Array(items) => {
                tags.push('[');
                for item in items {
                    item.push_type_tags(tags);
                }
                tags.push(']');
            }
        }
    }

    /// Integer view: ints as-is, whole floats truncated, booleans as 0/1.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            OscArgument::Int(value) => Some(*value),
            OscArgument::Float(value) => Some(*value as i32),
            OscArgument::Double(value) => Some(*value as i32),
            OscArgument::True => Some(1),
            OscArgument::False => Some(0),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            OscArgument::Int(value) => Some(*value as f32),
            OscArgument::Float(value) => Some(*value),
            OscArgument::Double(value) => Some(*value as f32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscArgument::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            OscArgument::Blob(value) => Some(value.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for OscArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArgument::Int(value) => write!(f, "{}", value),
            OscArgument::Float(value) => write!(f, "{:?}", value),
            OscArgument::Double(value) => write!(f, "{:?}", value),
            OscArgument::String(value) => write!(f, "'{}'", value),
            OscArgument::Blob(value) => write!(f, "<blob {} bytes>", value.len()),
            OscArgument::True => write!(f, "true"),
            OscArgument::False => write!(f, "false"),
            OscArgument::Nil => write!(f, "nil"),
            OscArgument::Array(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i32> for OscArgument {
    fn from(value: i32) -> Self {
        OscArgument::Int(value)
    }
}

impl From<f32> for OscArgument {
    fn from(value: f32) -> Self {
        OscArgument::Float(value)
    }
}

impl From<f64> for OscArgument {
    fn from(value: f64) -> Self {
        OscArgument::Double(value)
    }
}

impl From<bool> for OscArgument {
    fn from(value: bool) -> Self {
        if value {
            OscArgument::True
        } else {
            OscArgument::False
        }
    }
}

impl From<&str> for OscArgument {
    fn from(value: &str) -> Self {
        OscArgument::String(value.to_string())
    }
}

impl From<String> for OscArgument {
    fn from(value: String) -> Self {
        OscArgument::String(value)
    }
}

impl From<Vec<u8>> for OscArgument {
    fn from(value: Vec<u8>) -> Self {
        OscArgument::Blob(value)
    }
}
