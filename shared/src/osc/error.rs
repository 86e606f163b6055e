use thiserror::Error;

/// Errors raised while decoding an OSC datagram
///
/// Every variant carries the byte offset at which decoding stopped so that
/// malformed server output can be correlated with a hex dump of the datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OscError {
    #[error("Packet is empty")]
    EmptyPacket,

    #[error("Packet truncated at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("String starting at offset {offset} is not null terminated")]
    UnterminatedString { offset: usize },

    #[error("String starting at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("Address pattern {address:?} does not start with '/'")]
    InvalidAddress { address: String },

    #[error("Type tag string {tags:?} does not start with ','")]
    InvalidTypeTags { tags: String },

    #[error("Unsupported type tag '{tag}'")]
    UnsupportedTypeTag { tag: char },

    #[error("Unbalanced array brackets in type tag string {tags:?}")]
    UnbalancedArray { tags: String },

    #[error("Bundle element at offset {offset} declares invalid length {length}")]
    InvalidElementLength { offset: usize, length: i32 },
}
