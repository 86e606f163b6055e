use thiserror::Error;

/// Errors raised while decoding a reply message into a typed response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("No response decoder for address {address}")]
    UnknownAddress { address: String },

    #[error("Reply {address} is missing argument {index}")]
    MissingArgument { address: String, index: usize },

    #[error("Reply {address} argument {index} should be {expected}")]
    UnexpectedArgument {
        address: String,
        index: usize,
        expected: &'static str,
    },

    #[error("Reply {address} carries {count} item arguments, not a multiple of {arity}")]
    MalformedItems {
        address: String,
        arity: usize,
        count: usize,
    },
}
