pub mod argument;
pub mod bundle;
pub mod dump;
pub mod error;
pub mod message;
pub mod packet;
pub mod reader;
pub mod time_tag;
pub mod writer;
