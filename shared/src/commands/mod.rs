pub mod add_action;
pub(crate) mod arguments;
pub mod buffers;
pub mod bundle;
pub mod buses;
pub mod controls;
pub mod error;
pub mod groups;
pub mod node_action;
pub mod nodes;
pub mod pattern;
pub mod query_tree;
pub mod request;
pub mod response;
pub mod server;
pub mod synthdefs;
pub mod synths;
