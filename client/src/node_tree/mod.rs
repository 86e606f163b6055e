pub mod error;
pub mod node;
pub mod node_tree;
