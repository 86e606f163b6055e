pub mod error;
pub mod server_options;
