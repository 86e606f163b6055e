mod server;
pub use server::Server;

cfg_if! {
    if #[cfg(feature = "async_server")] {
        mod async_server;
        pub use async_server::AsyncServer;
    }
}

pub mod boot_status;
pub mod client_config;
pub mod server_core;
pub mod error;
pub mod health_check;
pub mod process;
pub mod registry;
pub mod session;
