mod error;
pub mod udp;

pub use error::{ConnectError, RecvError, SendError};
pub use inner::{PacketReceiver, PacketSender, Socket};

mod inner {

    use std::net::SocketAddr;

    use super::{ConnectError, RecvError, SendError};

    pub trait Socket: Send {
        /// Opens the transport and splits it into its two halves
        fn connect(
            self: Box<Self>,
        ) -> Result<(Box<dyn PacketSender>, Box<dyn PacketReceiver>), ConnectError>;
        /// Get the engine's socket address
        fn server_addr(&self) -> SocketAddr;
    }

    pub trait PacketSender: Send + Sync {
        /// Sends one datagram to the engine
        fn send(&self, payload: &[u8]) -> Result<(), SendError>;
        /// Get the engine's socket address
        fn server_addr(&self) -> SocketAddr;
    }

    pub trait PacketReceiver: Send {
        /// Receives one datagram from the engine, without blocking
        fn receive(&mut self) -> Result<Option<&[u8]>, RecvError>;
    }
}
