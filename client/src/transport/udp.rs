use std::{
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
    sync::Arc,
};

use log::debug;

use crate::transport::{
    ConnectError, PacketReceiver as TransportReceiver, PacketSender as TransportSender, RecvError,
    SendError, Socket as TransportSocket,
};

// Engine replies never exceed this, but leave room for oversized /g_queryTree.reply
const RECEIVE_BUFFER_SIZE: usize = 65_536;

/// Plain UDP transport to an engine
pub struct Socket {
    server_addr: SocketAddr,
    bind_addr: SocketAddr,
}

impl Socket {
    pub fn new(server_addr: SocketAddr) -> Self {
        let bind_addr = if server_addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        Self {
            server_addr,
            bind_addr,
        }
    }
}

impl From<Socket> for Box<dyn TransportSocket> {
    fn from(socket: Socket) -> Self {
        Box::new(socket)
    }
}

impl TransportSocket for Socket {
    fn connect(
        self: Box<Self>,
    ) -> Result<(Box<dyn TransportSender>, Box<dyn TransportReceiver>), ConnectError> {
        let to_connect_error = |error: std::io::Error| ConnectError {
            addr: self.server_addr,
            reason: error.to_string(),
        };
        let socket = UdpSocket::bind(self.bind_addr).map_err(to_connect_error)?;
        socket.connect(self.server_addr).map_err(to_connect_error)?;
        socket.set_nonblocking(true).map_err(to_connect_error)?;
        debug!(
            "UDP socket {:?} connected to {}",
            socket.local_addr().ok(),
            self.server_addr
        );

        let socket = Arc::new(socket);
        let sender = PacketSender {
            socket: socket.clone(),
            server_addr: self.server_addr,
        };
        let receiver = PacketReceiver {
            socket,
            buffer: vec![0; RECEIVE_BUFFER_SIZE].into_boxed_slice(),
        };
        Ok((Box::new(sender), Box::new(receiver)))
    }

    fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }
}

// Sender

struct PacketSender {
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
}

impl TransportSender for PacketSender {
    fn send(&self, payload: &[u8]) -> Result<(), SendError> {
        self.socket
            .send(payload)
            .map(|_| ())
            .map_err(|error| SendError {
                len: payload.len(),
                reason: error.to_string(),
            })
    }

    fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }
}

// Receiver

struct PacketReceiver {
    socket: Arc<UdpSocket>,
    buffer: Box<[u8]>,
}

impl TransportReceiver for PacketReceiver {
    fn receive(&mut self) -> Result<Option<&[u8]>, RecvError> {
        match self.socket.recv(&mut self.buffer) {
            Ok(length) => Ok(Some(&self.buffer[..length])),
            Err(error) if error.kind() == ErrorKind::WouldBlock => Ok(None),
            // ICMP port unreachable surfaces here while the engine is still booting
            Err(error) if error.kind() == ErrorKind::ConnectionRefused => Ok(None),
            Err(error) => Err(RecvError {
                reason: error.to_string(),
            }),
        }
    }
}
