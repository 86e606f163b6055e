/// In-memory transport for driving a proxy against a fake engine
/// without network I/O
use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use synthctl_client::transport::{
    ConnectError, PacketReceiver, PacketSender, RecvError, SendError, Socket,
};

type Queue = Arc<Mutex<VecDeque<Vec<u8>>>>;

fn lock(queue: &Queue) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Both ends of one in-memory link: the proxy's socket and the engine's
/// endpoint
pub struct LocalSocketPair {
    pub socket: LocalSocket,
    pub engine_end: EngineEnd,
}

impl LocalSocketPair {
    pub fn new(server_addr: SocketAddr) -> Self {
        let to_engine: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let to_client: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let open = Arc::new(AtomicBool::new(true));

        let socket = LocalSocket {
            server_addr,
            to_engine: to_engine.clone(),
            to_client: to_client.clone(),
            open: open.clone(),
            refuse_connect: false,
        };
        let engine_end = EngineEnd {
            to_engine,
            to_client,
            open,
        };
        Self { socket, engine_end }
    }
}

/// The proxy's side of the link
pub struct LocalSocket {
    server_addr: SocketAddr,
    to_engine: Queue,
    to_client: Queue,
    open: Arc<AtomicBool>,
    refuse_connect: bool,
}

impl LocalSocket {
    /// A socket whose `connect` always fails.
    pub fn refusing(server_addr: SocketAddr) -> Self {
        let mut socket = LocalSocketPair::new(server_addr).socket;
        socket.refuse_connect = true;
        socket
    }
}

impl From<LocalSocket> for Box<dyn Socket> {
    fn from(socket: LocalSocket) -> Self {
        Box::new(socket)
    }
}

impl Socket for LocalSocket {
    fn connect(
        self: Box<Self>,
    ) -> Result<(Box<dyn PacketSender>, Box<dyn PacketReceiver>), ConnectError> {
        if self.refuse_connect {
            return Err(ConnectError {
                addr: self.server_addr,
                reason: "connection refused".to_string(),
            });
        }
        let sender = LocalSender {
            server_addr: self.server_addr,
            queue: self.to_engine,
            open: self.open.clone(),
        };
        let receiver = LocalReceiver {
            queue: self.to_client,
            open: self.open,
            last_payload: None,
        };
        Ok((Box::new(sender), Box::new(receiver)))
    }

    fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }
}

struct LocalSender {
    server_addr: SocketAddr,
    queue: Queue,
    open: Arc<AtomicBool>,
}

impl PacketSender for LocalSender {
    fn send(&self, payload: &[u8]) -> Result<(), SendError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(SendError {
                len: payload.len(),
                reason: "link closed".to_string(),
            });
        }
        lock(&self.queue).push_back(payload.to_vec());
        Ok(())
    }

    fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }
}

struct LocalReceiver {
    queue: Queue,
    open: Arc<AtomicBool>,
    last_payload: Option<Vec<u8>>,
}

impl PacketReceiver for LocalReceiver {
    fn receive(&mut self) -> Result<Option<&[u8]>, RecvError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(RecvError {
                reason: "link closed".to_string(),
            });
        }
        self.last_payload = lock(&self.queue).pop_front();
        Ok(self.last_payload.as_deref())
    }
}

/// The engine's side of the link
#[derive(Clone)]
pub struct EngineEnd {
    to_engine: Queue,
    to_client: Queue,
    open: Arc<AtomicBool>,
}

impl EngineEnd {
    /// Next datagram the proxy sent, if any.
    pub fn receive(&self) -> Option<Vec<u8>> {
        lock(&self.to_engine).pop_front()
    }

    pub fn send(&self, payload: Vec<u8>) {
        lock(&self.to_client).push_back(payload);
    }

    /// Cuts the link; both directions fail from now on.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:57110".parse().unwrap()
    }

    #[test]
    fn datagrams_cross_in_both_directions() {
        let LocalSocketPair { socket, engine_end } = LocalSocketPair::new(addr());
        let (sender, mut receiver) = Box::new(socket).connect().unwrap();

        sender.send(b"/status\0").unwrap();
        assert_eq!(engine_end.receive(), Some(b"/status\0".to_vec()));
        assert_eq!(engine_end.receive(), None);

        engine_end.send(b"/synced\0".to_vec());
        assert_eq!(receiver.receive().unwrap(), Some(&b"/synced\0"[..]));
        assert_eq!(receiver.receive().unwrap(), None);
    }

    #[test]
    fn closed_link_fails_both_ways() {
        let LocalSocketPair { socket, engine_end } = LocalSocketPair::new(addr());
        let (sender, mut receiver) = Box::new(socket).connect().unwrap();
        engine_end.close();
        assert!(sender.send(b"/quit\0\0\0").is_err());
        assert!(receiver.receive().is_err());
    }

    #[test]
    fn refusing_socket_fails_to_connect() {
        let socket: Box<dyn Socket> = LocalSocket::refusing(addr()).into();
        assert!(socket.connect().is_err());
    }
}
