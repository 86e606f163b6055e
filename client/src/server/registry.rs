use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use log::{debug, info};
use once_cell::sync::Lazy;

use super::error::ServerError;

/// A live proxy as seen by the registry
pub trait RegistryEntry: Send + Sync {
    fn server_addr(&self) -> SocketAddr;
    /// Tears the proxy down without waiting on the engine.
    fn force_shutdown(&self);
}

static GLOBAL: Lazy<Arc<ServerRegistry>> = Lazy::new(|| Arc::new(ServerRegistry::new()));

/// Tracks connected proxies by engine address
///
/// Proxies register once their handshake succeeds and unregister during
/// teardown. Only weak references are kept.
#[derive(Default)]
pub struct ServerRegistry {
    entries: Mutex<HashMap<SocketAddr, Weak<dyn RegistryEntry>>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> Arc<ServerRegistry> {
        GLOBAL.clone()
    }

    pub fn register(&self, entry: Weak<dyn RegistryEntry>) -> Result<(), ServerError> {
        let Some(live) = entry.upgrade() else {
            return Ok(());
        };
        let addr = live.server_addr();
        let mut entries = self.lock();
        if entries
            .get(&addr)
            .is_some_and(|existing| existing.strong_count() > 0)
        {
            return Err(ServerError::AlreadyRegistered { addr });
        }
        debug!("Registered proxy for {}", addr);
        entries.insert(addr, entry);
        Ok(())
    }

    pub fn unregister(&self, addr: &SocketAddr) {
        if self.lock().remove(addr).is_some() {
            debug!("Unregistered proxy for {}", addr);
        }
    }

    /// Removes `addr` only while it still belongs to `entry`, or to a proxy
    /// that no longer exists.
    pub fn unregister_entry(&self, addr: &SocketAddr, entry: &Weak<dyn RegistryEntry>) {
        let mut entries = self.lock();
        let owned = entries
            .get(addr)
            .is_some_and(|existing| Weak::ptr_eq(existing, entry) || existing.strong_count() == 0);
        if owned {
            entries.remove(addr);
            debug!("Unregistered proxy for {}", addr);
        }
    }

    pub fn find(&self, addr: &SocketAddr) -> Option<Arc<dyn RegistryEntry>> {
        self.lock().get(addr).and_then(Weak::upgrade)
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.find(addr).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forces every registered proxy down. Meant for exit hooks.
    pub fn shutdown_all(&self) {
        let live: Vec<Arc<dyn RegistryEntry>> = self
            .lock()
            .drain()
            .filter_map(|(_, entry)| entry.upgrade())
            .collect();
        if !live.is_empty() {
            info!("Shutting down {} registered proxies", live.len());
        }
        for entry in live {
            entry.force_shutdown();
        }
    }

    /// Forgets every entry without touching the proxies.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SocketAddr, Weak<dyn RegistryEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
