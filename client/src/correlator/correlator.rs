use std::{
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::{Duration, Instant},
};

use log::{debug, trace, warn};

use synthctl_shared::{
    format_datagram, Command, OscMessage, OscPacket, Pattern, ReplyPatterns, Request,
    RequestBundle, Requestable, Response, ServerRequest, SyncId, TimeTag, MAX_DATAGRAM_SIZE,
};

use crate::transport::PacketSender;

use super::{
    callback_table::{CallbackHandle, CallbackTable, ResponseCallback},
    capture::{Capture, CaptureDirection, CaptureEntry, CaptureLog},
    error::CorrelatorError,
};

/// Bytes a trailing `/sync n` adds to a bundle: length prefix plus message
const SYNC_ELEMENT_SIZE: usize = 20;

/// Matches inbound replies to outstanding requests
///
/// Owns the outbound half of the transport; the inbound half is pumped by the
/// owning proxy, which hands every datagram to [`Correlator::receive_datagram`].
pub struct Correlator {
    sender: Mutex<Option<Box<dyn PacketSender>>>,
    table: Mutex<CallbackTable>,
    captures: Mutex<Vec<Weak<Mutex<Vec<CaptureEntry>>>>>,
    next_sync_id: AtomicI32,
    max_datagram_size: usize,
}

impl Correlator {
    pub fn new() -> Self {
        Self::with_max_datagram_size(MAX_DATAGRAM_SIZE)
    }

    pub fn with_max_datagram_size(max_datagram_size: usize) -> Self {
        Self {
            sender: Mutex::new(None),
            table: Mutex::new(CallbackTable::new()),
            captures: Mutex::new(Vec::new()),
            next_sync_id: AtomicI32::new(0),
            max_datagram_size,
        }
    }

    // Connection

    pub fn attach(&self, sender: Box<dyn PacketSender>) {
        debug!("Correlator attached to {}", sender.server_addr());
        *lock(&self.sender) = Some(sender);
    }

    /// Drops the transport and every registration.
    pub fn detach(&self) {
        lock(&self.sender).take();
        lock(&self.table).clear();
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.sender).is_some()
    }

    /// Restarts sync ids at `first`, normally `client_id << 26`.
    pub fn reset_sync_ids(&self, first: SyncId) {
        self.next_sync_id.store(first, Ordering::SeqCst);
    }

    pub fn next_sync_id(&self) -> SyncId {
        self.next_sync_id.fetch_add(1, Ordering::SeqCst)
    }

    // Registration

    pub fn register<F>(
        &self,
        success: Pattern,
        failure: Option<Pattern>,
        callback: F,
        once: bool,
    ) -> CallbackHandle
    where
        F: Fn(&OscMessage) + Send + Sync + 'static,
    {
        let callback: ResponseCallback = Arc::new(callback);
        lock(&self.table).register(success, failure, callback, once)
    }

    pub fn unregister(&self, handle: CallbackHandle) {
        lock(&self.table).unregister(handle);
    }

    pub fn registration_count(&self) -> usize {
        lock(&self.table).len()
    }

    pub fn capture(&self) -> Capture {
        let log: CaptureLog = Arc::new(Mutex::new(Vec::new()));
        let mut captures = lock(&self.captures);
        captures.retain(|capture| capture.strong_count() > 0);
        captures.push(Arc::downgrade(&log));
        Capture::new(log)
    }

    // Inbound

    /// Decodes one inbound datagram and dispatches each message in it.
    /// Malformed datagrams are logged and dropped.
    pub fn receive_datagram(&self, payload: &[u8]) {
        let packet = match OscPacket::decode(payload) {
            Ok(packet) => packet,
            Err(error) => {
                warn!(
                    "Dropping malformed datagram: {}\n{}",
                    error,
                    format_datagram(payload)
                );
                return;
            }
        };
        self.record(CaptureDirection::Received, &packet);
        for message in packet.into_messages() {
            self.dispatch(&message);
        }
    }

    /// Fires every callback whose pattern matches `message`.
    pub fn dispatch(&self, message: &OscMessage) {
        trace!("Received {}", message);
        let callbacks = lock(&self.table).take_matches(message);
        for callback in callbacks {
            callback(message);
        }
    }

    // Outbound

    /// Transmits without registering for a reply.
    pub fn send(&self, requestable: &Requestable) -> Result<(), CorrelatorError> {
        let packet = requestable.to_packet();
        let payload = packet.encode();
        if payload.len() > self.max_datagram_size {
            return Err(CorrelatorError::OversizeBundle {
                size: payload.len(),
                limit: self.max_datagram_size,
            });
        }
        {
            let sender = lock(&self.sender);
            let Some(sender) = sender.as_ref() else {
                return Err(CorrelatorError::NotConnected);
            };
            sender.send(&payload)?;
        }
        if log::log_enabled!(log::Level::Trace) {
            trace!("Sent {:?}\n{}", packet, format_datagram(&payload));
        }
        self.record(CaptureDirection::Sent, &packet);
        Ok(())
    }

    /// Transmits and blocks until the reply arrives or `timeout` passes.
    ///
    /// Returns `Ok(None)` straight after sending when the request expects no
    /// reply. Bundles are settled by an appended `/sync`.
    pub fn communicate(
        &self,
        requestable: &Requestable,
        timeout: Duration,
    ) -> Result<Option<Response>, CorrelatorError> {
        let (requestable, patterns) = self.prepare(requestable);
        let Some(patterns) = patterns else {
            self.send(&requestable)?;
            return Ok(None);
        };

        let slot: Arc<(Mutex<Option<OscMessage>>, Condvar)> =
            Arc::new((Mutex::new(None), Condvar::new()));
        let callback_slot = slot.clone();
        let handle = self.register(
            patterns.success.clone(),
            patterns.failure.clone(),
            move |message: &OscMessage| {
                let (reply, ready) = &*callback_slot;
                *lock(reply) = Some(message.clone());
                ready.notify_all();
            },
            true,
        );

        if let Err(error) = self.send(&requestable) {
            self.unregister(handle);
            return Err(error);
        }

        let deadline = Instant::now() + timeout;
        let (reply, ready) = &*slot;
        let mut guard = lock(reply);
        while guard.is_none() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            guard = ready
                .wait_timeout(guard, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        let message = guard.take();
        drop(guard);

        let Some(message) = message else {
            self.unregister(handle);
            return Err(CorrelatorError::Timeout {
                pattern: patterns.success.to_string(),
                timeout,
            });
        };
        Ok(Some(Response::from_message(&message)?))
    }

    /// Splits `requests` into bundles that fit one datagram each (leaving
    /// room for the trailing `/sync`) and communicates them in order.
    pub fn communicate_partitioned(
        &self,
        requests: Vec<Requestable>,
        time_tag: TimeTag,
        timeout: Duration,
    ) -> Result<Vec<Response>, CorrelatorError> {
        let bundles = self.partition(requests, time_tag);
        let mut responses = Vec::with_capacity(bundles.len());
        for bundle in bundles {
            if let Some(response) = self.communicate(&Requestable::Bundle(bundle), timeout)? {
                responses.push(response);
            }
        }
        Ok(responses)
    }

    pub(crate) fn partition(&self, requests: Vec<Requestable>, time_tag: TimeTag) -> Vec<RequestBundle> {
        RequestBundle::partition(
            requests,
            time_tag,
            self.max_datagram_size.saturating_sub(SYNC_ELEMENT_SIZE),
        )
    }

    /// Appends the `/sync` that settles a bundle, or reads a request's own
    /// reply patterns.
    pub(crate) fn prepare(&self, requestable: &Requestable) -> (Requestable, Option<ReplyPatterns>) {
        match requestable {
            Requestable::Request(request) => (requestable.clone(), request.reply_patterns()),
            Requestable::Bundle(bundle) => {
                let sync_id = self.next_sync_id();
                let sync = Request::Server(ServerRequest::Sync { sync_id });
                let patterns = sync.reply_patterns();
                let mut bundle = bundle.clone();
                bundle.push(sync);
                (Requestable::Bundle(bundle), patterns)
            }
        }
    }

    fn record(&self, direction: CaptureDirection, packet: &OscPacket) {
        let mut captures = lock(&self.captures);
        if captures.is_empty() {
            return;
        }
        captures.retain(|capture| capture.strong_count() > 0);
        let timestamp = Instant::now();
        for capture in captures.iter().filter_map(Weak::upgrade) {
            lock(&capture).push(CaptureEntry {
                timestamp,
                direction,
                packet: packet.clone(),
            });
        }
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

cfg_if! {
    if #[cfg(feature = "async_server")] {
        impl Correlator {
            /// Async counterpart of [`Correlator::communicate`]. Dropping the
            /// returned future unregisters the pending reply.
            pub async fn communicate_async(
                &self,
                requestable: &Requestable,
                timeout: Duration,
            ) -> Result<Option<Response>, CorrelatorError> {
                let (requestable, patterns) = self.prepare(requestable);
                let Some(patterns) = patterns else {
                    self.send(&requestable)?;
                    return Ok(None);
                };

                let (reply_sender, reply_receiver) = tokio::sync::oneshot::channel::<OscMessage>();
                let reply_sender = Mutex::new(Some(reply_sender));
                let handle = self.register(
                    patterns.success.clone(),
                    patterns.failure.clone(),
                    move |message: &OscMessage| {
                        if let Some(reply_sender) = lock(&reply_sender).take() {
                            let _ = reply_sender.send(message.clone());
                        }
                    },
                    true,
                );
                let guard = RegistrationGuard { correlator: self, handle };

                self.send(&requestable)?;

                let pattern = patterns.success.to_string();
                let message = match tokio::time::timeout(timeout, reply_receiver).await {
                    Ok(Ok(message)) => message,
                    Ok(Err(_)) => return Err(CorrelatorError::Cancelled { pattern }),
                    Err(_) => return Err(CorrelatorError::Timeout { pattern, timeout }),
                };
                drop(guard);
                Ok(Some(Response::from_message(&message)?))
            }

            pub async fn communicate_partitioned_async(
                &self,
                requests: Vec<Requestable>,
                time_tag: TimeTag,
                timeout: Duration,
            ) -> Result<Vec<Response>, CorrelatorError> {
                let bundles = self.partition(requests, time_tag);
                let mut responses = Vec::with_capacity(bundles.len());
                for bundle in bundles {
                    let requestable = Requestable::Bundle(bundle);
                    if let Some(response) = self.communicate_async(&requestable, timeout).await? {
                        responses.push(response);
                    }
                }
                Ok(responses)
            }
        }

        /// Unregisters a pending reply when the waiting future goes away
        struct RegistrationGuard<'a> {
            correlator: &'a Correlator,
            handle: CallbackHandle,
        }

        impl Drop for RegistrationGuard<'_> {
            fn drop(&mut self) {
                self.correlator.unregister(self.handle);
            }
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
