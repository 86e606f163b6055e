use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use synthctl_shared::{
    AddAction, BufferId, BufferRequest, BusId, BusRequest, CalculationRate, ClientId, Controls,
    GroupRequest, NodeAction, NodeId, OscMessage, Pattern, QueryTreeGroup, Requestable, Response,
    ServerOptions, ServerRequest, StatusInfo, SynthDefRequest, NODE_ID_SLOT_BITS,
};

use crate::{
    correlator::{callback_table::CallbackHandle, correlator::Correlator, error::CorrelatorError},
    node_tree::node_tree::NodeTree,
    transport::{PacketReceiver, Socket},
};

use super::{
    boot_status::BootStatus,
    client_config::ClientConfig,
    error::ServerError,
    health_check::{HealthAction, HealthMonitor},
    process::ProcessLauncher,
    registry::{RegistryEntry, ServerRegistry},
    session::{Buffer, BusGroup, Session},
};

/// Longest single sleep of the blocking watcher loop
const WATCH_SLICE: Duration = Duration::from_millis(10);

/// What the status watcher should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchStep {
    Wait(Duration),
    GiveUp,
}

struct CoreState {
    boot_status: BootStatus,
    server_addr: Option<SocketAddr>,
    process: Option<Box<dyn ProcessLauncher>>,
    handlers: Vec<CallbackHandle>,
}

/// State and behavior shared by [`Server`](crate::Server) and the async
/// proxy
///
/// Holds the correlator, the login session and the lifecycle state. The
/// wrappers only differ in how they wait: blocking threads or tokio tasks.
/// The session lock is never held while waiting on a reply.
pub struct ServerCore {
    config: ClientConfig,
    registry: Arc<ServerRegistry>,
    correlator: Arc<Correlator>,
    state: Mutex<CoreState>,
    session: Mutex<Option<Session>>,
    last_status: Mutex<Option<StatusInfo>>,
    monitor: Mutex<Option<HealthMonitor>>,
    pump_running: AtomicBool,
    watcher_running: AtomicBool,
    self_ref: Weak<ServerCore>,
}

impl ServerCore {
    pub(crate) fn new(config: ClientConfig, registry: Arc<ServerRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            config,
            registry,
            correlator: Arc::new(Correlator::new()),
            state: Mutex::new(CoreState {
                boot_status: BootStatus::Offline,
                server_addr: None,
                process: None,
                handlers: Vec::new(),
            }),
            session: Mutex::new(None),
            last_status: Mutex::new(None),
            monitor: Mutex::new(None),
            pump_running: AtomicBool::new(false),
            watcher_running: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        })
    }

    // Accessors

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn boot_status(&self) -> BootStatus {
        self.state().boot_status
    }

    pub fn is_running(&self) -> bool {
        self.boot_status() == BootStatus::Online
    }

    /// Whether this proxy launched the engine process.
    pub fn is_owner(&self) -> bool {
        self.state().process.is_some()
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.state().server_addr
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.session().as_ref().map(Session::client_id)
    }

    pub fn default_group(&self) -> Option<NodeId> {
        self.session().as_ref().map(Session::default_group)
    }

    /// Last `/status.reply` seen.
    pub fn status(&self) -> Option<StatusInfo> {
        *lock(&self.last_status)
    }

    /// Runs `f` against the live session.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Result<R, ServerError> {
        let mut session = self.session();
        let session = session.as_mut().ok_or(ServerError::Offline)?;
        Ok(f(session))
    }

    pub fn with_node_tree<R>(&self, f: impl FnOnce(&NodeTree) -> R) -> Result<R, ServerError> {
        self.with_session(|session| f(session.node_tree()))
    }

    pub(crate) fn pump_active(&self) -> bool {
        self.pump_running.load(Ordering::SeqCst)
    }

    pub(crate) fn watcher_active(&self) -> bool {
        self.watcher_running.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, CoreState> {
        lock(&self.state)
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        lock(&self.session)
    }

    // Boot and connect

    /// Moves Offline to Booting, or reports what the proxy is doing instead.
    pub(crate) fn mark_booting(&self) -> Result<(), ServerError> {
        let mut state = self.state();
        if state.boot_status != BootStatus::Offline {
            return Err(ServerError::AlreadyRunning {
                status: state.boot_status,
            });
        }
        state.boot_status = BootStatus::Booting;
        Ok(())
    }

    pub(crate) fn mark_offline(&self) {
        self.state().boot_status = BootStatus::Offline;
    }

    pub(crate) fn adopt_process(&self, process: Box<dyn ProcessLauncher>) {
        self.state().process = Some(process);
    }

    /// Opens the transport, hands the outbound half to the correlator and
    /// installs the persistent notification handlers. The caller pumps the
    /// returned receiver.
    pub(crate) fn attach(&self, socket: Box<dyn Socket>) -> Result<Box<dyn PacketReceiver>, ServerError> {
        let addr = socket.server_addr();
        if self.registry.contains(&addr) {
            return Err(ServerError::AlreadyRegistered { addr });
        }
        let (sender, receiver) = socket.connect()?;
        self.correlator.attach(sender);
        let handlers = self.install_handlers();
        {
            let mut state = self.state();
            state.server_addr = Some(addr);
            state.handlers = handlers;
        }
        self.pump_running.store(true, Ordering::SeqCst);
        Ok(receiver)
    }

    /// Reads the `/notify` reply: the client id the engine assigned and its
    /// maximum login count.
    pub(crate) fn interpret_notify(
        &self,
        result: Result<Option<Response>, CorrelatorError>,
    ) -> Result<(ClientId, i32), ServerError> {
        let addr = self.server_addr().unwrap_or_else(unspecified_addr);
        let handshake_failed = |reason: String| ServerError::HandshakeFailed { addr, reason };
        match result {
            Ok(Some(Response::Done(done))) => {
                let client_id = done
                    .arguments
                    .first()
                    .and_then(|argument| argument.as_int())
                    .unwrap_or(0);
                let client_id = ClientId::try_from(client_id)
                    .map_err(|_| handshake_failed(format!("invalid client id {}", client_id)))?;
                let maximum_logins = done
                    .arguments
                    .get(1)
                    .and_then(|argument| argument.as_int())
                    .unwrap_or(1);
                Ok((client_id, maximum_logins))
            }
            Ok(Some(Response::Fail(fail))) => {
                warn!("Login refused by {}: {}", addr, fail.reason_text());
                Err(ServerError::TooManyClients)
            }
            Ok(Some(other)) => Err(handshake_failed(format!("unexpected reply {:?}", other))),
            Ok(None) => Err(handshake_failed("no reply pattern".to_string())),
            Err(CorrelatorError::Timeout { timeout, .. }) => {
                Err(handshake_failed(format!("no reply within {:?}", timeout)))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Builds the session once the engine accepted the login, creates the
    /// default groups when this is client 0, and registers the proxy.
    pub(crate) fn finish_connect(
        &self,
        client_id: ClientId,
        maximum_logins: i32,
        options: ServerOptions,
    ) -> Result<(), ServerError> {
        let options = ServerOptions {
            maximum_logins,
            ..options
        };
        let session = Session::new(client_id, options)?;
        self.correlator
            .reset_sync_ids(i32::from(client_id) << NODE_ID_SLOT_BITS);
        if client_id == 0 {
            self.correlator.send(&session.default_groups_request().into())?;
        }
        *self.session() = Some(session);

        let entry: Arc<dyn RegistryEntry> = match self.self_ref.upgrade() {
            Some(core) => core,
            None => return Err(ServerError::Offline),
        };
        self.registry.register(Arc::downgrade(&entry))?;

        *lock(&self.monitor) = Some(HealthMonitor::new(
            self.config.health_check.clone(),
            Instant::now(),
        ));
        self.state().boot_status = BootStatus::Online;
        info!(
            "Connected to {} as client {} of {}",
            entry.server_addr(),
            client_id,
            maximum_logins
        );
        Ok(())
    }

    /// Unwinds a connect that failed after `attach`.
    pub(crate) fn abort_connect(&self) {
        self.session().take();
        self.finish_teardown();
    }

    pub(crate) fn start_watcher(&self) -> bool {
        let active = self.config.health_check.active;
        self.watcher_running.store(active, Ordering::SeqCst);
        active
    }

    fn install_handlers(&self) -> Vec<CallbackHandle> {
        let mut handlers = Vec::new();

        handlers.push(self.correlator.register(
            Pattern::new("/fail"),
            None,
            |message: &OscMessage| warn!("Engine reported failure: {}", message),
            false,
        ));

        let core = self.self_ref.clone();
        handlers.push(self.correlator.register(
            Pattern::new("/status.reply"),
            None,
            move |message: &OscMessage| {
                if let Some(core) = core.upgrade() {
                    core.on_status_reply(message);
                }
            },
            false,
        ));

        for address in NodeAction::ADDRESSES {
            let core = self.self_ref.clone();
            handlers.push(self.correlator.register(
                Pattern::new(address),
                None,
                move |message: &OscMessage| {
                    if let Some(core) = core.upgrade() {
                        core.on_node_notification(message);
                    }
                },
                false,
            ));
        }
        handlers
    }

    fn on_status_reply(&self, message: &OscMessage) {
        match Response::from_message(message) {
            Ok(Response::Status(status)) => {
                *lock(&self.last_status) = Some(status);
                if let Some(monitor) = lock(&self.monitor).as_mut() {
                    monitor.on_reply(Instant::now());
                }
            }
            Ok(_) => {}
            Err(error) => warn!("Malformed /status.reply: {}", error),
        }
    }

    fn on_node_notification(&self, message: &OscMessage) {
        let info = match Response::from_message(message) {
            Ok(Response::Node(info)) => info,
            Ok(_) => return,
            Err(error) => {
                warn!("Malformed node notification: {}", error);
                return;
            }
        };
        let mut session = self.session();
        let Some(session) = session.as_mut() else {
            return;
        };
        if let Err(error) = session.node_tree_mut().handle_node_info(&info) {
            debug!("Ignoring {}: {}", message, error);
        }
    }

    // Inbound pump and status watcher

    /// Reads one datagram and dispatches it. Returns false when the socket
    /// had nothing to read.
    pub(crate) fn pump_once(&self, receiver: &mut dyn PacketReceiver) -> bool {
        match receiver.receive() {
            Ok(Some(payload)) => {
                self.correlator.receive_datagram(payload);
                true
            }
            Ok(None) => false,
            Err(error) => {
                warn!("{}", error);
                false
            }
        }
    }

    /// Blocking pump loop for the threaded proxy.
    pub(crate) fn run_pump(&self, mut receiver: Box<dyn PacketReceiver>) {
        while self.pump_active() {
            if !self.pump_once(receiver.as_mut()) {
                thread::sleep(self.config.receive_poll_interval);
            }
        }
        debug!("Inbound pump stopped");
    }

    /// Sends a `/status` when one is due and reports how long to wait.
    pub(crate) fn watch_tick(&self, now: Instant) -> WatchStep {
        let action = match lock(&self.monitor).as_mut() {
            Some(monitor) => (monitor.poll(now), monitor.until_due(now), monitor.attempts()),
            None => return WatchStep::GiveUp,
        };
        match action {
            (HealthAction::GiveUp, _, attempts) => {
                warn!("Engine missed {} status replies", attempts);
                WatchStep::GiveUp
            }
            (HealthAction::SendStatus, wait, _) => {
                if let Err(error) = self.correlator.send(&ServerRequest::Status.into()) {
                    warn!("Status poll failed: {}", error);
                }
                WatchStep::Wait(wait)
            }
            (HealthAction::Wait, wait, _) => WatchStep::Wait(wait),
        }
    }

    /// Blocking watcher loop for the threaded proxy.
    pub(crate) fn run_watcher(&self) {
        while self.watcher_active() {
            match self.watch_tick(Instant::now()) {
                WatchStep::GiveUp => {
                    if self.watcher_active() {
                        self.shutdown();
                    }
                    return;
                }
                WatchStep::Wait(wait) => thread::sleep(wait.min(WATCH_SLICE)),
            }
        }
    }

    // Teardown

    /// Marks the proxy as quitting, stops the watcher and drops the session
    /// with every mirror and allocator in it.
    pub(crate) fn begin_teardown(&self) -> Result<(), ServerError> {
        {
            let mut state = self.state();
            if state.boot_status != BootStatus::Online {
                return Err(ServerError::Offline);
            }
            state.boot_status = BootStatus::Quitting;
        }
        info!("Quitting");
        self.watcher_running.store(false, Ordering::SeqCst);
        if let Some(mut session) = self.session().take() {
            let released = session.release_all();
            debug!("Released {} mirrored nodes", released.len());
        }
        lock(&self.monitor).take();
        Ok(())
    }

    /// Terminates an owned process, stops the pump, detaches the transport
    /// and unregisters.
    pub(crate) fn finish_teardown(&self) {
        let (process, handlers, addr) = {
            let mut state = self.state();
            (
                state.process.take(),
                std::mem::take(&mut state.handlers),
                state.server_addr.take(),
            )
        };
        if let Some(mut process) = process {
            if let Err(error) = process.terminate() {
                warn!("{}", error);
            }
        }
        self.watcher_running.store(false, Ordering::SeqCst);
        self.pump_running.store(false, Ordering::SeqCst);
        for handle in handlers {
            self.correlator.unregister(handle);
        }
        self.correlator.detach();
        if let Some(addr) = addr {
            let entry: Weak<dyn RegistryEntry> = self.self_ref.clone();
            self.registry.unregister_entry(&addr, &entry);
        }
        self.state().boot_status = BootStatus::Offline;
        info!("Offline");
    }

    /// Checks whether `quit` may proceed for this proxy.
    pub(crate) fn check_quit(&self, force: bool) -> Result<(), ServerError> {
        if !self.is_running() {
            return Err(ServerError::Offline);
        }
        if !force && !self.is_owner() {
            return Err(ServerError::UnownedServerShutdown);
        }
        Ok(())
    }

    pub(crate) fn check_disconnect(&self) -> Result<(), ServerError> {
        if !self.is_running() {
            return Err(ServerError::Offline);
        }
        if self.is_owner() {
            return Err(ServerError::OwnedServerShutdown);
        }
        Ok(())
    }

    /// Tears down without waiting on the engine. Owned engines get a
    /// `/quit` before their process is terminated.
    pub fn shutdown(&self) {
        let owner = self.is_owner();
        if self.begin_teardown().is_err() {
            return;
        }
        let request = if owner {
            ServerRequest::Quit
        } else {
            ServerRequest::Notify { enabled: false }
        };
        if let Err(error) = self.correlator.send(&request.into()) {
            debug!("{}", error);
        }
        self.finish_teardown();
    }

    // Requests

    fn ensure_online(&self) -> Result<(), ServerError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(ServerError::Offline)
        }
    }

    /// Applies the local effects of `requestable` to the mirror. Conflicts
    /// are logged and the request still goes out.
    pub(crate) fn apply_local(&self, requestable: &Requestable) -> Result<(), ServerError> {
        self.ensure_online()?;
        let mut session = self.session();
        let session = session.as_mut().ok_or(ServerError::Offline)?;
        if let Err(error) = session.node_tree_mut().apply_local(requestable) {
            warn!("Node tree out of step with outgoing request: {}", error);
        }
        Ok(())
    }

    pub fn send(&self, requestable: &Requestable) -> Result<(), ServerError> {
        self.apply_local(requestable)?;
        self.correlator.send(requestable)?;
        Ok(())
    }

    pub(crate) fn request_timeout(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or(self.config.request_timeout)
    }

    /// Converts a correlator result into the proxy's: a timeout becomes a
    /// warning and `None`.
    pub(crate) fn settle(
        &self,
        result: Result<Option<Response>, CorrelatorError>,
    ) -> Result<Option<Response>, ServerError> {
        match result {
            Ok(response) => Ok(response),
            Err(CorrelatorError::Timeout { pattern, timeout }) => {
                warn!("No reply matching {} within {:?}", pattern, timeout);
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    pub(crate) fn sync_request(&self) -> Result<Requestable, ServerError> {
        self.ensure_online()?;
        Ok(ServerRequest::Sync {
            sync_id: self.correlator.next_sync_id(),
        }
        .into())
    }

    pub(crate) fn settle_sync(
        &self,
        result: Result<Option<Response>, CorrelatorError>,
    ) -> Result<(), ServerError> {
        match result? {
            Some(Response::Synced(_)) => {
                // every /n_move sent before the sync has been pumped by now
                if let Err(error) = self.with_session(|session| session.node_tree_mut().forget_pending_moves()) {
                    debug!("Sync settled without a session: {}", error);
                }
                Ok(())
            }
            None => Ok(()),
            Some(other) => Err(ServerError::CommandFailed {
                command: "/sync".to_string(),
                reason: format!("unexpected reply {:?}", other),
            }),
        }
    }

    // Nodes

    pub fn add_group(
        &self,
        target_id: NodeId,
        add_action: AddAction,
        permanent: bool,
    ) -> Result<NodeId, ServerError> {
        let (node_id, request) = self.with_online_tree(|tree| tree.add_group(target_id, add_action, permanent))??;
        self.correlator.send(&request.into())?;
        Ok(node_id)
    }

    pub fn add_synth(
        &self,
        target_id: NodeId,
        add_action: AddAction,
        synthdef: &str,
        controls: Controls,
        permanent: bool,
    ) -> Result<NodeId, ServerError> {
        let (node_id, request) = self.with_online_tree(|tree| {
            tree.add_synth(target_id, add_action, synthdef, controls, permanent)
        })??;
        self.correlator.send(&request.into())?;
        Ok(node_id)
    }

    /// Frees a node and everything below it. Returns the removed ids.
    pub fn free_node(&self, node_id: NodeId) -> Result<Vec<NodeId>, ServerError> {
        let (removed, request) = self.with_online_tree(|tree| tree.free(node_id))??;
        self.correlator.send(&request.into())?;
        Ok(removed)
    }

    pub fn set_node_paused(&self, node_id: NodeId, paused: bool) -> Result<(), ServerError> {
        let request = self.with_online_tree(|tree| tree.set_paused(node_id, paused))??;
        self.correlator.send(&request.into())?;
        Ok(())
    }

    pub fn move_node(
        &self,
        node_id: NodeId,
        add_action: AddAction,
        target_id: NodeId,
    ) -> Result<(), ServerError> {
        let request = self.with_online_tree(|tree| tree.move_node(node_id, add_action, target_id))??;
        self.correlator.send(&request.into())?;
        Ok(())
    }

    pub fn set_node_controls(&self, node_id: NodeId, controls: &Controls) -> Result<(), ServerError> {
        let request = self.with_online_tree(|tree| tree.set_controls(node_id, controls))??;
        self.correlator.send(&request.into())?;
        Ok(())
    }

    fn with_online_tree<R>(&self, f: impl FnOnce(&mut NodeTree) -> R) -> Result<R, ServerError> {
        self.ensure_online()?;
        self.with_session(|session| f(session.node_tree_mut()))
    }

    pub(crate) fn query_tree_request(
        &self,
        group_id: NodeId,
        include_controls: bool,
    ) -> Result<Requestable, ServerError> {
        self.ensure_online()?;
        Ok(GroupRequest::QueryTree {
            group_id,
            include_controls,
        }
        .into())
    }

    pub(crate) fn settle_query_tree(
        &self,
        result: Result<Option<Response>, CorrelatorError>,
    ) -> Result<Option<QueryTreeGroup>, ServerError> {
        Ok(match self.settle(result)? {
            Some(Response::QueryTree(tree)) => Some(tree),
            _ => None,
        })
    }

    // Buffers

    /// Reserves a buffer id and builds its `/b_alloc`.
    pub(crate) fn begin_add_buffer(
        &self,
        frame_count: i32,
        channel_count: i32,
    ) -> Result<(Buffer, Requestable), ServerError> {
        self.ensure_online()?;
        let buffer = self.with_session(|session| session.allocate_buffer(frame_count, channel_count))??;
        let request = BufferRequest::Allocate {
            buffer_id: buffer.buffer_id,
            frame_count,
            channel_count,
            completion: None,
        };
        Ok((buffer, request.into()))
    }

    /// Gives the id back if the engine refused the allocation.
    pub(crate) fn finish_add_buffer(
        &self,
        buffer: Buffer,
        result: Result<Option<Response>, CorrelatorError>,
    ) -> Result<BufferId, ServerError> {
        let response = match self.settle(result) {
            Ok(response) => response,
            Err(error) => {
                self.release_buffer(buffer.buffer_id);
                return Err(error);
            }
        };
        if let Some(Response::Fail(fail)) = response {
            self.release_buffer(buffer.buffer_id);
            return Err(ServerError::CommandFailed {
                command: fail.command.clone(),
                reason: fail.reason_text(),
            });
        }
        Ok(buffer.buffer_id)
    }

    fn release_buffer(&self, buffer_id: BufferId) {
        if let Err(error) = self.with_session(|session| session.free_buffer(buffer_id)) {
            debug!("{}", error);
        }
    }

    pub fn free_buffer(&self, buffer_id: BufferId) -> Result<(), ServerError> {
        self.ensure_online()?;
        self.with_session(|session| session.free_buffer(buffer_id))??;
        self.correlator.send(
            &BufferRequest::Free {
                buffer_id,
                completion: None,
            }
            .into(),
        )?;
        Ok(())
    }

    // Buses

    pub fn add_bus_group(&self, rate: CalculationRate, count: usize) -> Result<BusGroup, ServerError> {
        self.ensure_online()?;
        self.with_session(|session| session.allocate_bus_group(rate, count))?
    }

    pub fn free_bus_group(&self, rate: CalculationRate, bus_id: BusId) -> Result<(), ServerError> {
        self.ensure_online()?;
        self.with_session(|session| session.free_bus_group(rate, bus_id))??;
        Ok(())
    }

    pub fn set_control_buses(&self, items: Vec<(BusId, f32)>) -> Result<(), ServerError> {
        self.ensure_online()?;
        self.correlator.send(&BusRequest::ControlSet { items }.into())?;
        Ok(())
    }

    pub(crate) fn control_get_request(&self, bus_ids: Vec<BusId>) -> Result<Requestable, ServerError> {
        self.ensure_online()?;
        Ok(BusRequest::ControlGet { bus_ids }.into())
    }

    pub(crate) fn settle_control_buses(
        &self,
        result: Result<Option<Response>, CorrelatorError>,
    ) -> Result<Option<Vec<(BusId, f32)>>, ServerError> {
        Ok(match self.settle(result)? {
            Some(Response::ControlBusSet(info)) => Some(info.items),
            _ => None,
        })
    }

    // Synth definitions

    pub(crate) fn synthdef_request(&self, payload: Vec<u8>) -> Result<Requestable, ServerError> {
        self.ensure_online()?;
        Ok(SynthDefRequest::Receive {
            payload,
            completion: None,
        }
        .into())
    }
}

impl RegistryEntry for ServerCore {
    fn server_addr(&self) -> SocketAddr {
        ServerCore::server_addr(self).unwrap_or_else(unspecified_addr)
    }

    fn force_shutdown(&self) {
        self.shutdown();
    }
}

fn unspecified_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
