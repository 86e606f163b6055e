use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{info, warn};

use synthctl_shared::{
    AddAction, BufferId, BusId, CalculationRate, ClientId, Controls, NodeId, QueryTreeGroup,
    Requestable, Response, ServerOptions, ServerRequest, StatusInfo, TimeTag,
};

use crate::{
    correlator::capture::Capture, node_tree::node_tree::NodeTree, transport::Socket,
};

use super::{
    boot_status::BootStatus, client_config::ClientConfig, error::ServerError, server_core::ServerCore,
    process::ProcessLauncher, registry::ServerRegistry, session::BusGroup,
};

/// Blocking proxy for one engine
///
/// Inbound datagrams are pumped on a background thread and the status
/// watcher runs on another. Calls that wait for a reply block only the
/// calling thread. All methods take `&self`, so a `Server` can be shared
/// behind an `Arc`.
pub struct Server {
    core: Arc<ServerCore>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Server {
    /// Create a new Server proxy registered in the process-wide registry
    pub fn new(config: ClientConfig) -> Self {
        Self::with_registry(config, ServerRegistry::global())
    }

    pub fn with_registry(config: ClientConfig, registry: Arc<ServerRegistry>) -> Self {
        Self {
            core: ServerCore::new(config, registry),
            threads: Mutex::new(Vec::new()),
        }
    }

    pub fn core(&self) -> &Arc<ServerCore> {
        &self.core
    }

    // Lifecycle

    /// Launches an engine with `options`, then connects to it. The proxy
    /// owns the process and terminates it on quit.
    pub fn boot<S: Into<Box<dyn Socket>>>(
        &self,
        options: ServerOptions,
        mut launcher: Box<dyn ProcessLauncher>,
        socket: S,
    ) -> Result<(), ServerError> {
        options.validate()?;
        self.core.mark_booting()?;
        self.join_threads();
        info!("Booting engine on port {}", options.port);
        if let Err(error) = launcher.boot(&options, self.core.config().boot_timeout) {
            self.core.mark_offline();
            return Err(error.into());
        }
        self.core.adopt_process(launcher);
        self.establish(options, socket.into())
    }

    /// Logs into an engine that is already running.
    pub fn connect<S: Into<Box<dyn Socket>>>(&self, options: ServerOptions, socket: S) -> Result<(), ServerError> {
        options.validate()?;
        self.core.mark_booting()?;
        self.join_threads();
        self.establish(options, socket.into())
    }

    fn establish(&self, options: ServerOptions, socket: Box<dyn Socket>) -> Result<(), ServerError> {
        let receiver = match self.core.attach(socket) {
            Ok(receiver) => receiver,
            Err(error) => {
                self.core.abort_connect();
                return Err(error);
            }
        };
        let core = self.core.clone();
        self.spawn("synthctl-pump", move || core.run_pump(receiver));

        let notify: Requestable = ServerRequest::Notify { enabled: true }.into();
        let result = self
            .core
            .correlator()
            .communicate(&notify, self.core.config().request_timeout);
        let connected = self
            .core
            .interpret_notify(result)
            .and_then(|(client_id, maximum_logins)| {
                self.core.finish_connect(client_id, maximum_logins, options)
            });
        if let Err(error) = connected {
            warn!("Connect failed: {}", error);
            self.core.abort_connect();
            self.join_threads();
            return Err(error);
        }

        if self.core.start_watcher() {
            let core = self.core.clone();
            self.spawn("synthctl-watcher", move || core.run_watcher());
        }
        Ok(())
    }

    /// Quits the engine. Without `force`, only the proxy that booted the
    /// engine may do this.
    pub fn quit(&self, force: bool) -> Result<(), ServerError> {
        self.core.check_quit(force)?;
        self.core.begin_teardown()?;
        let quit: Requestable = ServerRequest::Quit.into();
        let result = self
            .core
            .correlator()
            .communicate(&quit, self.core.config().quit_timeout);
        if let Err(error) = result {
            warn!("Engine did not confirm quit: {}", error);
        }
        self.core.finish_teardown();
        self.join_threads();
        Ok(())
    }

    /// Logs out of an engine this proxy did not boot.
    pub fn disconnect(&self) -> Result<(), ServerError> {
        self.core.check_disconnect()?;
        self.core.begin_teardown()?;
        if let Err(error) = self
            .core
            .correlator()
            .send(&ServerRequest::Notify { enabled: false }.into())
        {
            warn!("{}", error);
        }
        self.core.finish_teardown();
        self.join_threads();
        Ok(())
    }

    /// Tears down immediately, whoever owns the engine.
    pub fn shutdown(&self) {
        self.core.shutdown();
        self.join_threads();
    }

    fn spawn<F: FnOnce() + Send + 'static>(&self, name: &str, body: F) {
        match thread::Builder::new().name(name.to_string()).spawn(body) {
            Ok(handle) => self.threads().push(handle),
            Err(error) => warn!("Could not spawn {}: {}", name, error),
        }
    }

    /// Joins finished background threads, skipping the calling thread.
    fn join_threads(&self) {
        let current = thread::current().id();
        let handles: Vec<JoinHandle<()>> = self.threads().drain(..).collect();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("Background thread panicked");
            }
        }
    }

    fn threads(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Accessors

    pub fn boot_status(&self) -> BootStatus {
        self.core.boot_status()
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    pub fn is_owner(&self) -> bool {
        self.core.is_owner()
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.core.server_addr()
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.core.client_id()
    }

    pub fn default_group(&self) -> Option<NodeId> {
        self.core.default_group()
    }

    /// Last engine status received by the watcher.
    pub fn status(&self) -> Option<StatusInfo> {
        self.core.status()
    }

    pub fn with_node_tree<R>(&self, f: impl FnOnce(&NodeTree) -> R) -> Result<R, ServerError> {
        self.core.with_node_tree(f)
    }

    /// Starts recording traffic until the returned handle is dropped.
    pub fn capture(&self) -> Capture {
        self.core.correlator().capture()
    }

    // Requests

    /// Sends without waiting. Node tree effects are applied first.
    pub fn send(&self, requestable: impl Into<Requestable>) -> Result<(), ServerError> {
        self.core.send(&requestable.into())
    }

    /// Sends and waits for the reply. A timeout is logged and yields `None`.
    pub fn communicate(
        &self,
        requestable: impl Into<Requestable>,
        timeout: Option<Duration>,
    ) -> Result<Option<Response>, ServerError> {
        let requestable = requestable.into();
        self.core.apply_local(&requestable)?;
        let result = self
            .core
            .correlator()
            .communicate(&requestable, self.core.request_timeout(timeout));
        self.core.settle(result)
    }

    /// Packs `requests` into as few datagrams as fit and waits for each in
    /// turn.
    pub fn communicate_many(
        &self,
        requests: Vec<Requestable>,
        timeout: Option<Duration>,
    ) -> Result<Vec<Response>, ServerError> {
        for request in &requests {
            self.core.apply_local(request)?;
        }
        let responses = self.core.correlator().communicate_partitioned(
            requests,
            TimeTag::Immediately,
            self.core.request_timeout(timeout),
        )?;
        Ok(responses)
    }

    /// Waits until the engine has processed everything sent before.
    pub fn sync(&self) -> Result<(), ServerError> {
        let request = self.core.sync_request()?;
        let result = self
            .core
            .correlator()
            .communicate(&request, self.core.config().request_timeout);
        self.core.settle_sync(result)
    }

    // Nodes

    pub fn add_group(&self, target_id: NodeId, add_action: AddAction, permanent: bool) -> Result<NodeId, ServerError> {
        self.core.add_group(target_id, add_action, permanent)
    }

    pub fn add_synth(
        &self,
        target_id: NodeId,
        add_action: AddAction,
        synthdef: &str,
        controls: Controls,
    ) -> Result<NodeId, ServerError> {
        self.core.add_synth(target_id, add_action, synthdef, controls, false)
    }

    pub fn free_node(&self, node_id: NodeId) -> Result<Vec<NodeId>, ServerError> {
        self.core.free_node(node_id)
    }

    pub fn pause_node(&self, node_id: NodeId) -> Result<(), ServerError> {
        self.core.set_node_paused(node_id, true)
    }

    pub fn unpause_node(&self, node_id: NodeId) -> Result<(), ServerError> {
        self.core.set_node_paused(node_id, false)
    }

    pub fn move_node(&self, node_id: NodeId, add_action: AddAction, target_id: NodeId) -> Result<(), ServerError> {
        self.core.move_node(node_id, add_action, target_id)
    }

    pub fn set_node_controls(&self, node_id: NodeId, controls: &Controls) -> Result<(), ServerError> {
        self.core.set_node_controls(node_id, controls)
    }

    /// Asks the engine for its view of a group.
    pub fn query_tree(&self, group_id: NodeId, include_controls: bool) -> Result<Option<QueryTreeGroup>, ServerError> {
        let request = self.core.query_tree_request(group_id, include_controls)?;
        let result = self
            .core
            .correlator()
            .communicate(&request, self.core.config().request_timeout);
        self.core.settle_query_tree(result)
    }

    // Buffers and buses

    /// Allocates a buffer and waits for the engine to confirm it.
    pub fn add_buffer(&self, frame_count: i32, channel_count: i32) -> Result<BufferId, ServerError> {
        let (buffer, request) = self.core.begin_add_buffer(frame_count, channel_count)?;
        let result = self
            .core
            .correlator()
            .communicate(&request, self.core.config().request_timeout);
        self.core.finish_add_buffer(buffer, result)
    }

    pub fn free_buffer(&self, buffer_id: BufferId) -> Result<(), ServerError> {
        self.core.free_buffer(buffer_id)
    }

    pub fn add_bus_group(&self, rate: CalculationRate, count: usize) -> Result<BusGroup, ServerError> {
        self.core.add_bus_group(rate, count)
    }

    pub fn free_bus_group(&self, rate: CalculationRate, bus_id: BusId) -> Result<(), ServerError> {
        self.core.free_bus_group(rate, bus_id)
    }

    pub fn set_control_buses(&self, items: Vec<(BusId, f32)>) -> Result<(), ServerError> {
        self.core.set_control_buses(items)
    }

    /// Reads control bus values. `None` when the engine did not answer.
    pub fn get_control_buses(&self, bus_ids: Vec<BusId>) -> Result<Option<Vec<(BusId, f32)>>, ServerError> {
        let request = self.core.control_get_request(bus_ids)?;
        let result = self
            .core
            .correlator()
            .communicate(&request, self.core.config().request_timeout);
        self.core.settle_control_buses(result)
    }

    /// Uploads a compiled synth definition and waits for `/done /d_recv`.
    pub fn send_synthdef(&self, payload: Vec<u8>) -> Result<Option<Response>, ServerError> {
        let request = self.core.synthdef_request(payload)?;
        let result = self
            .core
            .correlator()
            .communicate(&request, self.core.config().request_timeout);
        self.core.settle(result)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}
