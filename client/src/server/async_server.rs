use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use log::{info, warn};
use tokio::task::JoinHandle;

use synthctl_shared::{
    AddAction, BufferId, BusId, CalculationRate, ClientId, Controls, NodeId, QueryTreeGroup,
    Requestable, Response, ServerOptions, ServerRequest, StatusInfo, TimeTag,
};

use crate::{
    correlator::capture::Capture,
    node_tree::node_tree::NodeTree,
    transport::{PacketReceiver, Socket},
};

use super::{
    boot_status::BootStatus,
    client_config::ClientConfig,
    server_core::{ServerCore, WatchStep},
    error::ServerError,
    process::{ProcessError, ProcessLauncher},
    registry::ServerRegistry,
    session::BusGroup,
};

const WATCH_SLICE: Duration = Duration::from_millis(10);

/// Proxy for one engine driven by tokio tasks
///
/// Same operations as [`Server`](crate::Server); waiting for a reply
/// suspends only the calling task. Must be used from within a tokio runtime.
pub struct AsyncServer {
    core: Arc<ServerCore>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AsyncServer {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_registry(config, ServerRegistry::global())
    }

    pub fn with_registry(config: ClientConfig, registry: Arc<ServerRegistry>) -> Self {
        Self {
            core: ServerCore::new(config, registry),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn core(&self) -> &Arc<ServerCore> {
        &self.core
    }

    // Lifecycle

    pub async fn boot<S: Into<Box<dyn Socket>>>(
        &self,
        options: ServerOptions,
        mut launcher: Box<dyn ProcessLauncher>,
        socket: S,
    ) -> Result<(), ServerError> {
        options.validate()?;
        self.core.mark_booting()?;
        self.join_tasks().await;
        info!("Booting engine on port {}", options.port);

        let boot_options = options.clone();
        let timeout = self.core.config().boot_timeout;
        let booted = tokio::task::spawn_blocking(move || {
            let result = launcher.boot(&boot_options, timeout);
            (launcher, result)
        })
        .await;
        let launcher = match booted {
            Ok((launcher, Ok(()))) => launcher,
            Ok((_, Err(error))) => {
                self.core.mark_offline();
                return Err(error.into());
            }
            Err(error) => {
                self.core.mark_offline();
                return Err(ProcessError::Spawn {
                    executable: options.executable.clone(),
                    reason: error.to_string(),
                }
                .into());
            }
        };
        self.core.adopt_process(launcher);
        self.establish(options, socket.into()).await
    }

    pub async fn connect<S: Into<Box<dyn Socket>>>(
        &self,
        options: ServerOptions,
        socket: S,
    ) -> Result<(), ServerError> {
        options.validate()?;
        self.core.mark_booting()?;
        self.join_tasks().await;
        self.establish(options, socket.into()).await
    }

    async fn establish(&self, options: ServerOptions, socket: Box<dyn Socket>) -> Result<(), ServerError> {
        let receiver = match self.core.attach(socket) {
            Ok(receiver) => receiver,
            Err(error) => {
                self.core.abort_connect();
                return Err(error);
            }
        };
        self.spawn_pump(receiver);

        let notify: Requestable = ServerRequest::Notify { enabled: true }.into();
        let result = self
            .core
            .correlator()
            .communicate_async(&notify, self.core.config().request_timeout)
            .await;
        let connected = self
            .core
            .interpret_notify(result)
            .and_then(|(client_id, maximum_logins)| {
                self.core.finish_connect(client_id, maximum_logins, options)
            });
        if let Err(error) = connected {
            warn!("Connect failed: {}", error);
            self.core.abort_connect();
            self.join_tasks().await;
            return Err(error);
        }

        if self.core.start_watcher() {
            self.spawn_watcher();
        }
        Ok(())
    }

    fn spawn_pump(&self, mut receiver: Box<dyn PacketReceiver>) {
        let core = self.core.clone();
        let poll_interval = core.config().receive_poll_interval;
        let task = tokio::spawn(async move {
            while core.pump_active() {
                if !core.pump_once(receiver.as_mut()) {
                    tokio::time::sleep(poll_interval).await;
                }
            }
        });
        self.tasks().push(task);
    }

    fn spawn_watcher(&self) {
        let core = self.core.clone();
        let task = tokio::spawn(async move {
            while core.watcher_active() {
                match core.watch_tick(Instant::now()) {
                    WatchStep::GiveUp => {
                        if core.watcher_active() {
                            core.shutdown();
                        }
                        return;
                    }
                    WatchStep::Wait(wait) => tokio::time::sleep(wait.min(WATCH_SLICE)).await,
                }
            }
        });
        self.tasks().push(task);
    }

    pub async fn quit(&self, force: bool) -> Result<(), ServerError> {
        self.core.check_quit(force)?;
        self.core.begin_teardown()?;
        let quit: Requestable = ServerRequest::Quit.into();
        let result = self
            .core
            .correlator()
            .communicate_async(&quit, self.core.config().quit_timeout)
            .await;
        if let Err(error) = result {
            warn!("Engine did not confirm quit: {}", error);
        }
        self.core.finish_teardown();
        self.join_tasks().await;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), ServerError> {
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
        self.join_tasks().await;
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.core.shutdown();
        self.join_tasks().await;
    }

    async fn join_tasks(&self) {
        let tasks: Vec<JoinHandle<()>> = self.tasks().drain(..).collect();
        for task in tasks {
            if let Err(error) = task.await {
                if error.is_panic() {
                    warn!("Background task panicked");
                }
            }
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
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

    pub fn status(&self) -> Option<StatusInfo> {
        self.core.status()
    }

    pub fn with_node_tree<R>(&self, f: impl FnOnce(&NodeTree) -> R) -> Result<R, ServerError> {
        self.core.with_node_tree(f)
    }

    pub fn capture(&self) -> Capture {
        self.core.correlator().capture()
    }

    // Requests

    pub fn send(&self, requestable: impl Into<Requestable>) -> Result<(), ServerError> {
        self.core.send(&requestable.into())
    }

    pub async fn communicate(
        &self,
        requestable: impl Into<Requestable>,
        timeout: Option<Duration>,
    ) -> Result<Option<Response>, ServerError> {
        let requestable = requestable.into();
        self.core.apply_local(&requestable)?;
        let result = self
            .core
            .correlator()
            .communicate_async(&requestable, self.core.request_timeout(timeout))
            .await;
        self.core.settle(result)
    }

    pub async fn communicate_many(
        &self,
        requests: Vec<Requestable>,
        timeout: Option<Duration>,
    ) -> Result<Vec<Response>, ServerError> {
        for request in &requests {
            self.core.apply_local(request)?;
        }
        let responses = self
            .core
            .correlator()
            .communicate_partitioned_async(requests, TimeTag::Immediately, self.core.request_timeout(timeout))
            .await?;
        Ok(responses)
    }

    pub async fn sync(&self) -> Result<(), ServerError> {
        let request = self.core.sync_request()?;
        let result = self
            .core
            .correlator()
            .communicate_async(&request, self.core.config().request_timeout)
            .await;
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

    pub async fn query_tree(
        &self,
        group_id: NodeId,
        include_controls: bool,
    ) -> Result<Option<QueryTreeGroup>, ServerError> {
        let request = self.core.query_tree_request(group_id, include_controls)?;
        let result = self
            .core
            .correlator()
            .communicate_async(&request, self.core.config().request_timeout)
            .await;
        self.core.settle_query_tree(result)
    }

    // Buffers and buses

    pub async fn add_buffer(&self, frame_count: i32, channel_count: i32) -> Result<BufferId, ServerError> {
        let (buffer, request) = self.core.begin_add_buffer(frame_count, channel_count)?;
        let result = self
            .core
            .correlator()
            .communicate_async(&request, self.core.config().request_timeout)
            .await;
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

    pub async fn get_control_buses(
        &self,
        bus_ids: Vec<BusId>,
    ) -> Result<Option<Vec<(BusId, f32)>>, ServerError> {
        let request = self.core.control_get_request(bus_ids)?;
        let result = self
            .core
            .correlator()
            .communicate_async(&request, self.core.config().request_timeout)
            .await;
        self.core.settle_control_buses(result)
    }

    pub async fn send_synthdef(&self, payload: Vec<u8>) -> Result<Option<Response>, ServerError> {
        let request = self.core.synthdef_request(payload)?;
        let result = self
            .core
            .correlator()
            .communicate_async(&request, self.core.config().request_timeout)
            .await;
        self.core.settle(result)
    }
}

impl Drop for AsyncServer {
    fn drop(&mut self) {
        self.core.shutdown();
        for task in self.tasks().drain(..) {
            task.abort();
        }
    }
}
