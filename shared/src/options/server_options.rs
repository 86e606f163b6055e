use std::ops::Range;

use crate::constants::{DEFAULT_INITIAL_NODE_ID, DEFAULT_PORT, NODE_ID_SLOT_BITS};
use crate::types::{BufferId, BusId, ClientId, SyncId};

use super::error::OptionsError;

/// Engine boot options
///
/// Also the source of truth for how the engine's id spaces are split between
/// clients sharing one server.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerOptions {
    /// Engine executable, resolved through `PATH` when not absolute
    pub executable: String,
    pub ip_address: String,
    /// UDP port the engine listens on
    pub port: u16,
    pub audio_bus_channel_count: i32,
    pub control_bus_channel_count: i32,
    pub buffer_count: i32,
    pub input_bus_channel_count: i32,
    pub output_bus_channel_count: i32,
    pub block_size: i32,
    pub hardware_buffer_size: Option<i32>,
    pub hardware_sample_rate: Option<i32>,
    /// First ephemeral node id; lower ids form the permanent pool
    pub initial_node_id: i32,
    /// Number of clients that may be connected at once
    pub maximum_logins: i32,
    pub maximum_node_count: i32,
    pub maximum_synthdef_count: i32,
    /// Real-time memory pool, in kilobytes
    pub memory_size: i32,
    pub random_number_generator_count: i32,
    pub wire_buffer_count: i32,
    /// Load synth definitions from disk on boot
    pub load_synthdefs: bool,
    /// Publish the engine over zeroconf
    pub zero_configuration: bool,
    pub password: Option<String>,
    pub restricted_path: Option<String>,
    pub ugen_plugins_path: Option<String>,
    pub verbosity: i32,
    /// Worker thread count (supernova only)
    pub threads: Option<i32>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            executable: "scsynth".to_string(),
            ip_address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            audio_bus_channel_count: 1024,
            control_bus_channel_count: 16384,
            buffer_count: 1024,
            input_bus_channel_count: 8,
            output_bus_channel_count: 8,
            block_size: 64,
            hardware_buffer_size: None,
            hardware_sample_rate: None,
            initial_node_id: DEFAULT_INITIAL_NODE_ID,
            maximum_logins: 1,
            maximum_node_count: 1024,
            maximum_synthdef_count: 1024,
            memory_size: 8192,
            random_number_generator_count: 64,
            wire_buffer_count: 64,
            load_synthdefs: true,
            zero_configuration: false,
            password: None,
            restricted_path: None,
            ugen_plugins_path: None,
            verbosity: 0,
            threads: None,
        }
    }
}

impl ServerOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        let hardware_channel_count = self.first_private_bus_id();
        if self.audio_bus_channel_count < hardware_channel_count {
            return Err(OptionsError::TooFewAudioBuses {
                audio_bus_channel_count: self.audio_bus_channel_count,
                hardware_channel_count,
            });
        }
        if !(1..=32).contains(&self.maximum_logins) {
            return Err(OptionsError::InvalidMaximumLogins {
                maximum_logins: self.maximum_logins,
            });
        }
        if self.initial_node_id < 1 {
            return Err(OptionsError::InvalidInitialNodeId {
                initial_node_id: self.initial_node_id,
            });
        }
        Ok(())
    }

    /// First audio bus not wired to hardware.
    pub fn first_private_bus_id(&self) -> BusId {
        self.input_bus_channel_count + self.output_bus_channel_count
    }

    pub fn private_audio_bus_channel_count(&self) -> i32 {
        self.audio_bus_channel_count - self.first_private_bus_id()
    }

    /// Private audio buses reserved for `client_id`.
    pub fn audio_bus_ids(&self, client_id: ClientId) -> Range<BusId> {
        let per_client = self.private_audio_bus_channel_count() / self.logins();
        let first = self.first_private_bus_id();
        let client_id = i32::from(client_id);
        (first + client_id * per_client)..(first + (client_id + 1) * per_client)
    }

    pub fn buffer_ids(&self, client_id: ClientId) -> Range<BufferId> {
        Self::client_slice(self.buffer_count / self.logins(), client_id)
    }

    pub fn control_bus_ids(&self, client_id: ClientId) -> Range<BusId> {
        Self::client_slice(self.control_bus_channel_count / self.logins(), client_id)
    }

    pub fn sync_ids(&self, client_id: ClientId) -> Range<SyncId> {
        let client_id = i32::from(client_id);
        (client_id << NODE_ID_SLOT_BITS)..((client_id + 1) << NODE_ID_SLOT_BITS)
    }

    /// Command line for launching the engine, executable first.
    pub fn serialize(&self) -> Vec<String> {
        let defaults = ServerOptions::default();
        let mut arguments = vec![self.executable.clone(), "-u".to_string(), self.port.to_string()];
        let mut push = |flag: &str, value: String| {
            arguments.push(flag.to_string());
            arguments.push(value);
        };
        if self.maximum_logins != defaults.maximum_logins {
            push("-l", self.maximum_logins.to_string());
        }
        if let Some(password) = &self.password {
            push("-p", password.clone());
        }
        if self.audio_bus_channel_count != defaults.audio_bus_channel_count {
            push("-a", self.audio_bus_channel_count.to_string());
        }
        if self.buffer_count != defaults.buffer_count {
            push("-b", self.buffer_count.to_string());
        }
        if self.control_bus_channel_count != defaults.control_bus_channel_count {
            push("-c", self.control_bus_channel_count.to_string());
        }
        if self.maximum_synthdef_count != defaults.maximum_synthdef_count {
            push("-d", self.maximum_synthdef_count.to_string());
        }
        if self.input_bus_channel_count != defaults.input_bus_channel_count {
            push("-i", self.input_bus_channel_count.to_string());
        }
        if self.output_bus_channel_count != defaults.output_bus_channel_count {
            push("-o", self.output_bus_channel_count.to_string());
        }
        if self.memory_size != defaults.memory_size {
            push("-m", self.memory_size.to_string());
        }
        if self.maximum_node_count != defaults.maximum_node_count {
            push("-n", self.maximum_node_count.to_string());
        }
        if self.random_number_generator_count != defaults.random_number_generator_count {
            push("-r", self.random_number_generator_count.to_string());
        }
        if self.wire_buffer_count != defaults.wire_buffer_count {
            push("-w", self.wire_buffer_count.to_string());
        }
        if self.block_size != defaults.block_size {
            push("-z", self.block_size.to_string());
        }
        if let Some(size) = self.hardware_buffer_size {
            push("-Z", size.to_string());
        }
        if let Some(rate) = self.hardware_sample_rate {
            push("-S", rate.to_string());
        }
        if !self.load_synthdefs {
            push("-D", "0".to_string());
        }
        if !self.zero_configuration {
            push("-R", "0".to_string());
        }
        if let Some(path) = &self.restricted_path {
            push("-P", path.clone());
        }
        if let Some(path) = &self.ugen_plugins_path {
            push("-U", path.clone());
        }
        if self.verbosity != defaults.verbosity {
            push("-V", self.verbosity.to_string());
        }
        if let Some(threads) = self.threads {
            push("-T", threads.to_string());
        }
        arguments
    }

    fn logins(&self) -> i32 {
        self.maximum_logins.max(1)
    }

    fn client_slice(per_client: i32, client_id: ClientId) -> Range<i32> {
        let client_id = i32::from(client_id);
        (client_id * per_client)..((client_id + 1) * per_client)
    }
}
