use std::path::PathBuf;

use crate::{Error, Result};

pub const DEFAULT_TRANSPORT_NAME: &str = "restaurant_orders_mq";
pub const DEFAULT_COUNTER_NAME: &str = "restaurant_total_shm";
pub const DEFAULT_GATE_NAME: &str = "restaurant_sem";
pub const DEFAULT_ADMISSION_CAPACITY: u32 = 3;
pub const DEFAULT_QUEUE_DEPTH: usize = 10;
pub const DEFAULT_MESSAGE_SIZE: usize = 256;
pub const DEFAULT_LOG_PATH: &str = "orders.log";
/// Owner read/write. Use 0o666 when submitters run as other users.
pub const DEFAULT_RESOURCE_MODE: u32 = 0o600;

/// Smallest record that can carry "<digit>:<char>".
pub const MIN_MESSAGE_SIZE: usize = 3;
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;
pub const MAX_QUEUE_DEPTH: usize = 64 * 1024;

/// Settings shared by the receiver and the submitters.
///
/// Both roles must agree on the three resource names. The capacity values are
/// only consulted by the receiver, which creates the resources; submitters
/// read the transport limits back from the shared header.
#[derive(Debug, Clone)]
pub struct Config {
    pub transport_name: String,
    pub counter_name: String,
    pub gate_name: String,
    pub admission_capacity: u32,
    pub queue_depth: usize,
    pub message_size: usize,
    pub log_path: PathBuf,
    /// Permission bits for the transport, counter and gate the receiver creates.
    pub resource_mode: u32,
    /// Fail startup instead of running without admission control when the
    /// gate cannot be created or opened. Applies to both roles.
    pub strict_admission: bool,
    /// Submitters read the shared counter before sending.
    pub peek_counter: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport_name: DEFAULT_TRANSPORT_NAME.to_string(),
            counter_name: DEFAULT_COUNTER_NAME.to_string(),
            gate_name: DEFAULT_GATE_NAME.to_string(),
            admission_capacity: DEFAULT_ADMISSION_CAPACITY,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            message_size: DEFAULT_MESSAGE_SIZE,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            resource_mode: DEFAULT_RESOURCE_MODE,
            strict_admission: false,
            peek_counter: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suffix every resource name with `tag`, so several systems can share a host.
    pub fn scoped(mut self, tag: &str) -> Self {
        self.transport_name = format!("{}_{tag}", self.transport_name);
        self.counter_name = format!("{}_{tag}", self.counter_name);
        self.gate_name = format!("{}_{tag}", self.gate_name);
        self
    }

    pub fn with_transport_name(mut self, name: impl Into<String>) -> Self {
        self.transport_name = name.into();
        self
    }

    pub fn with_counter_name(mut self, name: impl Into<String>) -> Self {
        self.counter_name = name.into();
        self
    }

    pub fn with_gate_name(mut self, name: impl Into<String>) -> Self {
        self.gate_name = name.into();
        self
    }

    pub fn with_admission_capacity(mut self, capacity: u32) -> Self {
        self.admission_capacity = capacity;
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn with_message_size(mut self, size: usize) -> Self {
        self.message_size = size;
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    pub fn with_resource_mode(mut self, mode: u32) -> Self {
        self.resource_mode = mode;
        self
    }

    pub fn with_strict_admission(mut self, strict: bool) -> Self {
        self.strict_admission = strict;
        self
    }

    pub fn with_peek_counter(mut self, peek: bool) -> Self {
        self.peek_counter = peek;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.admission_capacity == 0 {
            return Err(Error::InvalidConfig(
                "admission_capacity must be at least 1".into(),
            ));
        }
        if !(1..=MAX_QUEUE_DEPTH).contains(&self.queue_depth) {
            return Err(Error::InvalidConfig(format!(
                "queue_depth must be within 1..={MAX_QUEUE_DEPTH}, got {}",
                self.queue_depth
            )));
        }
        if self.resource_mode & !0o777 != 0 {
            return Err(Error::InvalidConfig(format!(
                "resource_mode {:#o} has bits outside 0o777",
                self.resource_mode
            )));
        }
        if !(MIN_MESSAGE_SIZE..=MAX_MESSAGE_SIZE).contains(&self.message_size) {
            return Err(Error::InvalidConfig(format!(
                "message_size must be within {MIN_MESSAGE_SIZE}..={MAX_MESSAGE_SIZE}, got {}",
                self.message_size
            )));
        }
        for (what, name) in [
            ("transport_name", &self.transport_name),
            ("counter_name", &self.counter_name),
            ("gate_name", &self.gate_name),
        ] {
            resource_name(name).map_err(|reason| {
                Error::InvalidConfig(format!("{what} {name:?}: {reason}"))
            })?;
        }
        Ok(())
    }
}

/// Normalise a POSIX-style resource name: one optional leading `/`, nothing else.
pub(crate) fn resource_name(name: &str) -> std::result::Result<&str, &'static str> {
    let bare = name.strip_prefix('/').unwrap_or(name);
    if bare.is_empty() {
        return Err("name is empty");
    }
    if bare.contains('/') {
        return Err("name may not contain '/' after the leading one");
    }
    if bare.contains('\0') {
        return Err("name may not contain NUL");
    }
    Ok(bare)
}
