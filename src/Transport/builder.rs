use super::region::TransportRegion;
use super::{Consumer, Producer};
use crate::config::{
    Config, DEFAULT_MESSAGE_SIZE, DEFAULT_QUEUE_DEPTH, DEFAULT_RESOURCE_MODE, DEFAULT_TRANSPORT_NAME,
};
use crate::Result;

pub struct TransportBuilder {
    name: String,
    queue_depth: usize,
    message_size: usize,
    mode: u32,
}

impl Default for TransportBuilder {
    fn default() -> Self {
        Self {
            name: DEFAULT_TRANSPORT_NAME.to_string(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            message_size: DEFAULT_MESSAGE_SIZE,
            mode: DEFAULT_RESOURCE_MODE,
        }
    }
}

impl TransportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.transport_name.clone(),
            queue_depth: config.queue_depth,
            message_size: config.message_size,
            mode: config.resource_mode,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
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

    /// Permission bits of the region the consumer creates.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Create the transport and return its single consumer. Receiver only.
    pub fn build_consumer(self) -> Result<Consumer> {
        let region = TransportRegion::create(
            &self.name,
            self.queue_depth,
            self.message_size,
            self.mode,
        )?;
        Ok(Consumer::new(region))
    }

    /// Attach to an existing transport. Depth and record size come from the
    /// transport itself; the builder's values are ignored.
    pub fn build_producer(self) -> Result<Producer> {
        let region = TransportRegion::attach(&self.name)?;
        Ok(Producer::new(region))
    }
}
