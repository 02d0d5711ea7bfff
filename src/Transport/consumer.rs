// src/Transport/consumer.rs

use super::region::TransportRegion;
use crate::shutdown::ShutdownToken;
use crate::Transport::Structs::Record_Structs::MessageMeta;
use crate::Result;
use std::sync::Arc;

/// The receiving side of a transport.
///
/// The consumer is the transport's owner: it is created by the receiver,
/// and destroying it closes the ring (failing blocked senders) and removes
/// the name.
pub struct Consumer {
    pub(crate) region: Arc<TransportRegion>,
    pub(crate) destroyed: bool,
}

impl Consumer {
    pub(crate) fn new(region: TransportRegion) -> Self {
        Self {
            region: Arc::new(region),
            destroyed: false,
        }
    }

    /// Receives a record if one is ready.
    ///
    /// # Returns
    /// * `Ok(Some(data))` if a record was received
    /// * `Ok(None)` if no record is ready
    /// * `Err(Corrupt)` if the slot could not be read
    pub fn try_receive(&self) -> Result<Option<Vec<u8>>> {
        Ok(self
            .region
            .ring()
            .dequeue()?
            .map(|(_, payload)| payload))
    }

    /// Receives a record, blocking until one arrives or shutdown is requested.
    ///
    /// Wakeups that deliver nothing (signals, spurious futex returns) are retried.
    /// Returns `Ok(None)` once `shutdown` has been requested; no further record
    /// is taken after that point.
    pub fn receive(&self, shutdown: &ShutdownToken) -> Result<Option<Vec<u8>>> {
        Ok(self
            .receive_with_meta(shutdown)?
            .map(|(_, payload)| payload))
    }

    /// Like [`receive`](Self::receive), also returning the slot metadata.
    pub fn receive_with_meta(
        &self,
        shutdown: &ShutdownToken,
    ) -> Result<Option<(MessageMeta, Vec<u8>)>> {
        let buffer = self.region.ring();
        loop {
            if shutdown.is_requested() {
                return Ok(None);
            }
            let seen = buffer.data_epoch();
            if let Some(record) = buffer.dequeue()? {
                return Ok(Some(record));
            }
            if shutdown.is_requested() {
                return Ok(None);
            }
            // Wait for signal
            buffer.wait_for_data(seen);
        }
    }

    /// A closure that wakes a blocked [`receive`](Self::receive).
    ///
    /// It keeps the mapping alive on its own, so it stays safe to call after
    /// the consumer is destroyed.
    pub fn waker(&self) -> impl Fn() + Send + Sync + 'static {
        let region = Arc::clone(&self.region);
        move || region.ring().wake_all()
    }

    /// Records waiting to be received
    pub fn pending(&self) -> usize {
        self.region.ring().len()
    }

    pub fn capacity(&self) -> usize {
        self.region.ring().capacity()
    }

    pub fn max_message_size(&self) -> usize {
        self.region.ring().message_size()
    }

    pub fn name(&self) -> &str {
        self.region.name()
    }

    /// Close the transport and remove its name.
    pub fn destroy(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        self.region.close_and_unlink()
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}
