// In src/Transport/producer.rs
use super::region::TransportRegion;
use crate::Transport::Structs::Record_Structs::{MessageMeta, OrderRecord};
use crate::{Error, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// The sending side of a transport, attached by a submitter.
///
/// Attaching never creates anything: the receiver owns the transport and the
/// producer only maps it.
pub struct Producer {
    pub(crate) region: TransportRegion,
}

impl Producer {
    pub(crate) fn new(region: TransportRegion) -> Self {
        Self { region }
    }

    fn meta(len: usize) -> MessageMeta {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;

        MessageMeta {
            timestamp_ns: now,
            sender_pid: std::process::id(),
            payload_len: len as u32,
        }
    }

    fn check_size(&self, message: &[u8]) -> Result<()> {
        let max = self.max_message_size();
        if message.len() > max {
            return Err(Error::RecordTooLarge {
                len: message.len(),
                max,
            });
        }
        Ok(())
    }

    /// Sends a record, blocking while the transport is full.
    ///
    /// # Returns
    /// * `Ok(())` once the record is published
    /// * `Err(RecordTooLarge)` if it exceeds the transport's record size
    /// * `Err(TransportClosed)` if the receiver tore the transport down
    pub fn send<T: AsRef<[u8]>>(&self, message: T) -> Result<()> {
        let message = message.as_ref();
        self.check_size(message)?;
        let buffer = self.region.ring();

        loop {
            if buffer.is_closed() {
                return Err(Error::TransportClosed);
            }
            // Read the epoch first: a slot freed after this point changes it and
            // the wait below returns at once.
            let seen = buffer.space_epoch();
            if buffer.enqueue(Self::meta(message.len()), message).is_some() {
                buffer.signal_consumer();
                return Ok(());
            }
            buffer.wait_for_space(seen);
        }
    }

    /// Sends a record or fails with [`Error::Full`] instead of waiting.
    pub fn try_send<T: AsRef<[u8]>>(&self, message: T) -> Result<()> {
        let message = message.as_ref();
        self.check_size(message)?;
        let buffer = self.region.ring();

        if buffer.is_closed() {
            return Err(Error::TransportClosed);
        }
        match buffer.enqueue(Self::meta(message.len()), message) {
            Some(_) => {
                buffer.signal_consumer();
                Ok(())
            }
            None => Err(Error::Full),
        }
    }

    /// Encode `record` in wire form and [`send`](Self::send) it.
    pub fn send_record(&self, record: &OrderRecord) -> Result<()> {
        let bytes = record.encode_bounded(self.max_message_size())?;
        self.send(bytes)
    }

    /// Returns the maximum record size that can be sent
    pub fn max_message_size(&self) -> usize {
        self.region.ring().message_size()
    }

    /// Maximum number of undelivered records
    pub fn capacity(&self) -> usize {
        self.region.ring().capacity()
    }

    pub fn name(&self) -> &str {
        self.region.name()
    }
}
