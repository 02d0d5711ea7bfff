//! The order submitter ("table").
//!
//! One submission: take an admission slot, optionally peek at the shared
//! counter, attach to the transport, send, give the slot back. The slot is
//! held by an [`AdmissionPermit`](crate::Core::AdmissionPermit), so every
//! exit path releases it.

use log::{debug, info};

use crate::config::Config;
use crate::Core::{Admission, AdmissionGate, SharedCounter};
use crate::Transport::{OrderRecord, TransportBuilder};
use crate::Result;

/// Outcome of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReport {
    /// Shared counter as read before sending, if it was read.
    pub total_before: Option<u64>,
    /// Whether an admission slot was held during the send.
    pub gated: bool,
}

pub struct Submitter {
    config: Config,
    admission: Admission,
}

impl Submitter {
    /// Open the admission gate.
    ///
    /// Without `strict_admission`, a missing gate puts the submitter in
    /// degraded mode (no admission control) instead of failing.
    pub fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let admission = Admission::from_attempt(
            AdmissionGate::open(&config.gate_name),
            config.strict_admission,
            &config.gate_name,
        )?;
        Ok(Self { config, admission })
    }

    pub fn is_degraded(&self) -> bool {
        self.admission.is_degraded()
    }

    /// Read the shared counter. `None` if it cannot be attached.
    pub fn peek_counter(&self) -> Option<u64> {
        match SharedCounter::attach_read_only(&self.config.counter_name) {
            Ok(counter) => Some(counter.load()),
            Err(e) => {
                debug!("shared counter not readable: {e}");
                None
            }
        }
    }

    /// Send one order, blocking for an admission slot and for transport space.
    pub fn submit(&self, record: &OrderRecord) -> Result<SubmitReport> {
        let table = record.table_id;
        if !self.admission.is_degraded() {
            info!("[TABLE {table}] waiting for a slot to send the order");
        }
        let permit = self.admission.acquire()?;

        let total_before = if self.config.peek_counter {
            self.peek_counter()
        } else {
            None
        };
        if let Some(total) = total_before {
            info!("[TABLE {table}] current total orders (before): {total}");
        }

        let producer = TransportBuilder::new()
            .with_name(self.config.transport_name.as_str())
            .build_producer()?;
        producer.send_record(record)?;
        info!("[TABLE {table}] order sent: {}", record.text);

        let gated = permit.is_gated();
        drop(permit);
        Ok(SubmitReport {
            total_before,
            gated,
        })
    }
}
