//! Cross-process order intake.
//!
//! A receiver process owns three named resources: an admission gate that
//! bounds how many submitters are sending at once, a shared-memory transport
//! that carries `"<table>:<order>"` records in order, and a shared counter of
//! orders received. Submitters attach to them by name.

// Module naming follows project convention (Core = shared primitives)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Transport;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod config;
pub mod error;
pub mod log_writer;
pub mod receiver;
pub mod shutdown;
pub mod submitter;

pub use config::Config;
pub use error::{Error, Result};
pub use log_writer::{LogStats, LogWriter};
pub use receiver::{Receiver, ReceiverReport};
pub use shutdown::ShutdownToken;
pub use submitter::{SubmitReport, Submitter};
pub use Transport::OrderRecord;
