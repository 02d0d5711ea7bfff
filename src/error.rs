use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A syscall on a named resource failed. `op` names the failing operation.
    #[error("{op} failed for {name}: {source}")]
    Resource {
        op: &'static str,
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("transport {0} does not exist (is the receiver running?)")]
    TransportMissing(String),

    #[error("transport has been closed by the receiver")]
    TransportClosed,

    #[error("transport is full")]
    Full,

    #[error("record too large ({len} > {max})")]
    RecordTooLarge { len: usize, max: usize },

    #[error("malformed record: {0:?}")]
    MalformedRecord(String),

    #[error("corrupt shared region: {0}")]
    Corrupt(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("log writer is shut down")]
    LogWriterClosed,

    #[error("operation requires a writable attachment")]
    ReadOnly,

    #[error("admission gate {name} unavailable: {source}")]
    GateUnavailable {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn resource(op: &'static str, name: &str, source: io::Error) -> Self {
        Error::Resource {
            op,
            name: name.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
