// Per-slot metadata and the order record carried in the payload

use std::fmt;

use crate::{Error, Result};

/// Transport-only metadata that precedes each payload in a slot.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct MessageMeta {
    pub timestamp_ns: u64,
    pub sender_pid: u32,
    pub payload_len: u32,
}

/// One order: which table, and what they asked for.
///
/// Wire form is `"<table_id>:<text>"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRecord {
    pub table_id: i64,
    pub text: String,
}

impl OrderRecord {
    /// Build a record, rejecting text that cannot travel on one line.
    pub fn new(table_id: i64, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.contains('\n') || text.contains('\r') {
            return Err(Error::MalformedRecord(text));
        }
        Ok(Self { table_id, text })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Encode and check the result fits in a record of `max` bytes.
    pub fn encode_bounded(&self, max: usize) -> Result<Vec<u8>> {
        let bytes = self.encode();
        if bytes.len() > max {
            return Err(Error::RecordTooLarge {
                len: bytes.len(),
                max,
            });
        }
        Ok(bytes)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        let raw = std::str::from_utf8(payload)
            .map_err(|_| Error::MalformedRecord(String::from_utf8_lossy(payload).into_owned()))?;
        let (table, text) = raw
            .split_once(':')
            .ok_or_else(|| Error::MalformedRecord(raw.to_string()))?;
        let table_id = table
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::MalformedRecord(raw.to_string()))?;
        // Anything after a stray newline is not part of the order.
        let text = text.split(['\n', '\r']).next().unwrap_or_default();
        Ok(Self {
            table_id,
            text: text.to_string(),
        })
    }
}

impl fmt::Display for OrderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.text)
    }
}
