use serde::Serialize;

use crate::error::{ModemError, Result};

/// The SIM card message store.
pub const DEFAULT_SMS_SOURCE: &str = "SM";
/// Characters per chunk when sending text.
pub const SMS_MAX_LENGTH: usize = 160;

/// A stored text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsRecord {
    /// Message status as reported by the store, e.g. `REC READ`.
    pub source: String,
    /// Originating address.
    #[serde(rename = "from")]
    pub sender: String,
    /// Service centre timestamp, `yy/MM/dd,hh:mm:ss±zz`.
    #[serde(rename = "date")]
    pub timestamp: String,
    #[serde(rename = "sms")]
    pub body: String,
    /// 1-based slot the message was read from.
    #[serde(rename = "nth")]
    pub index: usize,
}

/// Usage counters of a message store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub used: u32,
    pub capacity: u32,
}

impl StorageStats {
    /// Whether `index` addresses a slot of this store.
    pub fn contains(&self, index: usize) -> bool {
        (1..=self.capacity as usize).contains(&index)
    }
}

/// Split a message into consecutive pieces of at most `max_len` characters.
///
/// Each piece is sent as a separate, self-contained SMS. There is no
/// concatenation header, so the recipient sees unrelated messages rather than
/// one reassembled text.
pub fn chunk_message(message: &str, max_len: usize) -> Result<Vec<&str>> {
    if max_len == 0 {
        return Err(ModemError::InvalidArgument("chunk length must be positive"));
    }

    let mut chunks = Vec::with_capacity(message.len().div_ceil(max_len));
    let mut rest = message;
    while !rest.is_empty() {
        let split = rest
            .char_indices()
            .nth(max_len)
            .map_or(rest.len(), |(pos, _)| pos);
        let (chunk, tail) = rest.split_at(split);
        chunks.push(chunk);
        rest = tail;
    }
    Ok(chunks)
}
