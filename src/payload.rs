//! Application message unit exchanged over the mesh.

use std::fmt;

use crate::NodeId;

/// Longest accepted key, in bytes.
pub const MAX_KEY_LEN: usize = 16;

/// Hard ceiling on the encoded payload, set by the transport's single-frame
/// limit. Oversized payloads are rejected, never split.
pub const MAX_PAYLOAD_LEN: usize = 24;

// sender(2) + value(4) + key_len(1)
const FIXED_LEN: usize = 7;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload key is {} bytes, limit is {}", .len, MAX_KEY_LEN)]
    KeyTooLong { len: usize },

    #[error("payload body is truncated ({len} bytes)")]
    Truncated { len: usize },

    #[error("payload key is not valid UTF-8")]
    BadKey,
}

/// A keyed integer reading, stamped with the sender's stable identity just
/// before transmission.
///
/// ```
/// # use radio_mesh::Payload;
/// let payload = Payload::new("temperature", 24).unwrap();
/// assert_eq!(payload.key(), "temperature");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    key: String,
    pub value: i32,
    /// Stable identity of the sending node, filled in by the mesh on send.
    pub sender: NodeId,
}

impl Payload {
    pub fn new(key: &str, value: i32) -> Result<Self, PayloadError> {
        if key.len() > MAX_KEY_LEN {
            return Err(PayloadError::KeyTooLong { len: key.len() });
        }
        Ok(Payload {
            key: key.to_owned(),
            value,
            sender: 0,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FIXED_LEN + self.key.len());
        bytes.extend_from_slice(&self.sender.to_be_bytes());
        bytes.extend_from_slice(&self.value.to_be_bytes());
        bytes.push(self.key.len() as u8);
        bytes.extend_from_slice(self.key.as_bytes());
        debug_assert!(bytes.len() <= MAX_PAYLOAD_LEN);
        bytes
    }

    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() < FIXED_LEN {
            return Err(PayloadError::Truncated { len: bytes.len() });
        }
        let sender = u16::from_be_bytes([bytes[0], bytes[1]]);
        let value = i32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        let key_len = bytes[6] as usize;
        if key_len > MAX_KEY_LEN {
            return Err(PayloadError::KeyTooLong { len: key_len });
        }
        if bytes.len() < FIXED_LEN + key_len {
            return Err(PayloadError::Truncated { len: bytes.len() });
        }
        let key = std::str::from_utf8(&bytes[FIXED_LEN..FIXED_LEN + key_len])
            .map_err(|_| PayloadError::BadKey)?
            .to_owned();
        Ok(Payload { key, value, sender })
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{{}={}}}", self.sender, self.key, self.value)
    }
}
