//! On-air frame layout: `to u16 | from u16 | kind u8 | body`.

/// Longest frame body; payloads above this are rejected, never split.
pub const MAX_BODY_LEN: usize = 24;

/// Encoded header length in bytes.
pub const HEADER_LEN: usize = 5;

/// Longest complete frame.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_BODY_LEN;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short ({} bytes) to carry a header", .len)]
    Truncated { len: usize },

    #[error("frame body is {} bytes, limit is {}", .len, MAX_BODY_LEN)]
    BodyTooLong { len: usize },

    #[error("unknown message type tag 0x{0:02x}")]
    UnknownKind(u8),
}

/// Message type tag carried in every frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Discovery ping, body = sender's stable identity.
    Ping,
    /// Address grant, body = target identity + granted address.
    AddressGrant,
    /// Application payload.
    Message,
}

impl MessageKind {
    pub const fn tag(self) -> u8 {
        match self {
            MessageKind::Ping => b'P',
            MessageKind::AddressGrant => b'A',
            MessageKind::Message => b'M',
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = FrameError;

    fn try_from(tag: u8) -> Result<Self, FrameError> {
        match tag {
            b'P' => Ok(MessageKind::Ping),
            b'A' => Ok(MessageKind::AddressGrant),
            b'M' => Ok(MessageKind::Message),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

/// Frame header as carried on the wire. `kind` stays a raw tag byte so an
/// unrecognized type can be inspected, logged and discarded by the layer
/// above instead of vanishing inside the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub to: u16,
    pub from: u16,
    pub kind: u8,
}

impl Header {
    pub fn new(to: u16, from: u16, kind: MessageKind) -> Self {
        Header {
            to,
            from,
            kind: kind.tag(),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let to = self.to.to_be_bytes();
        let from = self.from.to_be_bytes();
        [to[0], to[1], from[0], from[1], self.kind]
    }

    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::Truncated { len: bytes.len() });
        }
        Ok(Header {
            to: u16::from_be_bytes([bytes[0], bytes[1]]),
            from: u16::from_be_bytes([bytes[2], bytes[3]]),
            kind: bytes[4],
        })
    }
}

/// Encodes a complete frame, enforcing the body ceiling.
pub fn encode(header: &Header, body: &[u8]) -> Result<Vec<u8>, FrameError> {
    if body.len() > MAX_BODY_LEN {
        return Err(FrameError::BodyTooLong { len: body.len() });
    }
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(body);
    Ok(bytes)
}

/// Splits a received frame into its header and body.
pub fn decode(bytes: &[u8]) -> Result<(Header, &[u8]), FrameError> {
    let header = Header::try_from_bytes(bytes)?;
    let body = &bytes[HEADER_LEN..];
    if body.len() > MAX_BODY_LEN {
        return Err(FrameError::BodyTooLong { len: body.len() });
    }
    Ok((header, body))
}
