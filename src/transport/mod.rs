//! Best-effort packet transport the mesh protocol runs on top of.
//!
//! The link layer may silently drop a frame but never corrupts a delivered
//! one; acknowledgment, if any, happens above this boundary.

pub mod frame;
pub mod radio;

pub use frame::{FrameError, Header, MessageKind, MAX_BODY_LEN};
pub use radio::{Radio, RadioTransport};

/// Contract between the mesh protocol and the radio link.
///
/// All operations are non-blocking. `write` returning `true` only means
/// the frame was accepted by the link layer, never that the peer received
/// it; implementations map their internal faults to `false`/`None` rather
/// than surfacing them, which is all the protocol can act on anyway.
pub trait Transport {
    /// Rebinds the local receive address. Called repeatedly as the node's
    /// tree address changes; must be idempotent.
    fn configure(&mut self, channel: u8, address: u16);

    /// Best-effort unicast/broadcast send of `body` under `header`.
    fn write(&mut self, header: &Header, body: &[u8]) -> bool;

    /// Whether an inbound frame is queued.
    fn available(&mut self) -> bool;

    /// Header of the next queued frame, without consuming it.
    fn peek_header(&mut self) -> Option<Header>;

    /// Consumes the next queued frame, copying its body into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Option<(Header, usize)>;
}
