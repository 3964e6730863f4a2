//! Self-organizing mesh layer for small packet radios.
//!
//! Nodes share one radio channel and arrange themselves into a logical tree.
//! The base station sits at the root address and never moves; every other
//! node boots *homeless*, transmitting from the broadcast sentinel, and
//! acquires a tree address through the discovery exchange implemented in
//! [mesh::Mesh]:
//!
//! 1. A homeless node broadcasts a ping carrying its stable identity.
//! 2. A node that already holds a tree address answers with an address
//!    grant for a free child slot below itself.
//! 3. The homeless node applies the granted address and confirms it with a
//!    ping sent from the new address, which teaches the granting node the
//!    identity-to-address binding.
//! 4. From then on application [Payload]s are exchanged by stable identity;
//!    failed deliveries evict stale bindings (base) or force the node to
//!    renegotiate its address from scratch (leaf/relay).
//!
//! The radio itself sits behind the [transport::Transport] trait so the
//! protocol can run against real hardware ([transport::RadioTransport]) or
//! an in-memory fake in tests.

pub mod address;
pub mod directory;
pub mod mesh;
pub mod payload;
pub mod transport;

pub use address::NodeAddress;
pub use directory::NodeDirectory;
pub use mesh::{Mesh, MeshConfig, SendError, State};
pub use payload::Payload;
pub use transport::{Header, MessageKind, Transport};

/// Stable node identity, assigned out-of-band and constant for the node's
/// lifetime. Distinct from the transient tree address.
pub type NodeId = u16;
