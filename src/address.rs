//! Octal tree addressing scheme.
//!
//! An address is a base-8 path through the tree: each level contributes
//! three bits holding a child slot in `1..=5`. `0o0` is the base station
//! and `0o5555` doubles as the broadcast destination and the address a
//! node transmits from while it has no tree position yet.
//!
//! ```text
//! leaf        -> parent
//! 0o1-0o5     -> 0o0
//! 0o21        -> 0o2
//! 0o51-0o55   -> 0o5
//! 0o551-0o555 -> 0o55
//! ```

use crate::directory::NodeDirectory;

/// Wire address of the base station (tree root).
pub const BASE: u16 = 0o0;

/// Broadcast destination, also used as the transmit address of a node that
/// has not been assigned a tree position yet.
pub const BROADCAST: u16 = 0o5555;

/// Tree levels representable before the address word saturates.
pub const MAX_DEPTH: u8 = 4;

/// Highest valid child slot per level.
pub const MAX_CHILD_SLOT: u16 = 5;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    #[error("no child slot can be allocated under 0o{parent:o}")]
    SpaceExhausted { parent: u16 },

    #[error("0o{0:o} is not a valid tree address")]
    Invalid(u16),
}

/// A validated, non-sentinel tree address.
///
/// Invariant: every 3-bit level of the inner word holds a slot in `1..=5`,
/// and the word is neither [BASE] nor [BROADCAST].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeAddress(u16);

impl TreeAddress {
    pub fn new(raw: u16) -> Result<Self, AddressError> {
        if raw == BASE || raw >= BROADCAST {
            return Err(AddressError::Invalid(raw));
        }
        let mut rest = raw;
        while rest != 0 {
            let slot = rest & 0o7;
            if slot == 0 || slot > MAX_CHILD_SLOT {
                return Err(AddressError::Invalid(raw));
            }
            rest >>= 3;
        }
        Ok(TreeAddress(raw))
    }

    /// Raw wire value.
    pub fn get(self) -> u16 {
        self.0
    }

    /// Number of tree levels this address occupies.
    pub fn depth(self) -> u8 {
        let mut depth = 0;
        let mut rest = self.0;
        while rest != 0 {
            depth += 1;
            rest >>= 3;
        }
        depth
    }

    fn child(self, slot: u16) -> Result<TreeAddress, AddressError> {
        debug_assert!((1..=MAX_CHILD_SLOT).contains(&slot));
        if self.depth() >= MAX_DEPTH {
            return Err(AddressError::SpaceExhausted { parent: self.0 });
        }
        // 0o555 slot 5 would collide with the broadcast sentinel.
        TreeAddress::new((self.0 << 3) | slot)
    }
}

/// A node's position in the tree, with the two sentinel states made
/// explicit. Serializes back to the sentinel integers on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAddress {
    /// The base station, permanently at [BASE].
    Root,
    /// No tree position yet; transmits from [BROADCAST].
    Unassigned,
    /// A granted tree position.
    Assigned(TreeAddress),
}

impl NodeAddress {
    pub fn to_wire(self) -> u16 {
        match self {
            NodeAddress::Root => BASE,
            NodeAddress::Unassigned => BROADCAST,
            NodeAddress::Assigned(addr) => addr.get(),
        }
    }

    pub fn from_wire(raw: u16) -> Result<Self, AddressError> {
        match raw {
            BASE => Ok(NodeAddress::Root),
            BROADCAST => Ok(NodeAddress::Unassigned),
            _ => TreeAddress::new(raw).map(NodeAddress::Assigned),
        }
    }

    pub fn is_base(self) -> bool {
        matches!(self, NodeAddress::Root)
    }

    pub fn is_broadcast(self) -> bool {
        matches!(self, NodeAddress::Unassigned)
    }

    /// Candidate address for child slot `slot` (`1..=MAX_CHILD_SLOT`) of
    /// this node. An unassigned node owns no subtree, and a node at
    /// [MAX_DEPTH] has no room below it; both are [AddressError::SpaceExhausted].
    pub fn child_slot(self, slot: u16) -> Result<TreeAddress, AddressError> {
        assert!(
            (1..=MAX_CHILD_SLOT).contains(&slot),
            "child slot out of range: {}",
            slot
        );
        match self {
            NodeAddress::Root => TreeAddress::new(slot),
            NodeAddress::Unassigned => Err(AddressError::SpaceExhausted { parent: BROADCAST }),
            NodeAddress::Assigned(addr) => addr.child(slot),
        }
    }
}

/// First child slot of `parent` whose address is not already a value in
/// `directory`. All slots taken (or no slot allocatable at this depth)
/// means no address can be granted here this cycle; the requester will
/// re-ping and may be adopted by another relay.
pub fn next_free_child(
    parent: NodeAddress,
    directory: &NodeDirectory,
) -> Result<TreeAddress, AddressError> {
    for slot in 1..=MAX_CHILD_SLOT {
        if let Ok(addr) = parent.child_slot(slot) {
            if !directory.contains_address(addr) {
                return Ok(addr);
            }
        }
    }
    Err(AddressError::SpaceExhausted {
        parent: parent.to_wire(),
    })
}
