//! Bounded identity-to-address cache kept by base and relay nodes.

use log::warn;

use crate::address::TreeAddress;
use crate::NodeId;

/// Default number of peer slots, sized for the memory budget of the small
/// target boards this protocol comes from.
pub const DEFAULT_CAPACITY: usize = 10;

/// Fixed-capacity, linear-scan map from a peer's stable identity to its
/// last-known tree address.
///
/// This is a cache of routing hints, not a source of truth: entries are
/// written when a peer is granted an address or confirms one with a ping,
/// and dropped as soon as a delivery to the peer fails.
#[derive(Debug, Clone)]
pub struct NodeDirectory {
    entries: Vec<(NodeId, TreeAddress)>,
    capacity: usize,
}

impl NodeDirectory {
    pub fn with_capacity(capacity: usize) -> Self {
        NodeDirectory {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts or updates the address for `id`. A new identity is rejected
    /// (returning `false`) once the directory is full; existing entries are
    /// never displaced implicitly.
    pub fn insert(&mut self, id: NodeId, address: TreeAddress) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|(eid, _)| *eid == id) {
            entry.1 = address;
            return true;
        }
        if self.entries.len() >= self.capacity {
            warn!(
                "directory full ({} slots), dropping entry for node {}",
                self.capacity, id
            );
            return false;
        }
        self.entries.push((id, address));
        true
    }

    pub fn get(&self, id: NodeId) -> Option<TreeAddress> {
        self.entries
            .iter()
            .find(|(eid, _)| *eid == id)
            .map(|(_, addr)| *addr)
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Whether any entry resolves to `address`. Consulted by the grant path
    /// to keep allocated child slots collision-free.
    pub fn contains_address(&self, address: TreeAddress) -> bool {
        self.entries.iter().any(|(_, addr)| *addr == address)
    }

    pub fn remove(&mut self, id: NodeId) -> bool {
        if let Some(index) = self.entries.iter().position(|(eid, _)| *eid == id) {
            self.entries.swap_remove(index);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, TreeAddress)> + '_ {
        self.entries.iter().copied()
    }
}

impl Default for NodeDirectory {
    fn default() -> Self {
        NodeDirectory::with_capacity(DEFAULT_CAPACITY)
    }
}
