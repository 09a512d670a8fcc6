//! Shared, read-mostly node pool.

use anemochory_core::{NodeId, NodePoolEntry};
use parking_lot::RwLock;

/// A read-mostly collection of known nodes, shared across a node's or
/// client's connections. Writes (new node discovered, health update) are
/// rare relative to the read-heavy path-selection draw, so a single
/// `RwLock` around a flat `Vec` is the right trade-off rather than
/// per-entry locking.
pub struct NodePool {
    entries: RwLock<Vec<NodePoolEntry>>,
}

impl NodePool {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn insert(&self, entry: NodePoolEntry) {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter_mut().find(|e| e.node_id == entry.node_id) {
            *existing = entry;
        } else {
            entries.push(entry);
        }
    }

    pub fn remove(&self, node_id: &NodeId) {
        self.entries.write().retain(|e| &e.node_id != node_id);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of the current pool contents, for the path selector to draw
    /// from without holding the lock across the whole selection algorithm.
    pub fn snapshot(&self) -> Vec<NodePoolEntry> {
        self.entries.read().clone()
    }
}

impl Default for NodePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anemochory_core::{Capabilities, NodeHealth};
    use std::net::SocketAddr;

    fn entry(id: u8) -> NodePoolEntry {
        NodePoolEntry {
            node_id: NodeId::from_bytes([id; 32]),
            address: "127.0.0.1:9000".parse::<SocketAddr>().unwrap(),
            public_key: [id; 32],
            capabilities: Capabilities::RELAY,
            geo_tag: "eu-west".into(),
            operator_tag: "op-a".into(),
            weight: 1.0,
            reputation: 1.0,
            health: NodeHealth::healthy_now(),
        }
    }

    #[test]
    fn insert_then_update_replaces_entry() {
        let pool = NodePool::new();
        pool.insert(entry(1));
        assert_eq!(pool.len(), 1);

        let mut updated = entry(1);
        updated.weight = 5.0;
        pool.insert(updated);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.snapshot()[0].weight, 5.0);
    }

    #[test]
    fn remove_drops_the_entry() {
        let pool = NodePool::new();
        pool.insert(entry(1));
        pool.insert(entry(2));
        pool.remove(&NodeId::from_bytes([1; 32]));
        assert_eq!(pool.len(), 1);
    }
}
