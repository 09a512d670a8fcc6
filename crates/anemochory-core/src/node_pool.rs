//! Node pool model: the read-mostly set of candidate relays/exits that path
//! selection draws from.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::NodeId;

bitflags! {
    /// Capabilities a node advertises. A node may be both `RELAY` and
    /// `EXIT`; path selection requires `RELAY` on every hop and `EXIT` on
    /// the last.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        const RELAY = 0b0000_0001;
        const EXIT  = 0b0000_0010;
    }
}

/// Liveness signal for a pool entry, refreshed by whatever health-check
/// mechanism feeds the pool (out of scope for this crate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeHealth {
    pub healthy: bool,
    pub last_seen: SystemTime,
}

impl NodeHealth {
    pub fn healthy_now() -> Self {
        Self {
            healthy: true,
            last_seen: SystemTime::now(),
        }
    }

    /// Treats a health record older than `max_age` as stale and therefore
    /// unhealthy, regardless of its recorded `healthy` flag.
    pub fn is_usable(&self, max_age: Duration) -> bool {
        self.healthy
            && self
                .last_seen
                .elapsed()
                .map(|age| age <= max_age)
                .unwrap_or(false)
    }
}

/// One candidate in the node pool. Path selection (`anemochory-routing`)
/// reads these; it never mutates them.
#[derive(Debug, Clone)]
pub struct NodePoolEntry {
    pub node_id: NodeId,
    pub address: SocketAddr,
    pub public_key: [u8; 32],
    pub capabilities: Capabilities,
    /// Coarse geographic tag, e.g. `"eu-west"`. Used for diversity filtering.
    pub geo_tag: String,
    /// ASN or operator tag. Used for diversity filtering.
    pub operator_tag: String,
    /// Advertised weight, combined with reputation in the weighted draw.
    pub weight: f64,
    /// Reputation score in `[0.0, 1.0]`.
    pub reputation: f64,
    pub health: NodeHealth,
}

impl NodePoolEntry {
    pub fn can_relay(&self) -> bool {
        self.capabilities.contains(Capabilities::RELAY)
    }

    pub fn can_exit(&self) -> bool {
        self.capabilities.contains(Capabilities::EXIT)
    }

    /// Draw weight used by path selection: zero for unhealthy nodes,
    /// otherwise `weight * reputation`.
    pub fn draw_weight(&self, max_health_age: Duration) -> f64 {
        if self.health.is_usable(max_health_age) {
            self.weight * self.reputation
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(geo: &str, operator: &str, caps: Capabilities) -> NodePoolEntry {
        NodePoolEntry {
            node_id: NodeId::from_bytes([1; 32]),
            address: "127.0.0.1:9000".parse().unwrap(),
            public_key: [2; 32],
            capabilities: caps,
            geo_tag: geo.to_string(),
            operator_tag: operator.to_string(),
            weight: 1.0,
            reputation: 1.0,
            health: NodeHealth::healthy_now(),
        }
    }

    #[test]
    fn capabilities_distinguish_relay_and_exit() {
        let e = entry("eu-west", "A1", Capabilities::RELAY);
        assert!(e.can_relay());
        assert!(!e.can_exit());

        let e = entry("eu-west", "A1", Capabilities::RELAY | Capabilities::EXIT);
        assert!(e.can_relay());
        assert!(e.can_exit());
    }

    #[test]
    fn draw_weight_is_zero_for_unhealthy_nodes() {
        let mut e = entry("eu-west", "A1", Capabilities::RELAY);
        e.health.healthy = false;
        assert_eq!(e.draw_weight(Duration::from_secs(60)), 0.0);
    }

    #[test]
    fn draw_weight_is_zero_for_stale_health() {
        let mut e = entry("eu-west", "A1", Capabilities::RELAY);
        e.health.last_seen = SystemTime::now() - Duration::from_secs(3600);
        assert_eq!(e.draw_weight(Duration::from_secs(60)), 0.0);
    }

    #[test]
    fn draw_weight_combines_weight_and_reputation() {
        let mut e = entry("eu-west", "A1", Capabilities::RELAY);
        e.weight = 2.0;
        e.reputation = 0.5;
        assert_eq!(e.draw_weight(Duration::from_secs(60)), 1.0);
    }
}
