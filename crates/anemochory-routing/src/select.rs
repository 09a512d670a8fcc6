//! Weighted, diversity-constrained path selection.

use std::collections::HashSet;
use std::time::Duration;

use anemochory_core::{AnemochoryError, NodeId, NodePoolEntry, Result};
use rand::Rng;

use crate::pool::NodePool;

/// A built path: ordered relay hops followed by the exit.
#[derive(Debug, Clone)]
pub struct OnionPath {
    pub hops: Vec<NodePoolEntry>,
}

impl OnionPath {
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }
}

/// Which diversity constraints are currently enforced. Constraints are
/// dropped one at a time, in the fixed order operator-then-geography, when
/// the candidate set empties before a full path is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DiversityLevel {
    enforce_operator: bool,
    enforce_geography: bool,
}

const RELAXATION_ORDER: [DiversityLevel; 3] = [
    DiversityLevel {
        enforce_operator: true,
        enforce_geography: true,
    },
    DiversityLevel {
        enforce_operator: false,
        enforce_geography: true,
    },
    DiversityLevel {
        enforce_operator: false,
        enforce_geography: false,
    },
];

/// Maximum age a health record may have and still count as usable.
const MAX_HEALTH_AGE: Duration = Duration::from_secs(300);

pub struct PathSelector;

impl PathSelector {
    /// Draws a fresh `hop_count`-hop path ending in an exit-capable node,
    /// excluding `destination` from every hop but the exit. Tries the full
    /// diversity constraint set first, then relaxes operator diversity,
    /// then geography diversity, failing with `InsufficientDiversity` only
    /// once every relaxation level has been exhausted.
    pub fn select_path(pool: &NodePool, hop_count: u8, destination: Option<&NodeId>) -> Result<OnionPath> {
        let candidates = pool.snapshot();
        let mut rng = rand::thread_rng();

        for level in RELAXATION_ORDER {
            if let Some(path) = try_draw(&candidates, hop_count, destination, level, &mut rng) {
                return Ok(OnionPath { hops: path });
            }
        }

        Err(AnemochoryError::InsufficientDiversity)
    }
}

fn try_draw(
    candidates: &[NodePoolEntry],
    hop_count: u8,
    destination: Option<&NodeId>,
    level: DiversityLevel,
    rng: &mut impl Rng,
) -> Option<Vec<NodePoolEntry>> {
    let hop_count = hop_count as usize;
    if hop_count == 0 {
        return None;
    }

    let mut path: Vec<NodePoolEntry> = Vec::with_capacity(hop_count);
    let mut used_nodes: HashSet<NodeId> = HashSet::new();
    let mut used_geo: HashSet<String> = HashSet::new();
    let mut used_operator: HashSet<String> = HashSet::new();

    for position in 0..hop_count {
        let is_last = position == hop_count - 1;
        let eligible: Vec<&NodePoolEntry> = candidates
            .iter()
            .filter(|n| n.can_relay())
            .filter(|n| !is_last || n.can_exit())
            .filter(|n| !used_nodes.contains(&n.node_id))
            .filter(|n| is_last || destination.map(|d| &n.node_id != d).unwrap_or(true))
            .filter(|n| !level.enforce_geography || !used_geo.contains(&n.geo_tag))
            .filter(|n| !level.enforce_operator || !used_operator.contains(&n.operator_tag))
            .filter(|n| n.draw_weight(MAX_HEALTH_AGE) > 0.0)
            .collect();

        let chosen = weighted_draw(&eligible, rng)?;
        used_nodes.insert(chosen.node_id);
        used_geo.insert(chosen.geo_tag.clone());
        used_operator.insert(chosen.operator_tag.clone());
        path.push(chosen.clone());
    }

    Some(path)
}

fn weighted_draw<'a>(candidates: &[&'a NodePoolEntry], rng: &mut impl Rng) -> Option<&'a NodePoolEntry> {
    let total: f64 = candidates.iter().map(|n| n.draw_weight(MAX_HEALTH_AGE)).sum();
    if candidates.is_empty() || total <= 0.0 {
        return None;
    }
    let mut draw = rng.gen_range(0.0..total);
    for node in candidates {
        let weight = node.draw_weight(MAX_HEALTH_AGE);
        if draw < weight {
            return Some(node);
        }
        draw -= weight;
    }
    candidates.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anemochory_core::{Capabilities, NodeHealth};
    use std::net::SocketAddr;

    fn entry(id: u8, geo: &str, operator: &str, caps: Capabilities) -> NodePoolEntry {
        NodePoolEntry {
            node_id: NodeId::from_bytes([id; 32]),
            address: "127.0.0.1:9000".parse::<SocketAddr>().unwrap(),
            public_key: [id; 32],
            capabilities: caps,
            geo_tag: geo.into(),
            operator_tag: operator.into(),
            weight: 1.0,
            reputation: 1.0,
            health: NodeHealth::healthy_now(),
        }
    }

    fn pool_with(entries: Vec<NodePoolEntry>) -> NodePool {
        let pool = NodePool::new();
        for e in entries {
            pool.insert(e);
        }
        pool
    }

    #[test]
    fn selects_a_diverse_path_when_candidates_are_sufficient() {
        let pool = pool_with(vec![
            entry(1, "eu-west", "A1", Capabilities::RELAY),
            entry(2, "eu-east", "A2", Capabilities::RELAY),
            entry(3, "us-east", "A3", Capabilities::RELAY | Capabilities::EXIT),
        ]);

        let path = PathSelector::select_path(&pool, 3, None).unwrap();
        assert_eq!(path.hop_count(), 3);
        assert!(path.hops.last().unwrap().can_exit());
    }

    #[test]
    fn relaxes_operator_then_geography_before_failing() {
        // 3 relays, all in the same region and under the same operator, one
        // exit-capable: strict diversity is impossible, but relaxing both
        // constraints in order yields a valid path instead of failing
        // immediately.
        let pool = pool_with(vec![
            entry(1, "eu-west", "A1", Capabilities::RELAY),
            entry(2, "eu-west", "A1", Capabilities::RELAY),
            entry(3, "eu-west", "A1", Capabilities::RELAY | Capabilities::EXIT),
        ]);

        let path = PathSelector::select_path(&pool, 3, None).unwrap();
        assert_eq!(path.hop_count(), 3);
    }

    #[test]
    fn insufficient_nodes_fails_with_insufficient_diversity() {
        let pool = pool_with(vec![entry(1, "eu-west", "A1", Capabilities::RELAY | Capabilities::EXIT)]);
        let err = PathSelector::select_path(&pool, 3, None).unwrap_err();
        assert_eq!(err, AnemochoryError::InsufficientDiversity);
    }

    #[test]
    fn destination_is_excluded_from_relay_hops() {
        let destination = NodeId::from_bytes([9; 32]);
        let pool = pool_with(vec![
            NodePoolEntry {
                node_id: destination,
                ..entry(9, "eu-west", "A1", Capabilities::RELAY)
            },
            entry(1, "eu-east", "A2", Capabilities::RELAY),
            entry(2, "us-east", "A3", Capabilities::RELAY | Capabilities::EXIT),
        ]);

        let path = PathSelector::select_path(&pool, 2, Some(&destination)).unwrap();
        assert!(!path.hops[0..path.hops.len() - 1]
            .iter()
            .any(|h| h.node_id == destination));
    }
}
