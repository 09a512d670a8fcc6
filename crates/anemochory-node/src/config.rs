//! Node runtime configuration, loaded from TOML.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Configuration for one node's receive loop and forwarding behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub listen_addr: SocketAddr,
    /// Maximum in-flight packets per peer connection before excess packets
    /// are dropped rather than queued.
    pub per_peer_high_water_mark: usize,
    /// Replay cache capacity per session.
    pub replay_cache_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9000".parse().expect("valid default listen address"),
            per_peer_high_water_mark: 256,
            replay_cache_capacity: anemochory_core::DEFAULT_REPLAY_CACHE_CAPACITY,
        }
    }
}
