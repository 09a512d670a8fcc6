//! Per-session send configuration.

use anemochory_routing::OnionPath;

/// Tuning knobs for `open_session`/`send`. `Default` gives zero-config
/// behavior: a fresh 3-hop path per send, three retries with backoff.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Hop count for a freshly drawn path (3-7 per the protocol's bounds).
    pub hop_count: u8,
    pub max_retries: u32,
    /// When set, every attempt (including retries) reuses this exact path
    /// instead of drawing a fresh one.
    pub pinned_path: Option<OnionPath>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            hop_count: 3,
            max_retries: 3,
            pinned_path: None,
        }
    }
}
