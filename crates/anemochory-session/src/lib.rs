//! Session state machine for the Anemochory protocol: X25519 handshake,
//! key-epoch ratchet, replay cache, and per-session telemetry.

mod counters;
mod handshake;
mod ratchet;
mod replay;
mod session;

pub use counters::{CountersSnapshot, SessionCounters};
pub use handshake::{new_session_id, parse_public_key, HandshakeState};
pub use x25519_dalek::PublicKey;
pub use ratchet::Ratchet;
pub use replay::{timestamp_in_window, ReplayCache};
pub use session::{FreshnessCheck, Session, SessionState};

pub use anemochory_core::{AnemochoryError, Result};
