//! AEAD primitives, layer-key derivation, padding, and the onion packet
//! codec for the Anemochory protocol.
//!
//! This crate is synchronous, deterministic-given-its-inputs, and owns no
//! session state: nonce-uniqueness enforcement is injected by the caller
//! (`anemochory-session`) as a closure so the cryptographic engine never has
//! to reach across a lock to ask "have I seen this nonce before".

mod aead;
mod key;
mod onion;
mod padding;

pub use aead::{open, seal, Nonce, CIPHERTEXT_TAG_OVERHEAD};
pub use key::{
    derive_initial_session_key, derive_layer_key, derive_ratchet_key, zeroize_ephemeral,
    SessionKey,
};
pub use onion::{
    unwrap_packet, wrap_packet, Header, HopSpec, PacketView, RoutingInfo, UnwrapOutcome,
};
pub use padding::{pad, unpad};

pub use anemochory_core::{AnemochoryError, Result};
