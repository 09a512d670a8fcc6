//! Ephemeral X25519 handshake producing the first-epoch session key.

use anemochory_core::{AnemochoryError, Result, SessionId};
use anemochory_crypto::{derive_initial_session_key, SessionKey};
use rand::RngCore;
use x25519_dalek::{EphemeralSecret, PublicKey};

/// This endpoint's half of an in-progress handshake. The private key is
/// moved out and zeroized by `x25519_dalek::EphemeralSecret`'s own `Drop`
/// impl the instant `complete` consumes it.
pub struct HandshakeState {
    secret: EphemeralSecret,
    pub public_key: PublicKey,
    pub handshake_salt: [u8; 16],
}

impl HandshakeState {
    /// Generates a fresh ephemeral keypair and a random handshake salt.
    pub fn initiate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
        let public_key = PublicKey::from(&secret);
        let mut handshake_salt = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut handshake_salt);
        Self {
            secret,
            public_key,
            handshake_salt,
        }
    }

    /// Completes the handshake against the peer's public key, deriving the
    /// first-epoch session key. `handshake_salt` must be the one agreed
    /// with the peer (either party's, so long as both use the same value).
    pub fn complete(self, peer_public_key: &PublicKey, handshake_salt: &[u8; 16]) -> SessionKey {
        let shared_secret = self.secret.diffie_hellman(peer_public_key);
        derive_initial_session_key(handshake_salt, shared_secret.as_bytes())
    }
}

/// Generates a fresh random session id.
pub fn new_session_id() -> SessionId {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    SessionId::from_bytes(bytes)
}

/// Validates a received peer public key is well-formed. `x25519_dalek`
/// accepts any 32-byte string as a Montgomery-form point, so this exists
/// only to centralize the `FormatViolation` mapping for malformed input.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    let arr: [u8; 32] = bytes.try_into().map_err(|_| AnemochoryError::FormatViolation)?;
    Ok(PublicKey::from(arr))
}
