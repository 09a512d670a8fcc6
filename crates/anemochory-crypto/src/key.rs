//! Zeroize-on-drop session key material and HKDF layer-key derivation.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use anemochory_core::KEY_SIZE;

/// A 32-byte symmetric key, zeroized on drop. Deliberately not `Clone`: the
/// only way to read the bytes is the explicit `expose()` accessor, mirroring
/// `secrecy::ExposeSecret` — an accidental `key.clone()` at a call site that
/// should have moved ownership is a smell this type is designed to catch at
/// compile time.
#[derive(ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Reads the raw key bytes. Callers must not log or persist the result.
    pub fn expose(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey").field("bytes", &"<redacted>").finish()
    }
}

/// Derives a per-layer key via HKDF-SHA256.
///
/// `salt` is mandatory by signature — there is no empty-salt fallback, per
/// the spec's requirement that callers can't silently weaken the derivation.
/// `info = "anemochory-session-{session_id_hex}-layer-{layer}-of-{hop_count}"`.
pub fn derive_layer_key(salt: &[u8; 16], session_id_hex: &str, layer: u8, hop_count: u8) -> SessionKey {
    let info = format!(
        "anemochory-session-{session_id_hex}-layer-{layer}-of-{hop_count}"
    );
    let hk = Hkdf::<Sha256>::new(Some(salt), &[]);
    let mut out = [0u8; KEY_SIZE];
    hk.expand(info.as_bytes(), &mut out)
        .expect("HKDF-SHA256 output length 32 is always valid for this hash");
    SessionKey::from_bytes(out)
}

/// Derives the initial master session key from a handshake shared secret.
/// `info = "anemochory-initial-session"`.
pub fn derive_initial_session_key(handshake_salt: &[u8; 16], shared_secret: &[u8; 32]) -> SessionKey {
    let hk = Hkdf::<Sha256>::new(Some(handshake_salt), shared_secret);
    let mut out = [0u8; KEY_SIZE];
    hk.expand(b"anemochory-initial-session", &mut out)
        .expect("HKDF-SHA256 output length 32 is always valid for this hash");
    SessionKey::from_bytes(out)
}

/// Derives the next-epoch key from the current one. `salt = None` — the
/// ratchet step is keyed only by the current key itself, per spec.md §4.3.
pub fn derive_ratchet_key(current: &SessionKey, next_epoch: u64) -> SessionKey {
    let info = format!("anemochory-ratchet-{next_epoch}");
    let hk = Hkdf::<Sha256>::new(None, current.expose());
    let mut out = [0u8; KEY_SIZE];
    hk.expand(info.as_bytes(), &mut out)
        .expect("HKDF-SHA256 output length 32 is always valid for this hash");
    SessionKey::from_bytes(out)
}

/// Zeroizes an ephemeral scalar buffer immediately after a Diffie-Hellman
/// derivation. Kept as a free function so call sites read as an explicit,
/// auditable step rather than relying on `Drop` timing alone.
pub fn zeroize_ephemeral(buf: &mut [u8; 32]) {
    buf.zeroize();
}
