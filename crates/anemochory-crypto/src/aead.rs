//! Single-layer ChaCha20-Poly1305 seal/open.

use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, KeyInit};
use rand::RngCore;

use anemochory_core::{AnemochoryError, Result, MAX_NONCE_RETRIES, NONCE_SIZE, TAG_SIZE};

use crate::key::SessionKey;

pub type Nonce = [u8; NONCE_SIZE];

/// Bytes a `seal()` call adds beyond the plaintext length: the auth tag.
/// The nonce is emitted alongside, not appended to this value.
pub const CIPHERTEXT_TAG_OVERHEAD: usize = TAG_SIZE;

/// Encrypts `plaintext` under `key`, binding `ad` into the tag.
///
/// Draws a fresh random nonce from the OS CSPRNG and calls `nonce_is_fresh`
/// to check it against the session's nonce registry (injected so this crate
/// never has to own or lock session state). Retries up to
/// `MAX_NONCE_RETRIES` times on a reported collision; gives up with
/// `RngExhausted`.
pub fn seal(
    key: &SessionKey,
    plaintext: &[u8],
    ad: &[u8],
    mut nonce_is_fresh: impl FnMut(&Nonce) -> bool,
) -> Result<(Nonce, Vec<u8>)> {
    let cipher = ChaCha20Poly1305::new(key.expose().into());

    for _ in 0..MAX_NONCE_RETRIES {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        if !nonce_is_fresh(&nonce) {
            continue;
        }
        let ciphertext = cipher
            .encrypt(
                (&nonce).into(),
                Payload {
                    msg: plaintext,
                    aad: ad,
                },
            )
            .map_err(|_| AnemochoryError::FormatViolation)?;
        return Ok((nonce, ciphertext));
    }
    Err(AnemochoryError::RngExhausted)
}

/// Decrypts `ciphertext_and_tag` under `key`, verifying `ad`.
///
/// Fails with the single opaque `AuthFailure` variant regardless of whether
/// the key, ciphertext, or associated data was the mismatch.
pub fn open(
    key: &SessionKey,
    nonce: &Nonce,
    ciphertext_and_tag: &[u8],
    ad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.expose().into());
    cipher
        .decrypt(
            nonce.into(),
            Payload {
                msg: ciphertext_and_tag,
                aad: ad,
            },
        )
        .map_err(|_| AnemochoryError::AuthFailure)
}
