//! Cryptographic building blocks for the master-key store.
//!
//! - KDF: PBKDF2-HMAC-SHA256 derives a key-encryption key directly from the
//!   operator's passphrase and a per-file salt; there is no separate DEK
//!   wrapping step since the spec mandates a single passphrase-derived key
//!   encrypting the master key directly.
//! - AEAD: AES-256-GCM. Nonces must be unique per key.
//! - AAD: the file header (version ∥ salt ∥ iterations) binds the
//!   ciphertext to its own parameters so a header edit fails decryption.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    #[error("aead error")]
    Aead,
}

pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Derives a 32-byte key-encryption key from the passphrase via
/// PBKDF2-HMAC-SHA256. Callers are responsible for enforcing the iteration
/// floor appropriate to the caller (`generate`/`rotate` vs `export_backup`).
pub fn derive_kek(passphrase: &SecretString, salt: &[u8; SALT_LEN], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(passphrase.expose_secret().as_bytes(), salt, iterations, &mut *out);
    out
}

/// Encrypts the master key under `kek`, binding `aad` (the file header) to
/// the ciphertext.
pub fn seal(
    kek: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    master_key: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(kek).map_err(|_| CryptoError::Aead)?;
    cipher
        .encrypt(AesNonce::from_slice(nonce), Payload { msg: master_key, aad })
        .map_err(|_| CryptoError::Aead)
}

/// Decrypts the master key under `kek`. Fails if the passphrase was wrong,
/// the ciphertext was tampered with, or `aad` does not match what was used
/// to seal it.
pub fn open(
    kek: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(kek).map_err(|_| CryptoError::Aead)?;
    let plaintext = cipher
        .decrypt(AesNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::Aead)?;
    Ok(Zeroizing::new(plaintext))
}
