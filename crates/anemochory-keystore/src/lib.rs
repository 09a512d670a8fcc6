//! Passphrase-wrapped master-key storage for Anemochory nodes and clients.
//!
//! `generate`/`unlock`/`lock`/`rotate`/`export_backup` on a single file
//! format: PBKDF2-HMAC-SHA256 key-encryption key, AES-256-GCM payload,
//! atomic write-temp-fsync-rename, owner-only file permissions.

mod crypto;
mod format;
mod id;
mod io;
mod keystore;
mod locked;

pub use format::FORMAT_VERSION;
pub use id::KeyId;
pub use keystore::{KeystoreError, MasterKeyStore, MIN_BACKUP_ITERATIONS, MIN_ITERATIONS};
