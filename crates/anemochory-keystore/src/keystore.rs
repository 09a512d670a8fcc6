//! The master-key store handle: generate, unlock, lock, rotate, export_backup.

use std::path::{Path, PathBuf};

use anemochory_core::KEY_SIZE;
use secrecy::SecretString;
use thiserror::Error;
use tracing::debug;

use crate::crypto::{self, CryptoError, KEY_LEN, NONCE_LEN, SALT_LEN};
use crate::format::{assemble_file, FormatError, Header};
use crate::id::KeyId;
use crate::io::{self, KeystoreIoError};
use crate::locked::LockedBytes;

/// PBKDF2 iteration floor for `generate`/`rotate`.
pub const MIN_ITERATIONS: u32 = 600_000;
/// PBKDF2 iteration floor for `export_backup`, which uses a salt
/// independent of the live keystore's.
pub const MIN_BACKUP_ITERATIONS: u32 = 1_000_000;

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("incorrect passphrase or corrupted keystore file")]
    Unlock,
    #[error("keystore io error: {0}")]
    Io(#[from] KeystoreIoError),
    #[error("malformed keystore file: {0}")]
    Format(#[from] FormatError),
    #[error("keystore is locked; unlock before use")]
    Locked,
}

impl From<CryptoError> for KeystoreError {
    fn from(_: CryptoError) -> Self {
        KeystoreError::Unlock
    }
}

/// A master-key store bound to one key file within `dir`, named after its
/// `key_id`. The key material itself is only ever held in memory while
/// `unlock`ed, in a page-locked buffer.
pub struct MasterKeyStore {
    dir: PathBuf,
    key_id: KeyId,
    unlocked: Option<LockedBytes>,
}

impl MasterKeyStore {
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(self.key_id.file_name())
    }

    /// Generates a fresh random master key under a new `key_id`, wraps it
    /// under `passphrase`, and writes it into `dir`. Returns a store handle
    /// already unlocked, plus the `key_id` needed to `unlock` it again later.
    pub fn generate(dir: impl Into<PathBuf>, passphrase: &SecretString) -> Result<(Self, KeyId), KeystoreError> {
        let dir = dir.into();
        let key_id = KeyId::random();
        let master_key = crypto::random_bytes::<KEY_SIZE>();
        let store = Self::seal_and_write(dir, key_id, passphrase, &master_key, MIN_ITERATIONS)?;
        debug!(path = %store.path().display(), "master key generated");
        Ok((store, key_id))
    }

    /// Reads and decrypts `key_id`'s file within `dir`, returning an
    /// unlocked handle on success.
    pub fn unlock(dir: impl Into<PathBuf>, key_id: KeyId, passphrase: &SecretString) -> Result<Self, KeystoreError> {
        let dir = dir.into();
        let path = dir.join(key_id.file_name());
        let bytes = io::read_keystore_bytes(&path)?;
        let (header, ciphertext) = Header::decode(&bytes)?;
        let kek = crypto::derive_kek(passphrase, &header.salt, header.iterations);
        let plaintext = crypto::open(&kek, &header.nonce, &header.as_aad(), ciphertext)
            .map_err(|_| KeystoreError::Unlock)?;

        debug!(path = %path.display(), "master key unlocked");
        Ok(Self {
            dir,
            key_id,
            unlocked: Some(LockedBytes::new(plaintext.to_vec())),
        })
    }

    /// Reads the live master key. Errors if the store has been `lock()`ed.
    pub fn expose(&self) -> Result<&[u8], KeystoreError> {
        self.unlocked.as_ref().map(|k| k.expose()).ok_or(KeystoreError::Locked)
    }

    /// Zeroizes the in-memory key material. The on-disk file is untouched;
    /// call `unlock` again to resume using this store.
    pub fn lock(&mut self) {
        self.unlocked = None;
        debug!(path = %self.path().display(), "master key locked");
    }

    /// Generates a brand-new master key under a fresh `key_id`, persisted
    /// alongside (not over) the previous one. The previous `key_id`'s file
    /// is left on disk, still unlockable under the passphrase it was sealed
    /// with, until `delete_key` removes it explicitly.
    pub fn rotate(&mut self, passphrase: &SecretString) -> Result<KeyId, KeystoreError> {
        let new_id = KeyId::random();
        let master_key = crypto::random_bytes::<KEY_SIZE>();
        let rotated = Self::seal_and_write(self.dir.clone(), new_id, passphrase, &master_key, MIN_ITERATIONS)?;
        self.key_id = new_id;
        self.unlocked = rotated.unlocked;
        debug!(path = %self.path().display(), "master key rotated");
        Ok(new_id)
    }

    /// Permanently deletes a key_id's file from `dir`. Irreversible — call
    /// only once nothing still needs to recover that key_id.
    pub fn delete_key(dir: impl AsRef<Path>, key_id: KeyId) -> Result<(), KeystoreError> {
        let path = dir.as_ref().join(key_id.file_name());
        std::fs::remove_file(path).map_err(|err| KeystoreError::Io(KeystoreIoError::Io(err)))?;
        Ok(())
    }

    /// Writes an independently-salted, higher-iteration backup copy of the
    /// live master key to `backup_path`, still encrypted under
    /// `passphrase`. Does not touch the live keystore file.
    pub fn export_backup(&self, backup_path: impl AsRef<Path>, passphrase: &SecretString) -> Result<(), KeystoreError> {
        let master_key = self.expose()?.to_vec();
        let salt = crypto::random_bytes::<SALT_LEN>();
        let kek = crypto::derive_kek(passphrase, &salt, MIN_BACKUP_ITERATIONS);
        let nonce = crypto::random_bytes::<NONCE_LEN>();
        let header = Header::new(salt, MIN_BACKUP_ITERATIONS, nonce);
        let ciphertext = crypto::seal(&kek, &nonce, &header.as_aad(), &master_key)?;
        io::write_keystore_bytes_atomic(backup_path.as_ref(), &assemble_file(&header, &ciphertext))?;
        debug!(path = %backup_path.as_ref().display(), "master key backup exported");
        Ok(())
    }

    fn seal_and_write(
        dir: PathBuf,
        key_id: KeyId,
        passphrase: &SecretString,
        master_key: &[u8; KEY_SIZE],
        iterations: u32,
    ) -> Result<Self, KeystoreError> {
        let path = dir.join(key_id.file_name());
        let salt = crypto::random_bytes::<SALT_LEN>();
        let kek: zeroize::Zeroizing<[u8; KEY_LEN]> = crypto::derive_kek(passphrase, &salt, iterations);
        let nonce = crypto::random_bytes::<NONCE_LEN>();
        let header = Header::new(salt, iterations, nonce);
        let ciphertext = crypto::seal(&kek, &nonce, &header.as_aad(), master_key)?;
        io::write_keystore_bytes_atomic(&path, &assemble_file(&header, &ciphertext))?;

        Ok(Self {
            dir,
            key_id,
            unlocked: Some(LockedBytes::new(master_key.to_vec())),
        })
    }
}
