//! Keystore file IO: owner-only permissions and crash-safe atomic writes.
//!
//! Format-agnostic: reads/writes raw bytes. `format.rs` owns header layout.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use thiserror::Error;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[derive(Debug, Error)]
pub enum KeystoreIoError {
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("keystore path has no parent directory")]
    NoParentDir,
}

pub fn read_keystore_bytes(path: &Path) -> Result<Vec<u8>, KeystoreIoError> {
    let mut file = File::open(path)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Writes `bytes` to `path` via write-temp, fsync, atomic-rename, then
/// restricts the result to owner read/write only.
pub fn write_keystore_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<(), KeystoreIoError> {
    let dir = path.parent().ok_or(KeystoreIoError::NoParentDir)?;
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.as_file_mut().write_all(bytes)?;
    tmp.as_file_mut().sync_all()?;

    #[cfg(unix)]
    tmp.as_file().set_permissions(fs::Permissions::from_mode(0o600))?;

    tmp.persist(path).map_err(std::io::Error::from)?;
    set_permissions_0600(path)?;
    fsync_dir(dir)?;
    Ok(())
}

fn set_permissions_0600(path: &Path) -> Result<(), KeystoreIoError> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

fn fsync_dir(dir: &Path) -> Result<(), KeystoreIoError> {
    #[cfg(unix)]
    {
        File::open(dir)?.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}
