//! Key identifiers. Each `generate`/`rotate` call mints a fresh one, so a
//! rotated-out key's file sits under its own name rather than being
//! overwritten — recoverable by `unlock` until `delete_key` removes it.

use std::fmt;

use rand::RngCore;

pub const KEY_ID_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId([u8; KEY_ID_LEN]);

impl KeyId {
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_ID_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub(crate) fn file_name(&self) -> String {
        format!("{self}.amk")
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
