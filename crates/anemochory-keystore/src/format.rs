//! On-disk file header: `{version: u8, salt: [u8; 16], iterations: u32 BE,
//! nonce: [u8; 12], ciphertext ∥ tag}`.

use thiserror::Error;

use crate::crypto::{NONCE_LEN, SALT_LEN};

pub const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 1 + SALT_LEN + 4 + NONCE_LEN;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error("keystore file too short to contain a header")]
    Truncated,
    #[error("unsupported keystore file version")]
    UnsupportedVersion,
}

pub struct Header {
    pub version: u8,
    pub salt: [u8; SALT_LEN],
    pub iterations: u32,
    pub nonce: [u8; NONCE_LEN],
}

impl Header {
    pub fn new(salt: [u8; SALT_LEN], iterations: u32, nonce: [u8; NONCE_LEN]) -> Self {
        Self {
            version: FORMAT_VERSION,
            salt,
            iterations,
            nonce,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.version;
        out[1..1 + SALT_LEN].copy_from_slice(&self.salt);
        let iter_off = 1 + SALT_LEN;
        out[iter_off..iter_off + 4].copy_from_slice(&self.iterations.to_be_bytes());
        let nonce_off = iter_off + 4;
        out[nonce_off..nonce_off + NONCE_LEN].copy_from_slice(&self.nonce);
        out
    }

    /// Splits a full keystore file into its header and trailing
    /// ciphertext-plus-tag.
    pub fn decode(bytes: &[u8]) -> Result<(Self, &[u8]), FormatError> {
        if bytes.len() < HEADER_LEN {
            return Err(FormatError::Truncated);
        }
        let version = bytes[0];
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion);
        }
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[1..1 + SALT_LEN]);
        let iter_off = 1 + SALT_LEN;
        let iterations = u32::from_be_bytes(bytes[iter_off..iter_off + 4].try_into().unwrap());
        let nonce_off = iter_off + 4;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[nonce_off..nonce_off + NONCE_LEN]);
        let ciphertext = &bytes[nonce_off + NONCE_LEN..];
        Ok((
            Self {
                version,
                salt,
                iterations,
                nonce,
            },
            ciphertext,
        ))
    }

    /// Header bytes serve as the AEAD associated data, binding the
    /// ciphertext to its own parameters.
    pub fn as_aad(&self) -> [u8; HEADER_LEN] {
        self.encode()
    }
}

pub fn assemble_file(header: &Header, ciphertext: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(ciphertext);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = Header::new([7u8; SALT_LEN], 600_000, [9u8; NONCE_LEN]);
        let file = assemble_file(&header, b"ciphertext-and-tag");
        let (decoded, ciphertext) = Header::decode(&file).unwrap();
        assert_eq!(decoded.version, FORMAT_VERSION);
        assert_eq!(decoded.salt, header.salt);
        assert_eq!(decoded.iterations, 600_000);
        assert_eq!(decoded.nonce, header.nonce);
        assert_eq!(ciphertext, b"ciphertext-and-tag");
    }

    #[test]
    fn decode_rejects_truncated_input() {
        assert_eq!(Header::decode(&[1, 2, 3]).unwrap_err(), FormatError::Truncated);
    }

    #[test]
    fn decode_rejects_wrong_version() {
        let header = Header::new([0u8; SALT_LEN], 1, [0u8; NONCE_LEN]);
        let mut file = assemble_file(&header, b"x");
        file[0] = 99;
        assert_eq!(Header::decode(&file).unwrap_err(), FormatError::UnsupportedVersion);
    }
}
