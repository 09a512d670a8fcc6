//! Length-prefixed padding to fill a layer to a fixed target size.
//!
//! `unpad` returns the same opaque `FormatViolation` for every failure mode
//! (short input, length field pointing past the buffer) — the spec's
//! constant-message property for padding errors.

use rand::RngCore;

use anemochory_core::{AnemochoryError, Result};

/// `BE u16 length ∥ data ∥ random_bytes(target - 2 - |data|)`.
///
/// Fails if `data` plus the 2-byte length prefix would not fit in `target`.
pub fn pad(data: &[u8], target: usize) -> Result<Vec<u8>> {
    if data.len() + 2 > target {
        return Err(AnemochoryError::FormatViolation);
    }
    let len: u16 = data
        .len()
        .try_into()
        .map_err(|_| AnemochoryError::FormatViolation)?;

    let mut out = Vec::with_capacity(target);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(data);
    let fill_len = target - 2 - data.len();
    let mut fill = vec![0u8; fill_len];
    rand::rngs::OsRng.fill_bytes(&mut fill);
    out.extend_from_slice(&fill);
    Ok(out)
}

/// Reverses `pad`: reads the 2-byte big-endian length, slices out `data`.
/// Any inconsistency (buffer too short, length exceeds remaining bytes)
/// returns the same opaque error with no length detail.
pub fn unpad(padded: &[u8]) -> Result<Vec<u8>> {
    if padded.len() < 2 {
        return Err(AnemochoryError::FormatViolation);
    }
    let len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    let body = &padded[2..];
    if len > body.len() {
        return Err(AnemochoryError::FormatViolation);
    }
    Ok(body[..len].to_vec())
}
