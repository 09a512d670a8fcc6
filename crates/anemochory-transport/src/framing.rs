//! 4-byte big-endian length-prefixed framing over an async byte stream.
//!
//! Every frame on an Anemochory wire connection carries exactly one onion
//! packet, so a frame whose declared length isn't `PACKET_SIZE` is always a
//! protocol violation rather than a legitimate larger/smaller message.

use anemochory_core::{AnemochoryError, Result, PACKET_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const LENGTH_PREFIX_SIZE: usize = 4;

/// Reads one length-prefixed frame, rejecting any declared length other
/// than `PACKET_SIZE`. Returns `Ok(None)` on a clean EOF before any bytes
/// of the next frame arrive; any other short read is a `FormatViolation`.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<[u8; PACKET_SIZE]>> {
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(_) => return Err(AnemochoryError::FormatViolation),
    }

    let declared_len = u32::from_be_bytes(len_buf) as usize;
    if declared_len != PACKET_SIZE {
        return Err(AnemochoryError::FormatViolation);
    }

    let mut packet = [0u8; PACKET_SIZE];
    reader
        .read_exact(&mut packet)
        .await
        .map_err(|_| AnemochoryError::FormatViolation)?;
    Ok(Some(packet))
}

/// Writes one length-prefixed frame carrying exactly `PACKET_SIZE` bytes.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, packet: &[u8; PACKET_SIZE]) -> Result<()> {
    let len_buf = (PACKET_SIZE as u32).to_be_bytes();
    writer
        .write_all(&len_buf)
        .await
        .map_err(|_| AnemochoryError::PeerUnreachable)?;
    writer
        .write_all(packet)
        .await
        .map_err(|_| AnemochoryError::PeerUnreachable)?;
    writer.flush().await.map_err(|_| AnemochoryError::PeerUnreachable)?;
    Ok(())
}
