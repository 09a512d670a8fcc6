//! Opaque error taxonomy for the protocol core.
//!
//! Every variant is deliberately coarse: per §7 of the external interface,
//! callers and peers must never be able to distinguish *why* a packet-level
//! fault occurred (wrong key vs. tampered ciphertext vs. bad associated
//! data, say) from the error alone. Diagnostic detail belongs in counters,
//! not in error messages.

use thiserror::Error;

/// The complete set of faults the protocol core can surface.
///
/// No variant here carries a string or payload that would let a caller
/// infer which of several possible causes triggered it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AnemochoryError {
    /// AEAD tag verification failed. Does not distinguish wrong key,
    /// tampered ciphertext, or mismatched associated data.
    #[error("authentication failure")]
    AuthFailure,

    /// A packet's timestamp fell outside the clock-skew tolerance window.
    #[error("replay window expired")]
    ReplayExpired,

    /// A nonce was seen before, or a sequence number failed to strictly
    /// increase, within this session.
    #[error("replay or reorder detected")]
    ReplayOrReorder,

    /// Packet size, field layout, or padding was structurally invalid.
    #[error("format violation")]
    FormatViolation,

    /// Ten consecutive nonce collisions against the session registry.
    #[error("random nonce generation exhausted")]
    RngExhausted,

    /// Path selection could not assemble any path of the requested length.
    #[error("no path available")]
    NoPathAvailable,

    /// Path selection could not satisfy diversity constraints even after
    /// relaxation.
    #[error("insufficient diversity in node pool")]
    InsufficientDiversity,

    /// The session has transitioned to `Closed` and rejects further use.
    #[error("session closed")]
    SessionClosed,

    /// Ephemeral key exchange did not complete.
    #[error("handshake failed")]
    HandshakeFailed,

    /// The peer could not be reached.
    #[error("peer unreachable")]
    PeerUnreachable,

    /// An I/O wait exceeded its bounded timeout.
    #[error("operation timed out")]
    Timeout,

    /// The operation was cancelled before completion; no payload was sent.
    #[error("operation cancelled")]
    Cancelled,
}

impl AnemochoryError {
    /// Whether this fault is packet-level (recovered locally: drop, count,
    /// continue) rather than session- or caller-fatal.
    pub fn is_packet_level(&self) -> bool {
        matches!(
            self,
            Self::AuthFailure
                | Self::ReplayExpired
                | Self::ReplayOrReorder
                | Self::FormatViolation
                | Self::RngExhausted
        )
    }
}
