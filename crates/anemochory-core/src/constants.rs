//! Wire-format constants. Bit-exact per the protocol's external interface —
//! changing any of these breaks interoperability with every other
//! implementation of the format.

/// Total on-wire size of every onion packet, at every hop.
pub const PACKET_SIZE: usize = 1024;
/// Unencrypted header size: version, hop_count, layer_index, flags, timestamp.
pub const HEADER_SIZE: usize = 8;
/// AEAD nonce size (ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;
/// AEAD authentication tag size.
pub const TAG_SIZE: usize = 16;
/// Size of the routing_info block inside each layer's plaintext.
pub const ROUTING_INFO_SIZE: usize = 56;
/// Symmetric key size for AEAD and session keys.
pub const KEY_SIZE: usize = 32;

/// Encrypted payload size: PACKET_SIZE - HEADER_SIZE.
pub const ENCRYPTED_PAYLOAD_SIZE: usize = PACKET_SIZE - HEADER_SIZE;
/// Plaintext capacity for the innermost layer's `routing_info ∥ inner`.
pub const LAYER_PLAINTEXT_SIZE: usize = ENCRYPTED_PAYLOAD_SIZE - NONCE_SIZE - TAG_SIZE;

/// Minimum and maximum hop counts a path may use.
pub const MIN_HOPS: u8 = 3;
pub const MAX_HOPS: u8 = 7;

/// Current wire-format version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Replay-cache default capacity (nonces retained per session).
pub const DEFAULT_REPLAY_CACHE_CAPACITY: usize = 100_000;

/// Grace window during which a previous-epoch session key may still decrypt.
pub const GRACE_WINDOW_SECS: u64 = 60;
/// Maximum number of retained previous-epoch keys.
pub const MAX_RETAINED_KEYS: usize = 3;
/// Ratchet trigger: packets encrypted under the current epoch before rotating.
pub const RATCHET_PACKET_THRESHOLD: u64 = 10_000;
/// Ratchet trigger: wall-clock age of the current epoch before rotating.
pub const RATCHET_TIME_THRESHOLD_SECS: u64 = 3_600;

/// Clock-skew tolerance: a packet's timestamp must satisfy
/// `now - timestamp <= BEHIND_TOLERANCE_SECS` and
/// `timestamp - now <= AHEAD_TOLERANCE_SECS`.
pub const TIMESTAMP_BEHIND_TOLERANCE_SECS: u64 = 60;
pub const TIMESTAMP_AHEAD_TOLERANCE_SECS: u64 = 5;

/// Forwarding jitter bounds (milliseconds).
pub const JITTER_MIN_MS: u64 = 5;
pub const JITTER_MAX_MS: u64 = 50;

/// Bound on any single connect/read/write I/O wait. An op that exceeds this
/// fails with `Timeout` rather than hanging the caller indefinitely.
pub const IO_TIMEOUT_MS: u64 = 5_000;

/// Maximum consecutive nonce collisions before `seal()` gives up.
pub const MAX_NONCE_RETRIES: u32 = 10;

/// A session that accumulates this many packet-level faults within
/// `FAULT_WINDOW_SECS` is forced closed.
pub const FAULT_CLOSE_THRESHOLD: u64 = 50;
/// Sliding window over which `FAULT_CLOSE_THRESHOLD` is counted.
pub const FAULT_WINDOW_SECS: u64 = 10;

/// Computes the maximum payload capacity (bytes) for a path of `hop_count`
/// hops: `932 - 84 * (hop_count - 1)`.
///
/// `932` is `LAYER_PLAINTEXT_SIZE - ROUTING_INFO_SIZE` (the innermost layer's
/// space for `padding_length ∥ payload ∥ random_fill` once routing info is
/// subtracted); `84` is `ROUTING_INFO_SIZE + NONCE_SIZE + TAG_SIZE`, the
/// overhead each additional wrapping layer consumes. This is derived from the
/// bit-exact wire constants (`PACKET_SIZE`, `HEADER_SIZE`, `NONCE_SIZE`,
/// `TAG_SIZE`, `ROUTING_INFO_SIZE`) rather than taken from the narrative
/// figure of 944, which is off by exactly `NONCE_SIZE` against those
/// constants; the wire constants win.
pub fn payload_capacity(hop_count: u8) -> usize {
    let inner = LAYER_PLAINTEXT_SIZE - ROUTING_INFO_SIZE;
    let per_hop_overhead = ROUTING_INFO_SIZE + NONCE_SIZE + TAG_SIZE;
    inner - per_hop_overhead * (hop_count as usize - 1)
}
