//! The caller-visible result of one `send` call.

/// Never carries raw internal fault detail (wrong key vs. tampered
/// ciphertext vs. a dropped connection) — only the category a caller can
/// act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Failed { reason: String },
    NoPathAvailable,
    Cancelled,
}
