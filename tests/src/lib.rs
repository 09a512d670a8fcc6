//! Placeholder library target. This crate exists only to host the
//! multi-node integration tests in `tests/`; it has no public API of its
//! own.
