//! The handshake seam: establishing a per-hop session key with one node in
//! a freshly drawn path. This crate doesn't wire the X25519 handshake onto
//! a transport itself — an embedder supplies that, the same seam
//! `anemochory-node` uses for its `SessionResolver`.

use std::future::Future;
use std::pin::Pin;

use anemochory_core::{NodePoolEntry, Result};
use anemochory_crypto::SessionKey;

pub trait HandshakeCoordinator: Send + Sync {
    fn establish<'a>(
        &'a self,
        hop: &'a NodePoolEntry,
    ) -> Pin<Box<dyn Future<Output = Result<SessionKey>> + Send + 'a>>;
}
