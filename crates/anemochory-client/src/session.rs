//! A client's view of one onion-routed path: the hops, the per-hop keys
//! established with each of them, and this session's outbound sequence.

use std::sync::atomic::{AtomicU64, Ordering};

use anemochory_core::{NodeId, Result, SessionId};
use anemochory_crypto::SessionKey;
use anemochory_routing::{NodePool, OnionPath, PathSelector};
use rand::RngCore;

use crate::coordinator::HandshakeCoordinator;
use crate::options::ClientOptions;

/// A drawn path plus the live per-hop keys negotiated with it. Not `Clone`:
/// `SessionKey` deliberately isn't, so a session's keys move or zeroize,
/// never silently duplicate.
pub struct ClientSession {
    id: SessionId,
    pub(crate) path: OnionPath,
    pub(crate) keys: Vec<SessionKey>,
    sequence: AtomicU64,
    pub(crate) options: ClientOptions,
}

impl ClientSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn path(&self) -> &OnionPath {
        &self.path
    }

    /// Returns the next sequence number for a packet sent on this session,
    /// advancing the counter. Starts at a random value rather than zero so
    /// a session's first packet can't be fingerprinted by sequence alone.
    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Draws a fresh path (unless `options.pinned_path` is set) and
    /// replaces this session's path and keys with it. Used by `send`'s
    /// retry loop when the current path's entry hop has failed.
    pub(crate) async fn rebuild(
        &mut self,
        pool: &NodePool,
        coordinator: &dyn HandshakeCoordinator,
        destination: Option<&NodeId>,
    ) -> Result<()> {
        let path = match &self.options.pinned_path {
            Some(pinned) => pinned.clone(),
            None => PathSelector::select_path(pool, self.options.hop_count, destination)?,
        };
        let keys = establish_keys(&path, coordinator).await?;
        self.path = path;
        self.keys = keys;
        Ok(())
    }
}

async fn establish_keys(path: &OnionPath, coordinator: &dyn HandshakeCoordinator) -> Result<Vec<SessionKey>> {
    let mut keys = Vec::with_capacity(path.hop_count());
    for hop in &path.hops {
        keys.push(coordinator.establish(hop).await?);
    }
    Ok(keys)
}

/// Draws a path through `pool` (or reuses `options.pinned_path`), negotiates
/// a session key with every hop via `coordinator`, and returns a session
/// ready to send through it.
pub async fn open_session(
    pool: &NodePool,
    coordinator: &dyn HandshakeCoordinator,
    destination: Option<&NodeId>,
    options: ClientOptions,
) -> Result<ClientSession> {
    let path = match &options.pinned_path {
        Some(pinned) => pinned.clone(),
        None => PathSelector::select_path(pool, options.hop_count, destination)?,
    };
    let keys = establish_keys(&path, coordinator).await?;

    Ok(ClientSession {
        id: anemochory_session::new_session_id(),
        path,
        keys,
        sequence: AtomicU64::new(rand::rngs::OsRng.next_u64()),
        options,
    })
}

/// Consumes a session. Its `SessionKey`s zeroize on drop.
pub fn close_session(_session: ClientSession) {}
