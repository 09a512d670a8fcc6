//! The per-connection session object: state machine, ratchet, replay cache,
//! and telemetry tied together behind one lock-guarded handle.

use std::time::Instant;

use anemochory_core::{AnemochoryError, FAULT_CLOSE_THRESHOLD, FAULT_WINDOW_SECS, SessionId};
use anemochory_crypto::{Nonce, SessionKey};
use parking_lot::Mutex;
use tracing::debug;

use crate::counters::{CountersSnapshot, SessionCounters};
use crate::ratchet::Ratchet;
use crate::replay::{timestamp_in_window, ReplayCache};

/// Lifecycle state. Transitions: `Negotiating -> Established -> Rotating ->
/// Established`, and any state -> `Closed` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Negotiating,
    Established,
    Rotating,
    Closed,
}

struct FaultWindow {
    count: u64,
    window_start: Instant,
}

impl FaultWindow {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    /// Records a fault and returns whether the session should now be
    /// force-closed.
    fn record(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= FAULT_WINDOW_SECS {
            self.count = 0;
            self.window_start = Instant::now();
        }
        self.count += 1;
        self.count >= FAULT_CLOSE_THRESHOLD
    }
}

struct Inner {
    state: SessionState,
    ratchet: Ratchet,
    replay: ReplayCache,
    faults: FaultWindow,
}

/// A live onion-routing session between this node and one peer.
pub struct Session {
    id: SessionId,
    inner: Mutex<Inner>,
    counters: SessionCounters,
}

/// Outcome of validating an inbound packet's freshness against this
/// session's replay cache and timestamp window, before any AEAD work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessCheck {
    Fresh,
    Stale(AnemochoryError),
}

impl Session {
    /// Builds a new session in `Established` state from a completed
    /// handshake's first-epoch key. A session is never directly constructed
    /// in `Negotiating` — the handshake module owns that transient state
    /// until a key exists to build a `Session` around.
    pub fn new(id: SessionId, initial_key: SessionKey, replay_capacity: usize) -> Self {
        Self {
            id,
            inner: Mutex::new(Inner {
                state: SessionState::Established,
                ratchet: Ratchet::new(initial_key),
                replay: ReplayCache::new(replay_capacity),
                faults: FaultWindow::new(),
            }),
            counters: SessionCounters::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    /// Checks an inbound packet's nonce and timestamp against replay
    /// defenses without consuming the nonce; call `commit_nonce` once the
    /// packet has also passed AEAD authentication.
    pub fn check_freshness(&self, nonce: &Nonce, timestamp: u32, now: u32) -> FreshnessCheck {
        let inner = self.inner.lock();
        if !timestamp_in_window(
            timestamp,
            now,
            anemochory_core::TIMESTAMP_BEHIND_TOLERANCE_SECS,
            anemochory_core::TIMESTAMP_AHEAD_TOLERANCE_SECS,
        ) {
            return FreshnessCheck::Stale(AnemochoryError::ReplayExpired);
        }
        if !inner.replay.is_fresh(nonce) {
            return FreshnessCheck::Stale(AnemochoryError::ReplayOrReorder);
        }
        FreshnessCheck::Fresh
    }

    /// Records a nonce as consumed after its packet has authenticated
    /// successfully. Must only be called once per accepted packet.
    pub fn commit_nonce(&self, nonce: Nonce) {
        self.inner.lock().replay.record(nonce);
    }

    /// Validates and advances the strictly-monotone sequence counter.
    pub fn accept_sequence(&self, seq: u64) -> bool {
        self.inner.lock().replay.accept_sequence(seq)
    }

    /// Current epoch's key plus any still-in-grace retired keys, in the
    /// order a decrypt attempt should try them.
    pub fn candidate_keys(&self) -> Vec<SessionKey> {
        // SessionKey is intentionally not Clone, so callers must instead
        // take the lock for the duration of their decrypt attempts; this
        // snapshot exists only for call sites that can tolerate copying
        // raw bytes behind a fresh SessionKey wrapper.
        self.inner
            .lock()
            .ratchet
            .candidate_keys()
            .map(|k| SessionKey::from_bytes(*k.expose()))
            .collect()
    }

    /// Runs the ratchet's rotation logic if its trigger has fired.
    pub fn maybe_rotate(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Closed {
            return;
        }
        inner.ratchet.expire_grace_keys();
        if inner.ratchet.should_rotate() {
            inner.state = SessionState::Rotating;
            inner.ratchet.rotate();
            inner.state = SessionState::Established;
            debug!(session_id = %self.id, epoch = inner.ratchet.epoch(), "session key rotated");
        }
    }

    pub fn record_packet_forwarded(&self) {
        self.counters.record_packet_forwarded();
        self.inner.lock().ratchet.record_packet();
    }

    /// Records a packet-level fault, logs it, and force-closes the session
    /// if the fault rate within the window exceeds the threshold.
    pub fn record_fault(&self, fault: AnemochoryError) {
        match fault {
            AnemochoryError::AuthFailure => self.counters.record_auth_failure(),
            AnemochoryError::ReplayExpired | AnemochoryError::ReplayOrReorder => {
                self.counters.record_replay_rejection()
            }
            AnemochoryError::FormatViolation => self.counters.record_format_violation(),
            AnemochoryError::RngExhausted => self.counters.record_rng_exhaustion(),
            _ => {}
        }
        debug!(session_id = %self.id, fault = ?fault, "packet-level fault");

        let mut inner = self.inner.lock();
        if inner.faults.record() {
            inner.state = SessionState::Closed;
            debug!(session_id = %self.id, "session force-closed: fault threshold exceeded");
        }
    }

    pub fn close(&self) {
        self.inner.lock().state = SessionState::Closed;
        debug!(session_id = %self.id, "session closed");
    }
}
