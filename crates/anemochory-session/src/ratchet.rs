//! Key-epoch ratchet: rotation trigger, bounded retained-key ring, and the
//! 60-second grace window during which packets keyed under a just-retired
//! epoch are still accepted.

use std::collections::VecDeque;
use std::time::Instant;

use anemochory_core::{GRACE_WINDOW_SECS, MAX_RETAINED_KEYS, RATCHET_PACKET_THRESHOLD, RATCHET_TIME_THRESHOLD_SECS};
use anemochory_crypto::{derive_ratchet_key, SessionKey};

/// One retired key, with the instant it stopped being the live epoch.
struct RetiredKey {
    key: SessionKey,
    retired_at: Instant,
}

/// Tracks the live session key plus a bounded ring of recently-retired
/// keys, so a hop that rotates mid-flight doesn't drop packets already in
/// transit under the previous epoch.
pub struct Ratchet {
    epoch: u64,
    current: SessionKey,
    retired: VecDeque<RetiredKey>,
    packets_since_rotation: u64,
    rotated_at: Instant,
}

impl Ratchet {
    pub fn new(initial_key: SessionKey) -> Self {
        Self {
            epoch: 0,
            current: initial_key,
            retired: VecDeque::with_capacity(MAX_RETAINED_KEYS),
            packets_since_rotation: 0,
            rotated_at: Instant::now(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn current(&self) -> &SessionKey {
        &self.current
    }

    /// Call once per packet processed under the live epoch.
    pub fn record_packet(&mut self) {
        self.packets_since_rotation = self.packets_since_rotation.saturating_add(1);
    }

    /// Whether the packet-count or wall-clock rotation trigger has fired.
    pub fn should_rotate(&self) -> bool {
        self.packets_since_rotation >= RATCHET_PACKET_THRESHOLD
            || self.rotated_at.elapsed().as_secs() >= RATCHET_TIME_THRESHOLD_SECS
    }

    /// Derives the next epoch's key from the current one, retiring the
    /// current key into the grace ring and evicting the oldest retained
    /// key past `MAX_RETAINED_KEYS`.
    pub fn rotate(&mut self) {
        let next_epoch = self.epoch + 1;
        let next_key = derive_ratchet_key(&self.current, next_epoch);

        let retiring = std::mem::replace(&mut self.current, next_key);
        self.retired.push_back(RetiredKey {
            key: retiring,
            retired_at: Instant::now(),
        });
        while self.retired.len() > MAX_RETAINED_KEYS {
            self.retired.pop_front();
        }

        self.epoch = next_epoch;
        self.packets_since_rotation = 0;
        self.rotated_at = Instant::now();
    }

    /// Drops any retained key whose grace window has expired. Call
    /// periodically (e.g. alongside `should_rotate`) to bound the ring's
    /// lifetime independent of eviction-by-count.
    pub fn expire_grace_keys(&mut self) {
        self.retired
            .retain(|r| r.retired_at.elapsed().as_secs() < GRACE_WINDOW_SECS);
    }

    /// Iterates live-then-retired keys in the order a decrypt attempt
    /// should try them. Retired keys past their grace window are skipped.
    /// Every candidate key is yielded unconditionally regardless of which
    /// one ultimately succeeds, so a failed attempt against a grace key
    /// takes the same code path (and roughly the same time) as one
    /// against the live key.
    pub fn candidate_keys(&self) -> impl Iterator<Item = &SessionKey> {
        std::iter::once(&self.current).chain(self.retired.iter().filter_map(|r| {
            if r.retired_at.elapsed().as_secs() < GRACE_WINDOW_SECS {
                Some(&r.key)
            } else {
                None
            }
        }))
    }
}
