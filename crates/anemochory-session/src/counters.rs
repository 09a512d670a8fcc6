//! Read-only per-session telemetry. Counters only ever increase; there is
//! no reset method, so a long-lived session's lifetime totals are always
//! available to whatever scrapes them.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SessionCounters {
    auth_failures: AtomicU64,
    replay_rejections: AtomicU64,
    format_violations: AtomicU64,
    rng_exhaustions: AtomicU64,
    packets_forwarded: AtomicU64,
}

/// Point-in-time snapshot of a `SessionCounters`, suitable for logging or
/// exposing over a metrics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub auth_failures: u64,
    pub replay_rejections: u64,
    pub format_violations: u64,
    pub rng_exhaustions: u64,
    pub packets_forwarded: u64,
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replay_rejection(&self) {
        self.replay_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_format_violation(&self) {
        self.format_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rng_exhaustion(&self) {
        self.rng_exhaustions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet_forwarded(&self) {
        self.packets_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            replay_rejections: self.replay_rejections.load(Ordering::Relaxed),
            format_violations: self.format_violations.load(Ordering::Relaxed),
            rng_exhaustions: self.rng_exhaustions.load(Ordering::Relaxed),
            packets_forwarded: self.packets_forwarded.load(Ordering::Relaxed),
        }
    }
}
