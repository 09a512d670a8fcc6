//! Per-packet processing: freshness check, constant-work key-retry unwrap,
//! sequence acceptance, and dispatch decision. No network I/O happens here
//! — the runtime owns connections and jitter; this module only decides
//! what should happen to one inbound packet.

use anemochory_core::{AnemochoryError, PACKET_SIZE};
use anemochory_crypto::{unwrap_packet, PacketView, UnwrapOutcome};
use anemochory_session::{FreshnessCheck, Session};

/// What to do with one packet after it's been unwrapped (or rejected).
pub enum PipelineOutcome {
    Forward {
        packet: [u8; PACKET_SIZE],
        next_hop_addr: [u8; 16],
        next_hop_port: u16,
    },
    Deliver {
        payload: Vec<u8>,
    },
    Drop(AnemochoryError),
}

/// Runs one inbound packet through the full per-hop pipeline against
/// `session`: structural parse, timestamp/nonce freshness, decrypt against
/// every still-in-grace key, sequence acceptance, then a forward-or-deliver
/// decision.
///
/// Every candidate key is tried regardless of whether an earlier one
/// already succeeded — `Vec::collect` over all of them before picking the
/// first `Ok` — so which grace-epoch key matched never shows up as a
/// timing difference.
pub fn process_inbound_packet(session: &Session, packet: &[u8; PACKET_SIZE], now: u32) -> PipelineOutcome {
    let view = match PacketView::parse(packet) {
        Ok(view) => view,
        Err(err) => {
            session.record_fault(err);
            return PipelineOutcome::Drop(err);
        }
    };

    let nonce = match view.nonce() {
        Ok(nonce) => nonce,
        Err(err) => {
            session.record_fault(err);
            return PipelineOutcome::Drop(err);
        }
    };

    match session.check_freshness(&nonce, view.header.timestamp, now) {
        FreshnessCheck::Fresh => {}
        FreshnessCheck::Stale(err) => {
            session.record_fault(err);
            return PipelineOutcome::Drop(err);
        }
    }

    let candidates = session.candidate_keys();
    let attempts: Vec<_> = candidates.iter().map(|key| unwrap_packet(packet, key)).collect();
    let (routing_info, outcome) = match attempts.into_iter().find(Result::is_ok) {
        Some(Ok(unwrapped)) => unwrapped,
        _ => {
            session.record_fault(AnemochoryError::AuthFailure);
            return PipelineOutcome::Drop(AnemochoryError::AuthFailure);
        }
    };

    if !session.accept_sequence(routing_info.sequence_number) {
        session.record_fault(AnemochoryError::ReplayOrReorder);
        return PipelineOutcome::Drop(AnemochoryError::ReplayOrReorder);
    }

    session.commit_nonce(nonce);
    session.record_packet_forwarded();
    session.maybe_rotate();

    match outcome {
        UnwrapOutcome::Forward { packet, next_hop_addr, next_hop_port } => {
            PipelineOutcome::Forward { packet, next_hop_addr, next_hop_port }
        }
        UnwrapOutcome::Deliver { payload } => PipelineOutcome::Deliver { payload },
    }
}
