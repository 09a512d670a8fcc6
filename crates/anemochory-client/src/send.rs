//! Packet construction and the retry-with-backoff send loop.

use std::future::Future;
use std::net::{Ipv6Addr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anemochory_core::{AnemochoryError, NodeId};
use anemochory_crypto::{wrap_packet, HopSpec};
use anemochory_routing::NodePool;
use anemochory_transport::PacketStream;
use rand::Rng;
use tracing::{debug, warn};

use crate::coordinator::HandshakeCoordinator;
use crate::outcome::SendOutcome;
use crate::session::ClientSession;

const BACKOFF_BASE_MS: u64 = 100;
const BACKOFF_MAX_MS: u64 = 5_000;

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(16));
    let capped = exp.min(BACKOFF_MAX_MS);
    let jitter = rand::thread_rng().gen_range(0..=(capped / 4).max(1));
    Duration::from_millis(capped + jitter)
}

fn hop_addr_bytes(addr: SocketAddr) -> ([u8; 16], u16) {
    let ip = match addr.ip() {
        std::net::IpAddr::V4(v4) => v4.to_ipv6_mapped(),
        std::net::IpAddr::V6(v6) => v6,
    };
    (ip.octets(), addr.port())
}

fn unix_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

async fn attempt_send(session: &ClientSession, payload: &[u8]) -> anemochory_core::Result<()> {
    if session.path.hops.is_empty() {
        return Err(AnemochoryError::NoPathAvailable);
    }

    let hop_specs: Vec<HopSpec<'_>> = session
        .path
        .hops
        .iter()
        .zip(session.keys.iter())
        .map(|(hop, key)| {
            let (addr, port) = hop_addr_bytes(hop.address);
            HopSpec { node_id: hop.node_id, key, addr, port, session_id: session.id() }
        })
        .collect();

    let packet = wrap_packet(payload, &hop_specs, unix_timestamp(), session.next_sequence(), |_| true)?;

    let mut stream = PacketStream::connect(session.path.hops[0].address).await?;
    stream.write_packet(&packet).await
}

/// Sends `payload` to `destination` through `session`'s path. On failure,
/// rebuilds a fresh path (unless the session was opened with a pinned one)
/// and retries with exponential backoff plus jitter, up to
/// `session.options.max_retries` times. Never surfaces the internal fault
/// that caused a retry — only the final caller-relevant outcome.
///
/// `cancel` is raced against every connect/send attempt, backoff sleep, and
/// path rebuild; if it resolves first the send stops immediately and
/// returns `SendOutcome::Cancelled` rather than silently dropping the
/// payload mid-retry. Callers with nothing to cancel on can pass
/// `std::future::pending()`.
pub async fn send(
    session: &mut ClientSession,
    pool: &NodePool,
    coordinator: &dyn HandshakeCoordinator,
    destination: Option<&NodeId>,
    payload: &[u8],
    cancel: impl Future<Output = ()>,
) -> SendOutcome {
    let max_retries = session.options.max_retries;
    tokio::pin!(cancel);

    for attempt in 0..=max_retries {
        let attempt_result = tokio::select! {
            biased;
            _ = &mut cancel => return SendOutcome::Cancelled,
            result = attempt_send(session, payload) => result,
        };

        match attempt_result {
            Ok(()) => {
                debug!(session_id = %session.id(), attempt, "packet delivered to entry hop");
                return SendOutcome::Delivered;
            }
            Err(AnemochoryError::FormatViolation) => {
                return SendOutcome::Failed { reason: "payload exceeds path capacity".into() };
            }
            Err(err) => {
                warn!(session_id = %session.id(), attempt, ?err, "send attempt failed");
                if attempt == max_retries {
                    return SendOutcome::Failed { reason: "entry hop unreachable after retries".into() };
                }
                tokio::select! {
                    biased;
                    _ = &mut cancel => return SendOutcome::Cancelled,
                    _ = tokio::time::sleep(backoff_delay(attempt)) => {}
                }
                if session.options.pinned_path.is_none() {
                    let rebuilt = tokio::select! {
                        biased;
                        _ = &mut cancel => return SendOutcome::Cancelled,
                        result = session.rebuild(pool, coordinator, destination) => result,
                    };
                    match rebuilt {
                        Ok(()) => {}
                        Err(AnemochoryError::InsufficientDiversity | AnemochoryError::NoPathAvailable) => {
                            return SendOutcome::NoPathAvailable;
                        }
                        Err(_) => return SendOutcome::Failed { reason: "path rebuild failed".into() },
                    }
                }
            }
        }
    }

    SendOutcome::Failed { reason: "retries exhausted".into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_attempt_and_stays_capped() {
        let first = backoff_delay(0);
        let later = backoff_delay(10);
        assert!(first.as_millis() >= BACKOFF_BASE_MS as u128);
        assert!(later.as_millis() <= (BACKOFF_MAX_MS + BACKOFF_MAX_MS / 4) as u128);
    }

    #[test]
    fn hop_addr_bytes_round_trips_an_ipv4_address() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let (bytes, port) = hop_addr_bytes(addr);
        assert_eq!(port, 9000);
        assert_eq!(Ipv6Addr::from(bytes).to_ipv4_mapped(), Some("127.0.0.1".parse().unwrap()));
    }

    use std::future::Future;
    use std::pin::Pin;

    use anemochory_core::{Capabilities, NodeHealth, NodePoolEntry};
    use anemochory_crypto::SessionKey;
    use anemochory_routing::OnionPath;
    use anemochory_transport::PacketListener;

    use crate::options::ClientOptions;
    use crate::session::open_session;

    struct FixedKeyCoordinator;

    impl HandshakeCoordinator for FixedKeyCoordinator {
        fn establish<'a>(
            &'a self,
            hop: &'a NodePoolEntry,
        ) -> Pin<Box<dyn Future<Output = anemochory_core::Result<SessionKey>> + Send + 'a>> {
            Box::pin(async move { Ok(SessionKey::from_bytes(hop.public_key)) })
        }
    }

    fn entry(node_id_byte: u8, addr: SocketAddr, caps: Capabilities) -> NodePoolEntry {
        NodePoolEntry {
            node_id: anemochory_core::NodeId::from_bytes([node_id_byte; 32]),
            address: addr,
            public_key: [node_id_byte; 32],
            capabilities: caps,
            geo_tag: format!("zone-{node_id_byte}"),
            operator_tag: format!("op-{node_id_byte}"),
            weight: 1.0,
            reputation: 1.0,
            health: NodeHealth::healthy_now(),
        }
    }

    #[tokio::test]
    async fn send_delivers_a_packet_to_the_entry_hop() {
        let entry_listener = PacketListener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let entry_addr = entry_listener.local_addr().unwrap();

        let relay_addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let exit_addr: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let pool = NodePool::new();
        let pinned_path = OnionPath {
            hops: vec![
                entry(1, entry_addr, Capabilities::RELAY),
                entry(2, relay_addr, Capabilities::RELAY),
                entry(3, exit_addr, Capabilities::RELAY | Capabilities::EXIT),
            ],
        };

        let coordinator = FixedKeyCoordinator;
        let options = ClientOptions { pinned_path: Some(pinned_path), ..ClientOptions::default() };
        let mut session = open_session(&pool, &coordinator, None, options).await.unwrap();

        let received = tokio::spawn(async move {
            let (mut stream, _peer) = entry_listener.accept().await.unwrap();
            stream.read_packet().await.unwrap().unwrap()
        });

        let outcome = send(&mut session, &pool, &coordinator, None, b"hello", std::future::pending()).await;
        assert_eq!(outcome, SendOutcome::Delivered);

        let packet = received.await.unwrap();
        assert_eq!(packet.len(), anemochory_core::PACKET_SIZE);
    }

    #[tokio::test]
    async fn send_returns_cancelled_when_cancelled_before_any_attempt() {
        let unreachable: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let pool = NodePool::new();
        let pinned_path = OnionPath {
            hops: vec![
                entry(1, unreachable, Capabilities::RELAY),
                entry(2, unreachable, Capabilities::RELAY),
                entry(3, unreachable, Capabilities::RELAY | Capabilities::EXIT),
            ],
        };

        let coordinator = FixedKeyCoordinator;
        let options = ClientOptions { pinned_path: Some(pinned_path), ..ClientOptions::default() };
        let mut session = open_session(&pool, &coordinator, None, options).await.unwrap();

        let outcome = send(&mut session, &pool, &coordinator, None, b"hello", std::future::ready(())).await;
        assert_eq!(outcome, SendOutcome::Cancelled);
    }
}
