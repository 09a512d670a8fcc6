//! End-to-end: a client sends one payload through three real node runtimes
//! connected over loopback TCP, and the exit hop's sink receives it.
//!
//! Scaled down from a full live-network harness to the three roles the
//! protocol actually distinguishes — entry, relay, exit — since that's
//! enough to exercise every layer of wrapping and unwrapping once each.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anemochory_client::{open_session, send, ClientOptions, HandshakeCoordinator, SendOutcome};
use anemochory_core::{Capabilities, NodeHealth, NodeId, NodePoolEntry, SessionId};
use anemochory_crypto::SessionKey;
use anemochory_node::{LoopbackSink, NodeConfig, NodeRuntime, SessionResolver};
use anemochory_routing::{NodePool, OnionPath};
use anemochory_session::Session;

/// Stands in for a real handshake: derives the per-hop session key directly
/// from the pool entry's public key, the same shortcut the client crate's
/// own send tests use.
struct FixedKeyCoordinator;

impl HandshakeCoordinator for FixedKeyCoordinator {
    fn establish<'a>(
        &'a self,
        hop: &'a NodePoolEntry,
    ) -> Pin<Box<dyn Future<Output = anemochory_core::Result<SessionKey>> + Send + 'a>> {
        Box::pin(async move { Ok(SessionKey::from_bytes(hop.public_key)) })
    }
}

/// Every connection in this test belongs to the one session the node was
/// spun up with; a real deployment's resolver would consult whatever
/// out-of-band handshake state the embedder tracks per peer address.
struct StaticResolver(Arc<Session>);

impl SessionResolver for StaticResolver {
    fn resolve<'a>(
        &'a self,
        _peer: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = Option<Arc<Session>>> + Send + 'a>> {
        let session = self.0.clone();
        Box::pin(async move { Some(session) })
    }
}

fn hop_entry(seed: u8, addr: SocketAddr, caps: Capabilities) -> NodePoolEntry {
    NodePoolEntry {
        node_id: NodeId::from_bytes([seed; 32]),
        address: addr,
        public_key: [seed; 32],
        capabilities: caps,
        geo_tag: format!("zone-{seed}"),
        operator_tag: format!("op-{seed}"),
        weight: 1.0,
        reputation: 1.0,
        health: NodeHealth::healthy_now(),
    }
}

async fn spawn_node(addr: SocketAddr, key_seed: u8) -> Arc<LoopbackSink> {
    let session = Arc::new(Session::new(
        SessionId::from_bytes([key_seed; 16]),
        SessionKey::from_bytes([key_seed; 32]),
        256,
    ));
    let sink = Arc::new(LoopbackSink::new());
    let config = NodeConfig { listen_addr: addr, ..NodeConfig::default() };
    let runtime = Arc::new(NodeRuntime::new(config, Arc::new(StaticResolver(session)), sink.clone()));
    tokio::spawn(runtime.run(std::future::pending()));
    sink
}

#[tokio::test]
async fn three_hop_send_is_delivered_to_the_exit_sink() {
    let entry_addr: SocketAddr = "127.0.0.1:28801".parse().unwrap();
    let relay_addr: SocketAddr = "127.0.0.1:28802".parse().unwrap();
    let exit_addr: SocketAddr = "127.0.0.1:28803".parse().unwrap();

    let _entry_sink = spawn_node(entry_addr, 1).await;
    let _relay_sink = spawn_node(relay_addr, 2).await;
    let exit_sink = spawn_node(exit_addr, 3).await;

    // Give each accept loop a moment to bind before the client connects.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let pool = NodePool::new();
    let pinned_path = OnionPath {
        hops: vec![
            hop_entry(1, entry_addr, Capabilities::RELAY),
            hop_entry(2, relay_addr, Capabilities::RELAY),
            hop_entry(3, exit_addr, Capabilities::RELAY | Capabilities::EXIT),
        ],
    };

    let coordinator = FixedKeyCoordinator;
    let options = ClientOptions { pinned_path: Some(pinned_path), ..ClientOptions::default() };
    let mut session = open_session(&pool, &coordinator, None, options).await.unwrap();

    let outcome = send(
        &mut session,
        &pool,
        &coordinator,
        None,
        b"integration payload",
        std::future::pending(),
    )
    .await;
    assert_eq!(outcome, SendOutcome::Delivered);

    // The packet still has to hop relay -> exit asynchronously after the
    // client's write returns, so poll briefly rather than asserting at once.
    for _ in 0..40 {
        if !exit_sink.received().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(exit_sink.received(), vec![b"integration payload".to_vec()]);
}
