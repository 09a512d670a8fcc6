//! Anemochory Demo Binary
//!
//! Spins up three local nodes (entry, relay, exit) and one client, sends a
//! single payload end to end, and prints what arrived.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anemochory_client::{open_session, send, ClientOptions, HandshakeCoordinator, SendOutcome};
use anemochory_core::{Capabilities, NodeHealth, NodeId, NodePoolEntry, SessionId};
use anemochory_crypto::SessionKey;
use anemochory_logging::LogLevel;
use anemochory_node::{LoopbackSink, NodeConfig, NodeRuntime, SessionResolver};
use anemochory_routing::{NodePool, OnionPath};
use anemochory_session::Session;

struct FixedKeyCoordinator;

impl HandshakeCoordinator for FixedKeyCoordinator {
    fn establish<'a>(
        &'a self,
        hop: &'a NodePoolEntry,
    ) -> Pin<Box<dyn Future<Output = anemochory_core::Result<SessionKey>> + Send + 'a>> {
        Box::pin(async move { Ok(SessionKey::from_bytes(hop.public_key)) })
    }
}

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

#[tokio::main]
async fn main() {
    anemochory_logging::try_init(LogLevel::Info).ok();

    let entry_addr: SocketAddr = "127.0.0.1:29801".parse().unwrap();
    let relay_addr: SocketAddr = "127.0.0.1:29802".parse().unwrap();
    let exit_addr: SocketAddr = "127.0.0.1:29803".parse().unwrap();

    tracing::info!("starting entry, relay, and exit nodes on loopback");
    let _entry_sink = spawn_node(entry_addr, 1).await;
    let _relay_sink = spawn_node(relay_addr, 2).await;
    let exit_sink = spawn_node(exit_addr, 3).await;
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
    let mut session = open_session(&pool, &coordinator, None, options)
        .await
        .expect("path selection and key setup should succeed with a pinned path");

    tracing::info!(session_id = %session.id(), "sending payload through three hops");
    match send(
        &mut session,
        &pool,
        &coordinator,
        None,
        b"hello from anemochory",
        std::future::pending(),
    )
    .await
    {
        SendOutcome::Delivered => tracing::info!("client reports delivery"),
        other => tracing::error!(?other, "send did not complete"),
    }

    for _ in 0..40 {
        if !exit_sink.received().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    match exit_sink.received().first() {
        Some(payload) => println!("exit node received: {}", String::from_utf8_lossy(payload)),
        None => println!("exit node received nothing"),
    }
}
