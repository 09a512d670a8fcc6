//! Node runtime: accept loop, per-connection packet pump, and forwarding.
//!
//! One TCP connection carries exactly one session's frames, in order — no
//! multiplexing, so the runtime never has to recover a session id from an
//! encrypted packet before it can even pick a key to try. Which session a
//! freshly accepted connection belongs to is resolved by a pluggable
//! [`SessionResolver`] the embedder supplies; this crate doesn't wire the
//! handshake onto the wire itself.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anemochory_core::{JITTER_MAX_MS, JITTER_MIN_MS};
use anemochory_session::Session;
use anemochory_transport::{PacketListener, PacketStream};
use rand::Rng;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::exit::ExitSink;
use crate::pipeline::{process_inbound_packet, PipelineOutcome};

/// Resolves the session a freshly accepted connection belongs to. The
/// embedder owns handshake negotiation; this trait is the seam between that
/// and the packet pump.
pub trait SessionResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        peer: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = Option<Arc<Session>>> + Send + 'a>>;
}

/// Outbound connections to next-hop peers, kept open across packets rather
/// than reconnected per forward.
#[derive(Default)]
struct OutboundPool {
    streams: Mutex<HashMap<SocketAddr, Arc<Mutex<PacketStream>>>>,
}

impl OutboundPool {
    fn new() -> Self {
        Self::default()
    }

    async fn get_or_connect(&self, addr: SocketAddr) -> anemochory_core::Result<Arc<Mutex<PacketStream>>> {
        let mut streams = self.streams.lock().await;
        if let Some(existing) = streams.get(&addr) {
            return Ok(existing.clone());
        }
        let stream = PacketStream::connect(addr).await?;
        let handle = Arc::new(Mutex::new(stream));
        streams.insert(addr, handle.clone());
        Ok(handle)
    }

    async fn drop_broken(&self, addr: SocketAddr) {
        self.streams.lock().await.remove(&addr);
    }
}

fn next_hop_addr(addr_bytes: [u8; 16], port: u16) -> SocketAddr {
    let ip = std::net::Ipv6Addr::from(addr_bytes);
    match ip.to_ipv4_mapped() {
        Some(v4) => SocketAddr::from((v4, port)),
        None => SocketAddr::from((ip, port)),
    }
}

fn now_unix() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

async fn jitter_sleep() {
    let delay_ms = rand::thread_rng().gen_range(JITTER_MIN_MS..=JITTER_MAX_MS);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

/// A running node: accepts connections, peels one onion layer per inbound
/// packet, and forwards or delivers the result.
pub struct NodeRuntime {
    config: NodeConfig,
    resolver: Arc<dyn SessionResolver>,
    exit_sink: Arc<dyn ExitSink>,
    outbound: OutboundPool,
}

impl NodeRuntime {
    pub fn new(config: NodeConfig, resolver: Arc<dyn SessionResolver>, exit_sink: Arc<dyn ExitSink>) -> Self {
        Self {
            config,
            resolver,
            exit_sink,
            outbound: OutboundPool::new(),
        }
    }

    /// Runs the accept loop until `shutdown` resolves. Each accepted
    /// connection is handled on its own task; a per-peer semaphore bounds
    /// how many packets from one connection may be in flight at once.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) -> anemochory_core::Result<()> {
        let listener = PacketListener::bind(self.config.listen_addr).await?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("node runtime shutting down");
                    return Ok(());
                }

                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            warn!(?err, "accept failed");
                            continue;
                        }
                    };
                    let this = self.clone();
                    tokio::spawn(async move {
                        this.handle_connection(stream, peer).await;
                    });
                }
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, mut stream: PacketStream, peer: SocketAddr) {
        let Some(session) = self.resolver.resolve(peer).await else {
            debug!(%peer, "no session resolved for connection, dropping");
            return;
        };

        let permits = Arc::new(Semaphore::new(self.config.per_peer_high_water_mark));
        debug!(%peer, session_id = %session.id(), "connection accepted");

        loop {
            let packet = match stream.read_packet().await {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(err) => {
                    warn!(%peer, ?err, "framing error, closing connection");
                    break;
                }
            };

            let Ok(permit) = permits.clone().try_acquire_owned() else {
                debug!(%peer, "per-peer high water mark reached, dropping packet");
                continue;
            };

            let this = self.clone();
            let session = session.clone();
            tokio::spawn(async move {
                this.process_and_route(&session, packet).await;
                drop(permit);
            });
        }

        debug!(%peer, session_id = %session.id(), "connection closed");
    }

    async fn process_and_route(&self, session: &Session, packet: [u8; anemochory_core::PACKET_SIZE]) {
        match process_inbound_packet(session, &packet, now_unix()) {
            PipelineOutcome::Deliver { payload } => {
                self.exit_sink.deliver(&payload).await;
            }
            PipelineOutcome::Forward { packet, next_hop_addr: addr_bytes, next_hop_port } => {
                jitter_sleep().await;
                let addr = next_hop_addr(addr_bytes, next_hop_port);
                if let Err(err) = self.forward(addr, &packet).await {
                    warn!(%addr, ?err, "forward failed");
                    self.outbound.drop_broken(addr).await;
                }
            }
            PipelineOutcome::Drop(_) => {}
        }
    }

    async fn forward(&self, addr: SocketAddr, packet: &[u8; anemochory_core::PACKET_SIZE]) -> anemochory_core::Result<()> {
        let handle = self.outbound.get_or_connect(addr).await?;
        let mut guard = handle.lock().await;
        guard.write_packet(packet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anemochory_core::{NodeId, SessionId};
    use anemochory_crypto::{wrap_packet, HopSpec, SessionKey};
    use crate::exit::LoopbackSink;

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

    #[tokio::test]
    async fn exit_hop_delivers_final_payload_to_sink() {
        let session_id = SessionId::from_bytes([3u8; 16]);
        let entry_key = SessionKey::from_bytes([1u8; 32]);
        let middle_key = SessionKey::from_bytes([2u8; 32]);
        let exit_key = SessionKey::from_bytes([9u8; 32]);
        let hops = vec![
            HopSpec { node_id: NodeId::from_bytes([0u8; 32]), key: &entry_key, addr: [1u8; 16], port: 1001, session_id },
            HopSpec { node_id: NodeId::from_bytes([1u8; 32]), key: &middle_key, addr: [2u8; 16], port: 1002, session_id },
            HopSpec { node_id: NodeId::from_bytes([2u8; 32]), key: &exit_key, addr: [0u8; 16], port: 0, session_id },
        ];
        let packet = wrap_packet(b"payload", &hops, now_unix(), 1, |_| true).unwrap();

        // Peel the entry and middle layers directly so what reaches the exit's
        // `process_and_route` is exactly what the middle hop would forward.
        let (_, outcome) = anemochory_crypto::unwrap_packet(&packet, &entry_key).unwrap();
        let packet = match outcome {
            anemochory_crypto::UnwrapOutcome::Forward { packet, .. } => packet,
            _ => panic!("expected forward at entry"),
        };
        let (_, outcome) = anemochory_crypto::unwrap_packet(&packet, &middle_key).unwrap();
        let packet = match outcome {
            anemochory_crypto::UnwrapOutcome::Forward { packet, .. } => packet,
            _ => panic!("expected forward at middle hop"),
        };

        let session = Arc::new(Session::new(session_id, SessionKey::from_bytes([9u8; 32]), 100));
        let exit_sink = Arc::new(LoopbackSink::new());
        let runtime = Arc::new(NodeRuntime::new(
            NodeConfig::default(),
            Arc::new(StaticResolver(session.clone())),
            exit_sink.clone(),
        ));

        runtime.process_and_route(&session, packet).await;
        assert_eq!(exit_sink.received(), vec![b"payload".to_vec()]);
    }

    #[test]
    fn next_hop_addr_maps_mapped_ipv4() {
        let mut bytes = [0u8; 16];
        bytes[10] = 0xff;
        bytes[11] = 0xff;
        bytes[12] = 127;
        bytes[13] = 0;
        bytes[14] = 0;
        bytes[15] = 1;
        let addr = next_hop_addr(bytes, 9000);
        assert_eq!(addr, "127.0.0.1:9000".parse().unwrap());
    }
}
