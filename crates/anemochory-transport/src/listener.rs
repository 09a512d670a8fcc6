//! Thin wrapper around `TcpListener`/`TcpStream` so callers depend on this
//! crate's framing, not on tokio's networking types directly.

use std::net::SocketAddr;
use std::time::Duration;

use anemochory_core::{AnemochoryError, Result, IO_TIMEOUT_MS};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::info;

use crate::framing::{read_frame, write_frame};

/// Runs `fut` under the bounded I/O timeout, collapsing an elapsed deadline
/// into `AnemochoryError::Timeout` without losing `fut`'s own error.
async fn bounded<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match timeout(Duration::from_millis(IO_TIMEOUT_MS), fut).await {
        Ok(result) => result,
        Err(_) => Err(AnemochoryError::Timeout),
    }
}

pub struct PacketListener {
    inner: TcpListener,
}

impl PacketListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let inner = TcpListener::bind(addr).await.map_err(|_| AnemochoryError::PeerUnreachable)?;
        info!(%addr, "transport listener bound");
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(|_| AnemochoryError::PeerUnreachable)
    }

    pub async fn accept(&self) -> Result<(PacketStream, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await.map_err(|_| AnemochoryError::PeerUnreachable)?;
        Ok((PacketStream { inner: stream }, peer))
    }
}

/// A connected peer's packet-framed TCP stream.
pub struct PacketStream {
    inner: TcpStream,
}

impl PacketStream {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let inner = bounded(async { TcpStream::connect(addr).await.map_err(|_| AnemochoryError::PeerUnreachable) }).await?;
        Ok(Self { inner })
    }

    pub async fn read_packet(&mut self) -> Result<Option<[u8; anemochory_core::PACKET_SIZE]>> {
        bounded(read_frame(&mut self.inner)).await
    }

    pub async fn write_packet(&mut self, packet: &[u8; anemochory_core::PACKET_SIZE]) -> Result<()> {
        bounded(write_frame(&mut self.inner, packet)).await
    }
}
