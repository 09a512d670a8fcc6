//! Exit delivery target. One trait, one concrete in-process implementation
//! — no plugin loader or runtime-registered dispatch beyond this, since
//! the protocol itself needs none.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// Where an exit node hands final-payload plaintext once it's been fully
/// unwrapped. A real deployment's only other adapter (forwarding to a
/// local SOCKS proxy, a TUN device, etc.) lives outside this crate's
/// scope; `LoopbackSink` is what tests and embedders use directly.
pub trait ExitSink: Send + Sync {
    fn deliver<'a>(&'a self, data: &'a [u8]) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Collects delivered payloads in memory. Used by tests and by callers
/// that embed the node runtime without a real destination network.
#[derive(Default)]
pub struct LoopbackSink {
    received: Mutex<Vec<Vec<u8>>>,
}

impl LoopbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().expect("loopback sink mutex poisoned").clone()
    }
}

impl ExitSink for LoopbackSink {
    fn deliver<'a>(&'a self, data: &'a [u8]) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.received.lock().expect("loopback sink mutex poisoned").push(data.to_vec());
        })
    }
}
