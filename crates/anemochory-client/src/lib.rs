//! High-level client API: draw a path, negotiate per-hop keys, send through
//! it with retry-with-backoff on failure.

mod coordinator;
mod options;
mod outcome;
mod send;
mod session;

pub use coordinator::HandshakeCoordinator;
pub use options::ClientOptions;
pub use outcome::SendOutcome;
pub use send::send;
pub use session::{close_session, open_session, ClientSession};

pub use anemochory_core::{AnemochoryError, Result};
