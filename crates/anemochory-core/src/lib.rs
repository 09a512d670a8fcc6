//! Shared types for the Anemochory onion-routing protocol core.
//!
//! Wire constants, identifier newtypes, the opaque error taxonomy, and the
//! node-pool model live here so every other `anemochory-*` crate depends on
//! a single, small, dependency-light foundation.

mod constants;
mod error;
mod ids;
mod node_pool;

pub use constants::*;
pub use error::AnemochoryError;
pub use ids::{NodeId, SessionId};
pub use node_pool::{Capabilities, NodeHealth, NodePoolEntry};

pub type Result<T> = std::result::Result<T, AnemochoryError>;
