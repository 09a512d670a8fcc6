//! Node pool and weighted, diversity-constrained path selection for the
//! Anemochory protocol.

mod pool;
mod select;

pub use pool::NodePool;
pub use select::{OnionPath, PathSelector};

pub use anemochory_core::{AnemochoryError, Result};
