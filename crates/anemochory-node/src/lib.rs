//! Node runtime for the Anemochory onion-routing protocol: accepts framed
//! connections, peels one layer per packet, and forwards or delivers.

mod config;
mod exit;
mod pipeline;
mod runtime;

pub use config::NodeConfig;
pub use exit::{ExitSink, LoopbackSink};
pub use pipeline::{process_inbound_packet, PipelineOutcome};
pub use runtime::{NodeRuntime, SessionResolver};

pub use anemochory_core::{AnemochoryError, Result};
