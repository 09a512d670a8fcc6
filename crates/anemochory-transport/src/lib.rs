//! Framed transport for Anemochory onion packets: 4-byte length-prefixed
//! TCP frames carrying exactly one fixed-size packet each.

mod framing;
mod listener;

pub use framing::{read_frame, write_frame};
pub use listener::{PacketListener, PacketStream};

pub use anemochory_core::{AnemochoryError, Result};
