//! oec-core — envelope types, wire codec, and configuration shared by the
//! relay transport, the daemon, and the CLI.

pub mod config;
pub mod envelope;
pub mod wire;

pub use envelope::{MessageEnvelope, Payload, PayloadError, PAYLOAD_CAPACITY};
pub use wire::{RoutingHeader, WireError, MESSAGE_PATH};
