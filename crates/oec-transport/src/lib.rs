//! oec-transport — point-to-point HTTP transport for the relay.
//!
//! The [`Sender`] pushes envelopes to peers and feeds the
//! [`ReachabilityTracker`]; the listener turns inbound requests back into
//! envelopes for a [`MessageProcessor`]; [`HttpTransport`] ties them together
//! and owns the listening socket.

pub mod collaborators;
pub mod lifecycle;
pub mod listener;
pub mod reachability;
pub mod sender;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use collaborators::{
    AddressResolver, ChannelProcessor, MessageProcessor, ResolveError, StaticResolver,
};
pub use lifecycle::{HttpTransport, TransportError};
pub use reachability::ReachabilityTracker;
pub use sender::{DeliveryError, Sender};
