//! Message envelope — the unit exchanged between relay transports.
//!
//! The transport treats everything except the payload and the addressing
//! fields as opaque: hop count and the queue hint are relayed untouched.

use bytes::Bytes;

/// Upper bound on a payload, in bytes. Matches the listener's single bounded
/// body read; anything past this on the inbound side is dropped.
pub const PAYLOAD_CAPACITY: usize = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload of {len} bytes exceeds capacity of {capacity} bytes")]
    TooLarge { len: usize, capacity: usize },
}

/// Payload bytes. `len()` is authoritative; it never exceeds
/// [`PAYLOAD_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    bytes: Bytes,
}

impl Payload {
    /// Wrap outbound bytes, rejecting anything over capacity.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self, PayloadError> {
        let bytes = bytes.into();
        if bytes.len() > PAYLOAD_CAPACITY {
            return Err(PayloadError::TooLarge {
                len: bytes.len(),
                capacity: PAYLOAD_CAPACITY,
            });
        }
        Ok(Self { bytes })
    }

    /// Keep at most the first [`PAYLOAD_CAPACITY`] bytes.
    pub fn truncated(bytes: impl Into<Bytes>) -> Self {
        let mut bytes = bytes.into();
        bytes.truncate(PAYLOAD_CAPACITY);
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        PAYLOAD_CAPACITY
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap clone of the underlying buffer, for handing to an HTTP body.
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// A message on its way to, or just arrived from, a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    /// Logical identifier of the final recipient.
    pub destination_address: String,

    /// `host:port` of the next hop. Filled in by the sender from the address
    /// resolver when absent, then kept for the rest of the call.
    pub network_address: Option<String>,

    /// Incremented by routing; opaque here.
    pub hop_count: u32,

    /// Whether a failed delivery should be queued for retry downstream.
    pub to_be_queued: bool,

    pub payload: Payload,

    /// Peer IP of the inbound connection. Set by the listener only.
    pub sender_network_address: Option<String>,
}

impl MessageEnvelope {
    pub fn new(destination_address: impl Into<String>, payload: Payload) -> Self {
        Self {
            destination_address: destination_address.into(),
            network_address: None,
            hop_count: 0,
            to_be_queued: false,
            payload,
            sender_network_address: None,
        }
    }

    pub fn with_network_address(mut self, network_address: impl Into<String>) -> Self {
        self.network_address = Some(network_address.into());
        self
    }

    pub fn with_hop_count(mut self, hop_count: u32) -> Self {
        self.hop_count = hop_count;
        self
    }

    pub fn with_to_be_queued(mut self, to_be_queued: bool) -> Self {
        self.to_be_queued = to_be_queued;
        self
    }
}
