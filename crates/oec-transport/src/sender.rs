//! Outbound sender — pushes one envelope to one peer over HTTP/1.1.
//!
//! Every outcome collapses to a boolean plus, at most, one log event:
//!
//! | outcome                                      | result | report                   |
//! |----------------------------------------------|--------|--------------------------|
//! | response received and drained                | true   | recovery notice, once    |
//! | peer closed after the full exchange          | true   | none                     |
//! | connect refused / timed out / no route, DNS  | false  | tracker, once per outage |
//! | malformed request target                     | false  | ERROR, every time        |
//! | any other transmission error                 | false  | ERROR, every time        |
//!
//! Only a failed address resolution escapes as an `Err`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::HOST;
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use oec_core::wire::{self, RoutingHeader, WireError, MESSAGE_PATH};
use oec_core::MessageEnvelope;

use crate::collaborators::{AddressResolver, ResolveError};
use crate::reachability::ReachabilityTracker;

const DEFAULT_HTTP_PORT: u16 = 80;

/// Why a single delivery attempt did not complete normally.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("unknown host {address}")]
    UnknownHost {
        address: String,
        #[source]
        source: Option<io::Error>,
    },
    #[error("can't connect to {address}")]
    ConnectFailed {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    MalformedTarget(#[from] WireError),
    /// The peer hung up after taking the whole request, before or while
    /// answering. The message got there.
    #[error("peer closed the connection after full transmission")]
    PeerClosed,
    #[error("transmission failed: {0}")]
    Transmission(#[source] hyper::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("peer answered {0}")]
    Status(StatusCode),
}

impl DeliveryError {
    /// Peer-unreachable conditions, deduplicated by the tracker.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::UnknownHost { .. } | Self::ConnectFailed { .. })
    }

    /// Closures that still mean the message was delivered.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::PeerClosed)
    }

    fn from_hyper(err: hyper::Error) -> Self {
        if err.is_incomplete_message() || ends_in_unexpected_eof(&err) {
            Self::PeerClosed
        } else {
            Self::Transmission(err)
        }
    }
}

/// A response body cut short by the peer surfaces as an `UnexpectedEof`
/// somewhere down hyper's error chain.
fn ends_in_unexpected_eof(err: &hyper::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::UnexpectedEof {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Connect failures that mean the peer cannot be reached right now, as
/// opposed to a local fault.
fn connect_error(address: &str, err: io::Error) -> DeliveryError {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::TimedOut
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::HostUnreachable => DeliveryError::ConnectFailed {
            address: address.to_string(),
            source: err,
        },
        _ => DeliveryError::Io(err),
    }
}

/// Pushes envelopes to peers and keeps the reachability tracker current.
pub struct Sender {
    tracker: ReachabilityTracker,
    resolver: Arc<dyn AddressResolver>,
    connect_timeout: Option<Duration>,
}

impl Sender {
    pub fn new(tracker: ReachabilityTracker, resolver: Arc<dyn AddressResolver>) -> Self {
        Self {
            tracker,
            resolver,
            connect_timeout: None,
        }
    }

    /// Bound the TCP connect. A timed-out connect counts as unreachable.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn tracker(&self) -> &ReachabilityTracker {
        &self.tracker
    }

    /// Send one envelope. Returns whether it counts as delivered.
    ///
    /// A missing `network_address` is resolved and written back onto the
    /// envelope; an unresolvable destination is returned as `Err`.
    pub async fn send(&self, envelope: &mut MessageEnvelope) -> Result<bool, ResolveError> {
        let address = match &envelope.network_address {
            Some(address) => address.clone(),
            None => {
                let address = self.resolver.resolve(&envelope.destination_address)?;
                envelope.network_address = Some(address.clone());
                address
            }
        };

        let header = RoutingHeader {
            destination: envelope.destination_address.clone(),
            to_be_queued: envelope.to_be_queued,
            hop_count: envelope.hop_count,
        };
        let (url, result) = match wire::message_uri(&address, &header) {
            Ok(uri) => {
                let result = self.deliver(&uri, envelope.payload.to_bytes()).await;
                (uri.to_string(), result)
            }
            Err(e) => (format!("http://{address}{MESSAGE_PATH}"), Err(e.into())),
        };

        Ok(self.settle(&address, &envelope.destination_address, &url, result))
    }

    fn settle(
        &self,
        address: &str,
        destination: &str,
        url: &str,
        result: Result<(), DeliveryError>,
    ) -> bool {
        match result {
            Ok(()) => {
                self.tracker.mark_reachable(address);
                true
            }
            Err(e) if e.is_benign() => {
                tracing::debug!(address, destination, "peer closed after delivery");
                true
            }
            Err(e) if e.is_unreachable() => {
                self.tracker
                    .mark_unreachable(address, &format!("{e} for message to {destination}"));
                false
            }
            Err(e) => {
                tracing::error!(
                    destination,
                    url,
                    error = %e,
                    "while sending to {destination} at {address}"
                );
                false
            }
        }
    }

    async fn deliver(&self, uri: &Uri, body: Bytes) -> Result<(), DeliveryError> {
        let authority = uri
            .authority()
            .ok_or_else(|| WireError::MalformedTarget {
                target: uri.to_string(),
                reason: "missing host".to_string(),
            })?
            .clone();

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"))
            .header(HOST, authority.as_str())
            .body(Full::new(body))
            .map_err(|e| WireError::MalformedTarget {
                target: uri.to_string(),
                reason: e.to_string(),
            })?;

        let host = authority.host().trim_start_matches('[').trim_end_matches(']');
        let port = authority.port_u16().unwrap_or(DEFAULT_HTTP_PORT);
        let stream = self.connect(authority.as_str(), host, port).await?;

        let (mut sender, conn) = http1::handshake::<_, Full<Bytes>>(TokioIo::new(stream))
            .await
            .map_err(DeliveryError::from_hyper)?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::trace!(error = %e, "outbound connection ended");
            }
        });

        let response = sender
            .send_request(request)
            .await
            .map_err(DeliveryError::from_hyper)?;
        let status = response.status();

        // The acknowledgment carries nothing; drain it and move on.
        response
            .into_body()
            .collect()
            .await
            .map_err(DeliveryError::from_hyper)?;

        if status.is_client_error() || status.is_server_error() {
            return Err(DeliveryError::Status(status));
        }
        Ok(())
    }

    async fn connect(&self, address: &str, host: &str, port: u16) -> Result<TcpStream, DeliveryError> {
        let unknown_host = |source| DeliveryError::UnknownHost {
            address: address.to_string(),
            source,
        };
        let candidates: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| unknown_host(Some(e)))?
            .collect();

        let mut last_error = None;
        for candidate in candidates {
            match self.connect_one(candidate).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            None => Err(unknown_host(None)),
            Some(e) => Err(connect_error(address, e)),
        }
    }

    async fn connect_one(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, TcpStream::connect(addr))
                .await
                .unwrap_or_else(|_| Err(io::ErrorKind::TimedOut.into())),
            None => TcpStream::connect(addr).await,
        }
    }
}
