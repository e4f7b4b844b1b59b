//! Transport lifecycle — owns the listening socket and the outbound sender.
//!
//! `start` binds and spawns the accept loop on the current runtime; `stop`
//! tears it down with no grace period. In-flight handlers run to completion
//! on their own tasks but new connections are refused as soon as `stop`
//! returns. `send` touches neither and may run alongside both.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use oec_core::config::RelayConfig;
use oec_core::MessageEnvelope;

use crate::collaborators::{AddressResolver, MessageProcessor, ResolveError};
use crate::listener::{self, ListenerState};
use crate::reachability::ReachabilityTracker;
use crate::sender::Sender;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport already listening on {0}")]
    AlreadyStarted(SocketAddr),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

struct RunningServer {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

/// One relay node's HTTP endpoint: inbound listener plus outbound sender.
pub struct HttpTransport {
    config: RelayConfig,
    sender: Sender,
    processor: Arc<dyn MessageProcessor>,
    server: Mutex<Option<RunningServer>>,
}

impl HttpTransport {
    pub fn new(
        config: RelayConfig,
        resolver: Arc<dyn AddressResolver>,
        processor: Arc<dyn MessageProcessor>,
    ) -> Self {
        let connect_timeout = (config.http.connect_timeout_ms > 0)
            .then(|| Duration::from_millis(config.http.connect_timeout_ms));
        let sender =
            Sender::new(ReachabilityTracker::new(), resolver).with_connect_timeout(connect_timeout);
        Self {
            config,
            sender,
            processor,
            server: Mutex::new(None),
        }
    }

    /// Bind the configured port and start accepting. Returns the bound
    /// address, which differs from the configured one when the port is 0.
    pub async fn start(&self) -> Result<SocketAddr, TransportError> {
        let mut server = self.server.lock().await;
        if let Some(running) = server.as_ref() {
            return Err(TransportError::AlreadyStarted(running.local_addr));
        }

        let http = &self.config.http;
        let address = format!("{}:{}", http.bind_address, http.listen_port);
        let bind_err = |source| TransportError::Bind {
            address: address.clone(),
            source,
        };
        let socket = TcpListener::bind((http.bind_address.as_str(), http.listen_port))
            .await
            .map_err(bind_err)?;
        let local_addr = socket.local_addr().map_err(bind_err)?;

        let state = ListenerState::new(self.processor.clone(), http.max_concurrent_requests);
        let task = tokio::spawn(async move {
            if let Err(e) = listener::serve(socket, state).await {
                tracing::error!(error = %e, "listener failed");
            }
        });

        let name = self.config.property("instance.name").unwrap_or_default();
        let address = self.config.property("instance.address").unwrap_or_default();
        tracing::info!(
            instance = %name,
            address = %address,
            port = local_addr.port(),
            "{name} {address} listening on port {}",
            local_addr.port()
        );

        *server = Some(RunningServer { local_addr, task });
        Ok(local_addr)
    }

    /// Stop accepting and release the socket. No-op when not running.
    pub async fn stop(&self) {
        let Some(running) = self.server.lock().await.take() else {
            return;
        };
        running.task.abort();
        // Wait for the abort to land so the socket is closed on return.
        let _ = running.task.await;
        tracing::info!(port = running.local_addr.port(), "stopped listening");
    }

    /// Push one envelope to its peer. See [`Sender::send`].
    pub async fn send(&self, envelope: &mut MessageEnvelope) -> Result<bool, TransportError> {
        Ok(self.sender.send(envelope).await?)
    }

    pub fn tracker(&self) -> &ReachabilityTracker {
        self.sender.tracker()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().await.as_ref().map(|r| r.local_addr)
    }

    pub async fn is_running(&self) -> bool {
        self.server.lock().await.is_some()
    }
}
