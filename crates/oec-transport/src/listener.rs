//! Inbound listener — turns `POST /oecmessage` requests into envelopes.
//!
//! Each request is decoded, handed to the [`MessageProcessor`] on the
//! blocking pool, and acknowledged with an empty `200 text/plain` once the
//! processor returns. Decode failures are answered per request and never
//! touch the accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use oec_core::wire::{self, MESSAGE_PATH};
use oec_core::{MessageEnvelope, Payload, PAYLOAD_CAPACITY};

use crate::collaborators::MessageProcessor;

#[derive(Clone)]
pub struct ListenerState {
    processor: Arc<dyn MessageProcessor>,
    /// Bounds messages dispatched at once. `None` = unbounded.
    permits: Option<Arc<Semaphore>>,
}

impl ListenerState {
    pub fn new(processor: Arc<dyn MessageProcessor>, max_concurrent: usize) -> Self {
        let permits = (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent)));
        Self { processor, permits }
    }
}

pub fn router(state: ListenerState) -> Router {
    Router::new()
        .route(MESSAGE_PATH, post(handle_message))
        .with_state(state)
}

/// Serve on an already-bound listener until the future is dropped.
pub async fn serve(listener: TcpListener, state: ListenerState) -> std::io::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await
}

pub async fn handle_message(
    State(state): State<ListenerState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    RawQuery(query): RawQuery,
    body: Body,
) -> Response {
    let routing = match wire::decode_query(query.as_deref().unwrap_or_default()) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "rejecting inbound message");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let body = match read_bounded(body, PAYLOAD_CAPACITY).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "failed to read message body");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let envelope = MessageEnvelope {
        destination_address: routing.destination,
        network_address: None,
        hop_count: routing.hop_count,
        to_be_queued: routing.to_be_queued,
        payload: Payload::truncated(body),
        sender_network_address: Some(peer.ip().to_string()),
    };
    tracing::debug!(
        %peer,
        destination = %envelope.destination_address,
        hop_count = envelope.hop_count,
        len = envelope.payload.len(),
        "inbound message"
    );

    let _permit = match &state.permits {
        Some(permits) => match permits.clone().acquire_owned().await {
            Ok(p) => Some(p),
            Err(_) => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
        },
        None => None,
    };

    let processor = state.processor.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || processor.process(envelope)).await {
        tracing::error!(%peer, error = %e, "message processor failed");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")]).into_response()
}

/// Read at most `limit` bytes of body and drop the rest.
async fn read_bounded(mut body: Body, limit: usize) -> Result<Bytes, axum::Error> {
    let mut buf = BytesMut::new();
    while buf.len() < limit {
        let Some(frame) = body.frame().await else {
            break;
        };
        if let Ok(data) = frame?.into_data() {
            let take = data.len().min(limit - buf.len());
            buf.extend_from_slice(&data[..take]);
        }
    }
    Ok(buf.freeze())
}
