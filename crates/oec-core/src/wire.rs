//! Relay wire format — request target and query codec.
//!
//! A message travels as `POST http://<host:port>/oecmessage?<query>` with the
//! raw payload as the body. The query carries the routing header:
//!
//! ```text
//! destination=<dest>&tobequeued=<true|false>&hopcount=<n>
//! ```
//!
//! Values are not percent-encoded on either side, so a destination must not
//! contain query delimiters.

use http::Uri;

/// Fixed request path for relayed messages.
pub const MESSAGE_PATH: &str = "/oecmessage";

pub const KEY_DESTINATION: &str = "destination";
pub const KEY_TO_BE_QUEUED: &str = "tobequeued";
pub const KEY_HOP_COUNT: &str = "hopcount";

/// The envelope fields carried in the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingHeader {
    pub destination: String,
    pub to_be_queued: bool,
    pub hop_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("query pair {0:?} has no '='")]
    MalformedPair(String),
    #[error("hopcount {0:?} is not a non-negative integer")]
    InvalidHopCount(String),
    #[error("query has no destination")]
    MissingDestination,
    #[error("destination {0:?} cannot be carried in a query string")]
    InvalidDestination(String),
    #[error("malformed request target {target}: {reason}")]
    MalformedTarget { target: String, reason: String },
}

/// Encode the routing header as a query string (without the leading `?`).
pub fn encode_query(header: &RoutingHeader) -> Result<String, WireError> {
    if !is_query_safe(&header.destination) {
        return Err(WireError::InvalidDestination(header.destination.clone()));
    }
    Ok(format!(
        "{KEY_DESTINATION}={}&{KEY_TO_BE_QUEUED}={}&{KEY_HOP_COUNT}={}",
        header.destination, header.to_be_queued, header.hop_count
    ))
}

/// Build the full request target for a message bound to `network_address`.
pub fn message_uri(network_address: &str, header: &RoutingHeader) -> Result<Uri, WireError> {
    let query = encode_query(header)?;
    let target = format!("http://{network_address}{MESSAGE_PATH}?{query}");
    let uri: Uri = target.parse().map_err(|e: http::uri::InvalidUri| {
        WireError::MalformedTarget {
            target: target.clone(),
            reason: e.to_string(),
        }
    })?;
    match uri.authority() {
        Some(authority) if !authority.host().is_empty() => Ok(uri),
        _ => Err(WireError::MalformedTarget {
            target,
            reason: "missing host".to_string(),
        }),
    }
}

/// Decode a query string into a routing header.
///
/// Unknown keys are ignored and a repeated key keeps its last value. Missing
/// `hopcount`/`tobequeued` default to 0/false.
pub fn decode_query(query: &str) -> Result<RoutingHeader, WireError> {
    let mut destination = None;
    let mut to_be_queued = false;
    let mut hop_count = 0;

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| WireError::MalformedPair(pair.to_string()))?;
        match key {
            KEY_DESTINATION => destination = Some(value.to_string()),
            KEY_HOP_COUNT => {
                hop_count = value
                    .parse()
                    .map_err(|_| WireError::InvalidHopCount(value.to_string()))?;
            }
            KEY_TO_BE_QUEUED => to_be_queued = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    Ok(RoutingHeader {
        destination: destination.ok_or(WireError::MissingDestination)?,
        to_be_queued,
        hop_count,
    })
}

fn is_query_safe(value: &str) -> bool {
    !value
        .chars()
        .any(|c| matches!(c, '&' | '=' | '#' | '?') || c.is_whitespace() || c.is_control())
}
