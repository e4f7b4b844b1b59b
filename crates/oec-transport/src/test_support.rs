//! Test helpers — log capture and scripted raw-TCP peers.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Records every event as `(level, rendered fields)`.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl LogCapture {
    /// Install as the thread's default subscriber until the guard drops.
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    pub fn count(&self, level: Level) -> usize {
        self.messages(level).len()
    }

    /// Rendered fields of every event at `level`, oldest first.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages(Level::ERROR)
    }

    pub fn infos(&self) -> Vec<String> {
        self.messages(Level::INFO)
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .any(|(l, text)| *l == level && text.contains(needle))
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = FieldText::default();
        event.record(&mut fields);
        self.events
            .lock()
            .unwrap()
            .push((*event.metadata().level(), fields.0));
    }
}

#[derive(Default)]
struct FieldText(String);

impl Visit for FieldText {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let _ = write!(self.0, "{}={:?} ", field.name(), value);
    }
}

// ── Raw peers ─────────────────────────────────────────────────────────────────

/// How a scripted peer answers each request.
#[derive(Debug, Clone, Copy)]
pub enum PeerBehavior {
    /// `200 OK` with an empty body.
    Acknowledge,
    /// Read the whole request, then hang up without answering.
    CloseAfterRequest,
    /// Promise a body, send part of it, hang up.
    TruncatedResponse,
    /// Answer with this status and an empty body.
    Status(u16),
}

/// Spawn a peer that answers every connection per `behavior`.
pub async fn spawn_raw_peer(behavior: PeerBehavior) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_request(&mut stream).await.is_err() {
                    return;
                }
                let reply: Vec<u8> = match behavior {
                    PeerBehavior::Acknowledge => {
                        b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n".to_vec()
                    }
                    PeerBehavior::CloseAfterRequest => Vec::new(),
                    PeerBehavior::TruncatedResponse => {
                        b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\nabc".to_vec()
                    }
                    PeerBehavior::Status(code) => {
                        format!("HTTP/1.1 {code} Nope\r\ncontent-length: 0\r\n\r\n").into_bytes()
                    }
                };
                let _ = stream.write_all(&reply).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn refused_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Read one request: headers, then `content-length` bytes of body.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return Ok(buf);
            }
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(buf);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
