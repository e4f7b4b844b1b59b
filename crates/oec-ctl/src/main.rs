//! oec-ctl — push a message to a relay peer from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use oec_core::config::RelayConfig;
use oec_core::{MessageEnvelope, Payload};
use oec_transport::{ReachabilityTracker, Sender, StaticResolver};

// ── Arguments ─────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
struct SendArgs {
    destination: String,
    to: Option<String>,
    hop_count: u32,
    queue: bool,
    body: Body,
}

#[derive(Debug, PartialEq, Eq)]
enum Body {
    Text(String),
    File(PathBuf),
}

fn parse_send(args: &[String]) -> Result<SendArgs> {
    let mut destination = None;
    let mut to = None;
    let mut hop_count = 0;
    let mut queue = false;
    let mut file = None;
    let mut text: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--to" => {
                i += 1;
                to = Some(args.get(i).context("--to requires host:port")?.clone());
            }
            "--hop-count" => {
                i += 1;
                hop_count = args
                    .get(i)
                    .context("--hop-count requires a value")?
                    .parse()
                    .context("--hop-count must be a non-negative number")?;
            }
            "--queue" => queue = true,
            "--file" => {
                i += 1;
                file = Some(PathBuf::from(args.get(i).context("--file requires a path")?));
            }
            other if destination.is_none() => destination = Some(other.to_string()),
            other => text.push(other),
        }
        i += 1;
    }

    let destination = destination.context("missing destination")?;
    let body = match (file, text.is_empty()) {
        (Some(_), false) => bail!("give either --file or message text, not both"),
        (Some(path), true) => Body::File(path),
        (None, _) => Body::Text(text.join(" ")),
    };

    Ok(SendArgs {
        destination,
        to,
        hop_count,
        queue,
        body,
    })
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_send(args: SendArgs) -> Result<()> {
    let bytes = match &args.body {
        Body::Text(text) => text.clone().into_bytes(),
        Body::File(path) => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?
        }
    };
    let payload = Payload::new(bytes)?;

    let config = RelayConfig::load().context("failed to load config")?;
    let resolver = StaticResolver::new(config.routes);
    let sender = Sender::new(ReachabilityTracker::new(), Arc::new(resolver));

    let mut envelope = MessageEnvelope::new(args.destination, payload)
        .with_hop_count(args.hop_count)
        .with_to_be_queued(args.queue);
    if let Some(to) = args.to {
        envelope = envelope.with_network_address(to);
    }

    let delivered = sender.send(&mut envelope).await?;
    let target = envelope.network_address.as_deref().unwrap_or("?");
    if !delivered {
        bail!("not delivered to {} at {}", envelope.destination_address, target);
    }

    println!(
        "delivered {} bytes to {} at {}",
        envelope.payload.len(),
        envelope.destination_address,
        target
    );
    Ok(())
}

fn print_usage() {
    println!("Usage: oec-ctl <command>");
    println!();
    println!("Commands:");
    println!("  send <destination> [options] [TEXT...]   Send one message");
    println!();
    println!("Send options:");
    println!("  --to <host:port>    Peer address (default: resolve from [routes])");
    println!("  --hop-count <n>     Hop count to carry (default: 0)");
    println!("  --queue             Ask downstream to queue on failure");
    println!("  --file <path>       Send file contents instead of TEXT");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("send") => cmd_send(parse_send(&args[1..])?).await,
        Some("help") | Some("--help") | Some("-h") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
