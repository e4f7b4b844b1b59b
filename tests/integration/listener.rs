use crate::*;

use oec_core::PAYLOAD_CAPACITY;

// ══════════════════════════════════════════════════════════════════════════════
//  Inbound listener, driven by an independent HTTP client
// ══════════════════════════════════════════════════════════════════════════════

fn message_url(addr: SocketAddr, query: &str) -> String {
    format!("http://{addr}/oecmessage?{query}")
}

#[tokio::test]
async fn test_query_fields_decoded() -> Result<()> {
    let mut node = spawn_node().await?;

    let resp = reqwest::Client::new()
        .post(message_url(
            node.addr,
            "destination=clinicA&tobequeued=true&hopcount=3",
        ))
        .body("payload")
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_eq!(content_type.as_deref(), Some("text/plain"));
    assert!(resp.bytes().await?.is_empty());

    let env = node.inbound.recv().await.context("nothing dispatched")?;
    assert_eq!(env.destination_address, "clinicA");
    assert!(env.to_be_queued);
    assert_eq!(env.hop_count, 3);
    assert_eq!(env.payload.as_bytes(), b"payload");
    Ok(())
}

#[tokio::test]
async fn test_malformed_query_rejected_and_listener_survives() -> Result<()> {
    let mut node = spawn_node().await?;
    let client = reqwest::Client::new();

    let resp = client
        .post(message_url(node.addr, "destination=clinicA&brokenpair"))
        .body("x")
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let resp = client
        .post(message_url(node.addr, "destination=clinicA&hopcount=many"))
        .body("x")
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let resp = client
        .post(message_url(node.addr, "destination=clinicA"))
        .body("fine")
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let env = node.inbound.recv().await.context("nothing dispatched")?;
    assert_eq!(env.payload.as_bytes(), b"fine");
    assert!(node.inbound.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_non_post_refused() -> Result<()> {
    let mut node = spawn_node().await?;

    let resp = reqwest::get(message_url(node.addr, "destination=clinicA")).await?;
    assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
    assert!(node.inbound.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_unknown_path_not_found() -> Result<()> {
    let node = spawn_node().await?;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/elsewhere?destination=x", node.addr))
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    Ok(())
}

/// A body over capacity is cut to capacity, not rejected.
#[tokio::test]
async fn test_oversized_body_truncated() -> Result<()> {
    let mut node = spawn_node().await?;

    let body: Vec<u8> = (0..PAYLOAD_CAPACITY + 10_000).map(|i| i as u8).collect();
    // The listener may hang up before reading the tail; only the dispatched
    // envelope matters here.
    let _ = reqwest::Client::new()
        .post(message_url(node.addr, "destination=clinicA"))
        .body(body.clone())
        .send()
        .await;

    let env = node.inbound.recv().await.context("nothing dispatched")?;
    assert_eq!(env.payload.len(), PAYLOAD_CAPACITY);
    assert_eq!(env.payload.as_bytes(), &body[..PAYLOAD_CAPACITY]);
    Ok(())
}

/// After stop, the port no longer accepts connections.
#[tokio::test]
async fn test_stop_releases_port() -> Result<()> {
    let node = spawn_node().await?;
    node.transport.stop().await;
    assert!(TcpStream::connect(node.addr).await.is_err());

    // The same port can be bound again.
    let again = spawn_node_on(node.addr.port(), &[]).await?;
    assert_eq!(again.addr, node.addr);
    Ok(())
}
