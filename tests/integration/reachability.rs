use crate::*;

use futures::future::join_all;

// ══════════════════════════════════════════════════════════════════════════════
//  Unreachable peers
// ══════════════════════════════════════════════════════════════════════════════

/// A refused connection fails the send and logs exactly one error naming
/// the peer.
#[tokio::test]
async fn test_refused_peer_reports_once() -> Result<()> {
    let capture = LogCapture::default();
    let _guard = capture.install();

    let a = spawn_node().await?;
    let dead = refused_address().await;
    let address = dead.to_string();

    let mut env = envelope("clinicA", dead, b"hello");
    assert!(!a.transport.send(&mut env).await?);

    let errors = capture.errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains(&address), "{}", errors[0]);
    assert!(errors[0].contains("clinicA"), "{}", errors[0]);

    // Retries stay quiet while the outage lasts.
    for _ in 0..5 {
        assert!(!a.transport.send(&mut env).await?);
    }
    assert_eq!(capture.errors().len(), 1);
    assert!(a.transport.tracker().is_unreachable(&address));
    Ok(())
}

/// Two sends racing toward the same dead peer: both fail, one report.
#[tokio::test]
async fn test_concurrent_failures_report_once() -> Result<()> {
    let capture = LogCapture::default();
    let _guard = capture.install();

    let a = spawn_node().await?;
    let dead = refused_address().await;

    let mut first = envelope("clinicA", dead, b"one");
    let mut second = envelope("clinicA", dead, b"two");
    let results = join_all([
        a.transport.send(&mut first),
        a.transport.send(&mut second),
    ])
    .await;

    for result in results {
        assert!(!result?);
    }
    assert_eq!(capture.errors().len(), 1, "{:?}", capture.errors());
    Ok(())
}

/// Distinct dead peers are reported separately.
#[tokio::test]
async fn test_each_dead_peer_reported() -> Result<()> {
    let capture = LogCapture::default();
    let _guard = capture.install();

    let a = spawn_node().await?;
    let first = refused_address().await;
    let second = refused_address().await;

    assert!(!a.transport.send(&mut envelope("x", first, b"")).await?);
    assert!(!a.transport.send(&mut envelope("x", second, b"")).await?);
    assert_eq!(capture.errors().len(), 2);
    assert_eq!(a.transport.tracker().len(), 2);
    Ok(())
}

/// When a dead peer comes back, the first success logs one recovery notice
/// and clears the record; later successes are quiet.
#[tokio::test]
async fn test_recovery_reported_once() -> Result<()> {
    let capture = LogCapture::default();
    let _guard = capture.install();

    let a = spawn_node().await?;
    let dead = refused_address().await;
    let address = dead.to_string();

    let mut env = envelope("clinicA", dead, b"retry me");
    assert!(!a.transport.send(&mut env).await?);
    assert!(a.transport.tracker().is_unreachable(&address));

    // Bring a node up on the port that was refusing.
    let mut b = spawn_node_on(dead.port(), &[]).await?;
    let infos_before = capture.infos().len();

    assert!(a.transport.send(&mut env).await?);
    assert!(!a.transport.tracker().is_unreachable(&address));
    let recoveries: Vec<_> = capture.infos()[infos_before..]
        .iter()
        .filter(|line| line.contains("can reach"))
        .cloned()
        .collect();
    assert_eq!(recoveries.len(), 1, "{recoveries:?}");
    assert!(recoveries[0].contains(&address));

    assert!(a.transport.send(&mut env).await?);
    let recoveries_after = capture
        .infos()
        .iter()
        .filter(|line| line.contains("can reach"))
        .count();
    assert_eq!(recoveries_after, 1);

    b.inbound.recv().await.context("first delivery missing")?;
    b.inbound.recv().await.context("second delivery missing")?;
    Ok(())
}

/// A peer that cannot be named at all counts as unreachable too.
#[tokio::test]
async fn test_unknown_host_is_tracked() -> Result<()> {
    let a = spawn_node().await?;
    let mut env = MessageEnvelope::new("clinicA", Payload::default())
        .with_network_address("no-such-peer.invalid:9720");
    assert!(!a.transport.send(&mut env).await?);
    assert!(a.transport.tracker().is_unreachable("no-such-peer.invalid:9720"));
    Ok(())
}

/// A broken target is a configuration fault: reported every time, never
/// tracked.
#[tokio::test]
async fn test_malformed_target_not_suppressed() -> Result<()> {
    let capture = LogCapture::default();
    let _guard = capture.install();

    let a = spawn_node().await?;
    let mut env = MessageEnvelope::new("clinic A", Payload::default())
        .with_network_address("127.0.0.1:9");
    assert!(!a.transport.send(&mut env).await?);
    assert!(!a.transport.send(&mut env).await?);

    assert_eq!(capture.errors().len(), 2);
    assert!(a.transport.tracker().is_empty());
    Ok(())
}
