mod common;

use std::time::Duration;

use common::{config, is_publish, Journal, Op, ScriptedLink, ScriptedSession};
use plantlink_connectors::{
    ConnectionState, ConnectivityManager, PublishOutcome, Publisher, TelemetryQueue,
};
use plantlink_core::Reading;
use proptest::prelude::*;

#[tokio::test(start_paused = true)]
async fn ensure_connected_is_idempotent_once_up() {
    let journal = Journal::new();
    let mut manager =
        ConnectivityManager::new(ScriptedLink::new(&journal), ScriptedSession::new(&journal), &config());

    assert_eq!(manager.establish(Duration::from_secs(5)).await, ConnectionState::SessionUp);
    assert_eq!(journal.ops(), vec![Op::Join, Op::Connect]);

    let before = journal.len();
    assert_eq!(manager.ensure_connected().await, ConnectionState::SessionUp);
    assert_eq!(manager.ensure_connected().await, ConnectionState::SessionUp);
    assert_eq!(journal.len(), before);
}

#[tokio::test(start_paused = true)]
async fn session_handshake_failures_back_off() {
    let journal = Journal::new();
    let mut manager = ConnectivityManager::new(
        ScriptedLink::new(&journal),
        ScriptedSession::refusing(&journal, 3),
        &config(),
    );

    // Poll far more often than the retry delay allows
    for _ in 0..250 {
        if manager.ensure_connected().await == ConnectionState::SessionUp {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(manager.state(), ConnectionState::SessionUp);

    let attempts = journal.times_of(|op| *op == Op::Connect);
    assert_eq!(attempts.len(), 4, "three refusals then success");
    for pair in attempts.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(5), "retried after only {:?}", gap);
        assert!(gap < Duration::from_millis(5_500), "retry stalled for {:?}", gap);
    }

    // The link was joined once; handshake failures fall back to TransportUp
    assert_eq!(journal.count(|op| *op == Op::Join), 1);
}

#[tokio::test(start_paused = true)]
async fn transport_failures_use_the_short_delay() {
    let journal = Journal::new();
    let mut manager = ConnectivityManager::new(
        ScriptedLink::failing(&journal, 2),
        ScriptedSession::new(&journal),
        &config(),
    );

    assert_eq!(manager.establish(Duration::from_secs(5)).await, ConnectionState::SessionUp);

    let joins = journal.times_of(|op| *op == Op::Join);
    assert_eq!(joins.len(), 3);
    assert_eq!(joins[1] - joins[0], Duration::from_millis(500));
    assert_eq!(joins[2] - joins[1], Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn nothing_happens_before_the_retry_deadline() {
    let journal = Journal::new();
    let mut manager = ConnectivityManager::new(
        ScriptedLink::new(&journal),
        ScriptedSession::refusing(&journal, 1),
        &config(),
    );

    while manager.ensure_connected().await != ConnectionState::TransportUp
        || journal.count(|op| *op == Op::Connect) == 0
    {}
    assert_eq!(manager.retry_delay(), Duration::from_secs(5));

    let before = journal.len();
    for _ in 0..10 {
        assert_eq!(manager.ensure_connected().await, ConnectionState::TransportUp);
    }
    assert_eq!(journal.len(), before);
}

#[tokio::test(start_paused = true)]
async fn lost_session_reconnects_from_transport() {
    let journal = Journal::new();
    let online = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
    let mut manager = ConnectivityManager::new(
        ScriptedLink::new(&journal),
        ScriptedSession::gated(&journal, online.clone()),
        &config(),
    );
    manager.establish(Duration::from_secs(1)).await;

    online.store(false, std::sync::atomic::Ordering::SeqCst);
    assert!(!manager.heartbeat().await);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.stats().sessions_lost, 1);

    online.store(true, std::sync::atomic::Ordering::SeqCst);
    assert_eq!(manager.establish(Duration::from_secs(10)).await, ConnectionState::SessionUp);
    assert_eq!(journal.count(|op| *op == Op::Join), 2);
    assert_eq!(manager.stats().sessions_established, 2);
}

#[tokio::test(start_paused = true)]
async fn dropped_sessions_are_not_retried_in_a_tight_loop() {
    let journal = Journal::new();
    let config = config();
    let (_tx, rx) = TelemetryQueue::new(config.queue_capacity).split();
    let manager =
        ConnectivityManager::new(ScriptedLink::new(&journal), ScriptedSession::flaky(&journal), &config);
    let mut publisher = Publisher::new(manager, rx, &config);

    // Same waiting rule as the network worker loop, bounded by a pass count
    let started = tokio::time::Instant::now();
    for _ in 0..500 {
        if started.elapsed() >= Duration::from_secs(21) {
            break;
        }
        if let PublishOutcome::NotConnected(_) = publisher.run_once().await {
            let delay = publisher.manager().retry_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    let handshakes = journal.times_of(|op| *op == Op::Connect);
    assert_eq!(handshakes.len(), 5, "handshakes at 0, 5, 10, 15 and 20 s");
    for pair in handshakes.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(config.timing.session_retry_ms));
    }
    assert_eq!(publisher.manager().stats().sessions_lost, 5);
}

async fn publish_all(values: &[u16]) -> Vec<u16> {
    let journal = Journal::new();
    let config = config();
    let (tx, rx) = TelemetryQueue::new(config.queue_capacity).split();
    let manager =
        ConnectivityManager::new(ScriptedLink::new(&journal), ScriptedSession::new(&journal), &config);
    let mut publisher = Publisher::new(manager, rx, &config);

    for &value in values {
        assert!(tx.enqueue(Reading::new(value, 4095).unwrap()));
    }
    while journal.count(is_publish) < values.len() {
        publisher.run_once().await;
    }
    journal.published_values()
}

#[tokio::test(start_paused = true)]
async fn publishes_in_enqueue_order() {
    let values = [4095, 0, 17, 17, 2048, 1];
    assert_eq!(publish_all(&values).await, values);
}

proptest! {
    #[test]
    fn fifo_order_survives_the_publish_path(values in prop::collection::vec(0u16..=4095, 1..20)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let published = runtime.block_on(publish_all(&values));
        prop_assert_eq!(published, values);
    }
}
