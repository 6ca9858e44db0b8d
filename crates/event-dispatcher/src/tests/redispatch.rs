//! Re-sending the window to a reconnecting consumer.

use super::harness::{dispatcher, enqueue_all, ids, MockConsumer};
use crate::DispatcherStats;

#[tokio::test]
async fn redispatch_resends_in_flight_in_order() {
    let dispatcher = dispatcher(3, 100);
    let mut first = MockConsumer::attach(&dispatcher).await;
    enqueue_all(&dispatcher, 1..=5).await;
    assert_eq!(first.drain_ids(), ids(1..=3));
    assert!(dispatcher.ack(Some("event-2")).await);
    assert_eq!(first.drain_ids(), ids(4..=4));

    let mut second = MockConsumer::attach(&dispatcher).await;
    assert_eq!(dispatcher.redispatch_in_flight().await, 3);

    assert_eq!(
        second.drain_ids(),
        vec!["event-1".to_string(), "event-3".to_string(), "event-4".to_string()]
    );
    assert!(first.drain_ids().is_empty());
}

#[tokio::test]
async fn redispatch_does_not_change_state() {
    let dispatcher = dispatcher(2, 100);
    let mut consumer = MockConsumer::attach(&dispatcher).await;
    enqueue_all(&dispatcher, 1..=4).await;
    consumer.drain_ids();
    let before = dispatcher.stats().await;

    for _ in 0..3 {
        dispatcher.redispatch_in_flight().await;
    }

    assert_eq!(dispatcher.stats().await, before);
    assert_eq!(before, DispatcherStats { queued: 2, in_flight: 2 });
    assert_eq!(consumer.drain_ids().len(), 6);
}

#[tokio::test]
async fn dropped_consumer_keeps_events_in_flight() {
    let dispatcher = dispatcher(2, 100);
    let consumer = MockConsumer::attach(&dispatcher).await;
    drop(consumer);

    enqueue_all(&dispatcher, 1..=3).await;
    assert_eq!(dispatcher.stats().await.in_flight, 2);

    let mut replacement = MockConsumer::attach(&dispatcher).await;
    dispatcher.redispatch_in_flight().await;
    assert_eq!(replacement.drain_ids(), ids(1..=2));
}
