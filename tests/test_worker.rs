use skillet::{SkilletError, UpdateNotif, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{testbed_with, wait_until, FakeFeed};

// ============================================================
// QUEUE BOUNDS
// ============================================================

#[tokio::test]
async fn add_update_notif_rejects_when_the_queue_is_full() {
    // Hold the worker inside its first pass so the channel stays occupied.
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let feed = FakeFeed::gated(gate.clone());
    feed.set_fail(true);

    let worker = WorkerConfig {
        queue_size: 2,
        retry_delay: Duration::from_millis(10),
        retry_count_max: 0,
    };
    let bed = testbed_with(feed, worker);

    bed.controller
        .add_update_notif(UpdateNotif::new("t1", "photos"))
        .unwrap();
    let feed = bed.feed.clone();
    wait_until(move || feed.call_count() == 1).await;

    // The worker is blocked; these two fill the channel.
    bed.controller
        .add_update_notif(UpdateNotif::new("t1", "files"))
        .unwrap();
    bed.controller
        .add_update_notif(UpdateNotif::new("t2", "photos"))
        .unwrap();

    let err = bed
        .controller
        .add_update_notif(UpdateNotif::new("t2", "files"))
        .unwrap_err();
    assert!(matches!(err, SkilletError::QueueFull));

    // Release the worker and let the queue drain.
    gate.add_permits(16);
    let feed = bed.feed.clone();
    wait_until(move || feed.call_count() == 3).await;
}

#[tokio::test]
async fn notifications_past_the_retry_cap_are_rejected() {
    let bed = testbed_with(
        FakeFeed::new(),
        WorkerConfig {
            queue_size: 100,
            retry_delay: Duration::from_millis(10),
            retry_count_max: 2,
        },
    );

    let notif = UpdateNotif {
        instance: "t1".to_string(),
        doc_type: "photos".to_string(),
        retry_count: 3,
    };
    let err = bed.controller.add_update_notif(notif).unwrap_err();
    assert!(matches!(
        err,
        SkilletError::RetryExhausted { count: 3, max: 2, .. }
    ));
}

// ============================================================
// RETRY EXHAUSTION
// ============================================================

#[tokio::test]
async fn failing_updates_retry_until_the_cap_then_the_queue_drains() {
    let feed = FakeFeed::new();
    feed.set_fail(true);

    let bed = testbed_with(
        feed,
        WorkerConfig {
            queue_size: 100,
            retry_delay: Duration::from_millis(20),
            retry_count_max: 2,
        },
    );

    bed.controller
        .add_update_notif(UpdateNotif::new("t1", "photos"))
        .unwrap();

    // Attempts with retry counts 0, 1 and 2 run; the re-enqueue at count 3
    // is rejected by the queue.
    let feed = bed.feed.clone();
    wait_until(move || feed.call_count() == 3).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(bed.feed.call_count(), 3);
}

// ============================================================
// SUCCESS PATH
// ============================================================

#[tokio::test]
async fn successful_update_runs_exactly_one_pass() {
    let bed = testbed_with(
        FakeFeed::new(),
        WorkerConfig {
            queue_size: 100,
            // Replication to the unreachable read side schedules retries;
            // cap them out immediately so the pass count stays observable.
            retry_delay: Duration::from_millis(10),
            retry_count_max: 0,
        },
    );
    bed.write_config("t1", "languages: [en]\n");

    bed.controller
        .add_update_notif(UpdateNotif::new("t1", "photos"))
        .unwrap();

    let feed = bed.feed.clone();
    wait_until(move || feed.call_count() >= 1).await;
    assert!(bed.shard_dir("t1", "en", "photos").join("meta.json").exists());

    tokio::time::sleep(Duration::from_millis(200)).await;
    // The replication retry was re-enqueued once at most and then rejected;
    // only the retried pass may add one more feed call.
    assert!(bed.feed.call_count() <= 2);
}
