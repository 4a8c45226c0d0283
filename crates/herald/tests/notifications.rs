//! Notification fan-out through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use herald::core::{AnyNotification, EmptyResolver};
use herald::prelude::*;

#[derive(Debug, Clone)]
struct OrderPlaced {
    id: u64,
}

impl Notification for OrderPlaced {}

struct Nobody;

impl Notification for Nobody {}

type Log = Arc<Mutex<Vec<String>>>;

/// Records its name, optionally after a delay, then fails if asked to.
struct Recorder {
    name: &'static str,
    log: Log,
    delay: Option<Duration>,
    fail: bool,
}

impl Recorder {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            delay: None,
            fail: false,
        }
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl NotificationHandler<OrderPlaced> for Recorder {
    async fn handle(&self, notification: &OrderPlaced, _ctx: &CallContext) -> HandlerResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log.lock().push(format!("{}:{}", self.name, notification.id));
        if self.fail {
            return Err(format!("{} failed", self.name).into());
        }
        Ok(())
    }
}

fn two_handlers(first_fails: bool) -> (Mediator, Log) {
    let log = Log::default();
    let first = Recorder::new("h1", &log);
    let first = if first_fails { first.failing() } else { first };
    let mediator = Mediator::builder()
        .notification_handler_instance::<OrderPlaced, _>(first)
        .notification_handler_instance::<OrderPlaced, _>(Recorder::new("h2", &log))
        .build(Arc::new(EmptyResolver));
    (mediator, log)
}

async fn publish(mediator: &Mediator, strategy: PublishStrategy) -> MediatorResult<()> {
    mediator
        .publish_with(OrderPlaced { id: 1 }, strategy, CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_zero_handlers_succeed_under_every_strategy() {
    let mediator = Mediator::builder().build(Arc::new(EmptyResolver));

    for strategy in PublishStrategy::ALL {
        tokio_test::assert_ok!(
            mediator
                .publish_with(Nobody, strategy, CancellationToken::new())
                .await
        );
        tokio_test::assert_ok!(
            mediator
                .publish_dyn(Some(Box::new(Nobody)), strategy, CancellationToken::new())
                .await
        );
    }
}

#[tokio::test]
async fn test_sequential_stop_skips_remaining_handlers() {
    let (mediator, log) = two_handlers(true);

    let err = tokio_test::assert_err!(publish(&mediator, PublishStrategy::SequentialStop).await);

    assert_eq!(err.to_string(), "handler failed: h1 failed");
    assert_eq!(*log.lock(), ["h1:1"]);
}

#[tokio::test]
async fn test_sequential_continue_runs_all_and_aggregates() {
    let (mediator, log) = two_handlers(true);

    let err = tokio_test::assert_err!(publish(&mediator, PublishStrategy::SequentialContinue).await);

    assert_eq!(*log.lock(), ["h1:1", "h2:1"]);
    match err {
        MediatorError::Aggregate(aggregate) => {
            assert_eq!(aggregate.len(), 1);
            assert_eq!(aggregate.errors()[0].to_string(), "handler failed: h1 failed");
        }
        other => panic!("expected aggregate, got {other:?}"),
    }
}

#[tokio::test]
async fn test_default_strategy_is_sequential_continue() {
    let (mediator, log) = two_handlers(false);

    tokio_test::assert_ok!(mediator.publish(OrderPlaced { id: 9 }).await);

    assert_eq!(mediator.default_strategy(), PublishStrategy::SequentialContinue);
    assert_eq!(*log.lock(), ["h1:9", "h2:9"]);
}

#[tokio::test]
async fn test_concurrent_wait_returns_after_all_complete() {
    let log = Log::default();
    let mediator = Mediator::builder()
        .notification_handler_instance::<OrderPlaced, _>(
            Recorder::new("slow", &log).delayed(Duration::from_millis(50)),
        )
        .notification_handler_instance::<OrderPlaced, _>(Recorder::new("fast", &log).failing())
        .build(Arc::new(EmptyResolver));

    let err = tokio_test::assert_err!(publish(&mediator, PublishStrategy::ConcurrentWait).await);

    // Both finished before publish returned; the slow one finished last.
    assert_eq!(*log.lock(), ["fast:1", "slow:1"]);
    assert!(matches!(err, MediatorError::Aggregate(ref a) if a.len() == 1));
}

struct Gated {
    gate: Arc<Notify>,
    done: Arc<Notify>,
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl NotificationHandler<OrderPlaced> for Gated {
    async fn handle(&self, _notification: &OrderPlaced, _ctx: &CallContext) -> HandlerResult<()> {
        self.gate.notified().await;
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.done.notify_one();
        Err("swallowed".into())
    }
}

#[tokio::test]
async fn test_concurrent_no_wait_returns_before_handlers_finish() {
    let gate = Arc::new(Notify::new());
    let done = Arc::new(Notify::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let mediator = Mediator::builder()
        .notification_handler_instance::<OrderPlaced, _>(Gated {
            gate: Arc::clone(&gate),
            done: Arc::clone(&done),
            runs: Arc::clone(&runs),
        })
        .build(Arc::new(EmptyResolver));

    // The handler cannot finish until the gate opens, yet publish returns.
    tokio_test::assert_ok!(publish(&mediator, PublishStrategy::ConcurrentNoWait).await);
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    gate.notify_one();
    tokio::time::timeout(Duration::from_secs(5), done.notified())
        .await
        .expect("handler did not run");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_publish_dyn_dispatches_on_runtime_type() {
    let (mediator, log) = two_handlers(false);

    let erased: Box<dyn AnyNotification> = Box::new(OrderPlaced { id: 3 });
    tokio_test::assert_ok!(
        mediator
            .publish_dyn(Some(erased), PublishStrategy::SequentialStop, CancellationToken::new())
            .await
    );

    assert_eq!(*log.lock(), ["h1:3", "h2:3"]);
}

#[tokio::test]
async fn test_publisher_trait_object() {
    let (mediator, log) = two_handlers(false);
    let publisher: Arc<dyn Publisher> = Arc::new(mediator);

    tokio_test::assert_ok!(
        publisher
            .publish(OrderPlaced { id: 4 }, PublishStrategy::ConcurrentWait)
            .await
    );

    let mut entries = log.lock().clone();
    entries.sort();
    assert_eq!(entries, ["h1:4", "h2:4"]);
}

struct EnvelopeIds(Arc<Mutex<Vec<String>>>);

#[async_trait]
impl NotificationHandler<OrderPlaced> for EnvelopeIds {
    async fn handle(&self, _notification: &OrderPlaced, ctx: &CallContext) -> HandlerResult<()> {
        self.0.lock().push(ctx.envelope().id.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_each_publish_gets_a_distinct_envelope() {
    let ids = Arc::new(Mutex::new(Vec::new()));
    let mediator = Mediator::builder()
        .notification_handler_instance::<OrderPlaced, _>(EnvelopeIds(Arc::clone(&ids)))
        .notification_handler_instance::<OrderPlaced, _>(EnvelopeIds(Arc::clone(&ids)))
        .build(Arc::new(EmptyResolver));

    for id in 0..3 {
        tokio_test::assert_ok!(mediator.publish(OrderPlaced { id }).await);
    }

    let ids = ids.lock().clone();
    assert_eq!(ids.len(), 6);
    // Handlers of one publish share its envelope; publishes do not.
    for pair in ids.chunks(2) {
        assert_eq!(pair[0], pair[1]);
    }
    assert_ne!(ids[0], ids[2]);
    assert_ne!(ids[2], ids[4]);
    assert_ne!(ids[0], ids[4]);
}
