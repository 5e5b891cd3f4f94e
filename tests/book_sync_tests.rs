use async_trait::async_trait;
use huobix::core::book::{
    BookDelta, BookEvent, BookFeed, BookSnapshot, BookSubscription, BookSyncOptions,
    OrderBookSynchronizer, PriceLevel, SubscriptionHandle, SyncState,
};
use huobix::core::errors::ExchangeError;
use huobix::core::types::Symbol;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

fn symbol() -> Symbol {
    Symbol::new("BTC", "USDT").unwrap()
}

fn levels(raw: &[(Decimal, Decimal)]) -> Vec<PriceLevel> {
    raw.iter().map(|(p, q)| PriceLevel::new(*p, *q)).collect()
}

fn snapshot(sequence: u64, bid: Decimal, ask: Decimal) -> BookSnapshot {
    BookSnapshot {
        symbol: symbol(),
        sequence,
        bids: levels(&[(bid, dec!(1))]),
        asks: levels(&[(ask, dec!(1))]),
    }
}

fn delta(sequence: u64, previous: u64, bid: Decimal) -> BookDelta {
    BookDelta {
        symbol: symbol(),
        sequence,
        previous_sequence: Some(previous),
        bids: levels(&[(bid, dec!(2))]),
        asks: vec![],
    }
}

#[derive(Default)]
struct MockState {
    subscribe_error: Option<String>,
    initial_events: Vec<BookEvent>,
    snapshots: VecDeque<BookSnapshot>,
    snapshot_delay: Option<Duration>,
    event_tx: Option<mpsc::UnboundedSender<BookEvent>>,
    snapshot_requests: usize,
}

#[derive(Clone, Default)]
struct MockFeed {
    state: Arc<Mutex<MockState>>,
}

impl MockFeed {
    fn with_snapshots(snapshots: Vec<BookSnapshot>) -> Self {
        let feed = Self::default();
        feed.state.lock().unwrap().snapshots = snapshots.into();
        feed
    }

    fn push_event(&self, event: BookEvent) {
        let tx = self
            .state
            .lock()
            .unwrap()
            .event_tx
            .clone()
            .expect("feed not subscribed");
        tx.send(event).unwrap();
    }

    fn snapshot_requests(&self) -> usize {
        self.state.lock().unwrap().snapshot_requests
    }
}

#[async_trait]
impl BookFeed for MockFeed {
    async fn subscribe(&self, _symbol: &Symbol) -> Result<BookSubscription, ExchangeError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = &state.subscribe_error {
            return Err(ExchangeError::NetworkError(reason.clone()));
        }
        for event in state.initial_events.drain(..) {
            tx.send(event).map_err(|_| {
                ExchangeError::Other("event receiver dropped".to_string())
            })?;
        }
        state.event_tx = Some(tx);
        Ok(BookSubscription {
            events: rx,
            handle: SubscriptionHandle::detached(),
        })
    }

    async fn fetch_snapshot(&self, _symbol: &Symbol) -> Result<BookSnapshot, ExchangeError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.snapshot_requests += 1;
            state.snapshot_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state
            .lock()
            .unwrap()
            .snapshots
            .pop_front()
            .ok_or_else(|| ExchangeError::NetworkError("snapshot unavailable".to_string()))
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F, what: &str) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn start_buffers_deltas_and_syncs_against_the_snapshot() {
    let feed = MockFeed::with_snapshots(vec![snapshot(10, dec!(100), dec!(101))]);
    {
        let mut state = feed.state.lock().unwrap();
        // Deltas that arrive before the snapshot: one stale, two live
        state.initial_events = vec![
            BookEvent::Delta(delta(9, 8, dec!(95))),
            BookEvent::Delta(delta(11, 10, dec!(100.5))),
            BookEvent::Delta(delta(12, 11, dec!(100.7))),
        ];
    }

    let book = OrderBookSynchronizer::new(feed, symbol());
    book.start().await.unwrap();

    assert_eq!(book.state(), SyncState::Synced);
    wait_until(
        || book.best_bid().map(|l| l.price) == Some(dec!(100.7)),
        "deltas to apply",
    )
    .await;
    assert_eq!(book.best_ask().unwrap().price, dec!(101));
    // The stale delta at 95 must not be present
    assert!(book.bids(10).iter().all(|l| l.price != dec!(95)));
}

#[tokio::test]
async fn snapshot_timeout_faults_the_book() {
    let feed = MockFeed::with_snapshots(vec![snapshot(10, dec!(100), dec!(101))]);
    feed.state.lock().unwrap().snapshot_delay = Some(Duration::from_secs(60));

    let options = BookSyncOptions {
        snapshot_timeout: Duration::from_millis(50),
    };
    let book = OrderBookSynchronizer::with_options(feed, symbol(), options);

    let err = book.start().await.unwrap_err();
    assert!(matches!(err, ExchangeError::Timeout(_)), "got {err:?}");
    assert_eq!(book.state(), SyncState::Faulted);
    assert!(book.last_error().is_some());
}

#[tokio::test]
async fn subscribe_failure_faults_the_book() {
    let feed = MockFeed::default();
    feed.state.lock().unwrap().subscribe_error = Some("connection refused".to_string());

    let book = OrderBookSynchronizer::new(feed, symbol());
    let err = book.start().await.unwrap_err();
    assert!(matches!(err, ExchangeError::NetworkError(_)));
    assert_eq!(book.state(), SyncState::Faulted);
}

#[tokio::test]
async fn snapshot_error_faults_the_book() {
    // No snapshots queued, so the fetch fails
    let feed = MockFeed::default();
    let book = OrderBookSynchronizer::new(feed, symbol());

    let err = book.start().await.unwrap_err();
    assert!(matches!(err, ExchangeError::NetworkError(_)));
    assert_eq!(book.state(), SyncState::Faulted);
}

#[tokio::test]
async fn gap_triggers_an_internal_resync() {
    let feed = MockFeed::with_snapshots(vec![
        snapshot(10, dec!(100), dec!(101)),
        snapshot(20, dec!(200), dec!(201)),
    ]);

    let book = OrderBookSynchronizer::new(feed.clone(), symbol());
    book.start().await.unwrap();
    assert_eq!(book.state(), SyncState::Synced);
    assert_eq!(feed.snapshot_requests(), 1);

    // A delta that does not connect to sequence 10
    feed.push_event(BookEvent::Delta(delta(15, 14, dec!(150))));

    wait_until(
        || {
            book.state() == SyncState::Synced
                && book.best_bid().map(|l| l.price) == Some(dec!(200))
        },
        "resync against the second snapshot",
    )
    .await;
    assert_eq!(feed.snapshot_requests(), 2);
}

#[tokio::test]
async fn explicit_resync_fetches_a_fresh_snapshot() {
    let feed = MockFeed::with_snapshots(vec![
        snapshot(10, dec!(100), dec!(101)),
        snapshot(20, dec!(200), dec!(201)),
    ]);

    let book = OrderBookSynchronizer::new(feed.clone(), symbol());
    book.start().await.unwrap();

    book.resync().await.unwrap();
    assert_eq!(book.state(), SyncState::Synced);
    assert_eq!(book.best_bid().unwrap().price, dec!(200));
    assert_eq!(feed.snapshot_requests(), 2);
}

#[tokio::test]
async fn resync_before_start_is_rejected() {
    let feed = MockFeed::default();
    let book = OrderBookSynchronizer::new(feed, symbol());

    let err = book.resync().await.unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidParameters(_)));
}

#[tokio::test]
async fn dispose_is_idempotent_and_blocks_restart() {
    let feed = MockFeed::with_snapshots(vec![snapshot(10, dec!(100), dec!(101))]);
    let book = OrderBookSynchronizer::new(feed, symbol());
    book.start().await.unwrap();

    book.dispose();
    book.dispose();
    assert_eq!(book.state(), SyncState::Disposed);

    let err = book.start().await.unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidParameters(_)));
    let err = book.resync().await.unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidParameters(_)));
}

#[tokio::test]
async fn dispose_drops_all_levels() {
    let feed = MockFeed::with_snapshots(vec![snapshot(10, dec!(100), dec!(101))]);
    let book = OrderBookSynchronizer::new(feed, symbol());
    book.start().await.unwrap();
    assert_eq!(book.best_bid().unwrap().price, dec!(100));

    book.dispose();

    assert!(book.best_bid().is_none());
    assert!(book.best_ask().is_none());
    assert!(book.bids(10).is_empty());
    assert!(book.asks(10).is_empty());
}

#[tokio::test]
async fn dispose_before_start_is_allowed() {
    let feed = MockFeed::default();
    let book = OrderBookSynchronizer::new(feed, symbol());

    book.dispose();
    assert_eq!(book.state(), SyncState::Disposed);

    let err = book.start().await.unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidParameters(_)));
}

#[tokio::test]
async fn disconnect_event_moves_the_book_to_disconnected() {
    let feed = MockFeed::with_snapshots(vec![snapshot(10, dec!(100), dec!(101))]);
    let book = OrderBookSynchronizer::new(feed.clone(), symbol());
    book.start().await.unwrap();

    feed.push_event(BookEvent::Disconnected("stream ended".to_string()));

    wait_until(
        || book.state() == SyncState::Disconnected,
        "disconnected state",
    )
    .await;
    assert_eq!(book.last_error().as_deref(), Some("stream ended"));
}

#[tokio::test]
async fn streamed_snapshot_completes_start_while_the_fetch_hangs() {
    let feed = MockFeed::with_snapshots(vec![snapshot(50, dec!(500), dec!(501))]);
    {
        let mut state = feed.state.lock().unwrap();
        // The snapshot arrives over the stream; the fetch never finishes in time
        state.initial_events = vec![BookEvent::Snapshot(snapshot(10, dec!(100), dec!(101)))];
        state.snapshot_delay = Some(Duration::from_secs(60));
    }

    let options = BookSyncOptions {
        snapshot_timeout: Duration::from_millis(100),
    };
    let book = OrderBookSynchronizer::with_options(feed, symbol(), options);

    book.start().await.unwrap();
    assert_eq!(book.state(), SyncState::Synced);
    assert_eq!(book.best_bid().unwrap().price, dec!(100));
    assert!(book.last_error().is_none());
}

#[tokio::test]
async fn streamed_snapshot_replaces_the_book() {
    let feed = MockFeed::with_snapshots(vec![snapshot(10, dec!(100), dec!(101))]);
    let book = OrderBookSynchronizer::new(feed.clone(), symbol());
    book.start().await.unwrap();

    feed.push_event(BookEvent::Snapshot(snapshot(30, dec!(300), dec!(301))));

    wait_until(
        || book.best_bid().map(|l| l.price) == Some(dec!(300)),
        "streamed snapshot to install",
    )
    .await;
    assert_eq!(book.best_ask().unwrap().price, dec!(301));
}
