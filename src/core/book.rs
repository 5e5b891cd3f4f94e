use crate::core::errors::ExchangeError;
use crate::core::types::Symbol;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

/// A single price level of an order book side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// A full order book image at a known sequence number
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    pub symbol: Symbol,
    pub sequence: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// An incremental order book update
///
/// A level with zero quantity removes that price from the book. When the
/// exchange provides it, `previous_sequence` is the sequence number this delta
/// expects the book to be at; a mismatch means updates were lost.
#[derive(Debug, Clone)]
pub struct BookDelta {
    pub symbol: Symbol,
    pub sequence: u64,
    pub previous_sequence: Option<u64>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// Events delivered by a book feed
#[derive(Debug, Clone)]
pub enum BookEvent {
    /// A full book image arrived over the stream
    Snapshot(BookSnapshot),
    /// An incremental update arrived
    Delta(BookDelta),
    /// The stream ended and will not recover on its own
    Disconnected(String),
}

/// Synchronization lifecycle of an order book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Not started, or the stream dropped
    Disconnected,
    /// Subscribed, waiting for the first snapshot
    AwaitingSnapshot,
    /// Deltas are arriving and being buffered while the snapshot is pending
    Buffering,
    /// Snapshot installed and deltas applying in sequence
    Synced,
    /// A sequence gap was detected; refetching the snapshot
    Resyncing,
    /// An unrecoverable error occurred
    Faulted,
    /// The book was disposed and cannot be restarted
    Disposed,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::AwaitingSnapshot => "awaiting_snapshot",
            Self::Buffering => "buffering",
            Self::Synced => "synced",
            Self::Resyncing => "resyncing",
            Self::Faulted => "faulted",
            Self::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

/// Outcome of applying a delta against the current book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Delta was consistent and applied
    Applied,
    /// Delta predates the current book state and was dropped
    Stale,
    /// Delta does not connect to the current book state; updates were lost
    Gap,
}

/// Outcome of installing a snapshot and draining the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Synced,
    /// A buffered delta did not connect; the snapshot is already stale
    Gap,
}

/// The sorted book sides plus the delta buffer used before the snapshot lands.
///
/// Bids are keyed by `Reverse(price)` so iteration yields best bid first;
/// asks iterate best ask first naturally. Purely synchronous, all concurrency
/// lives in [`OrderBookSynchronizer`].
#[derive(Debug, Default)]
pub struct BookCore {
    sequence: u64,
    synced: bool,
    bids: BTreeMap<Reverse<Decimal>, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    buffer: Vec<BookDelta>,
}

impl BookCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn buffered_count(&self) -> usize {
        self.buffer.len()
    }

    /// Queue a delta received before the snapshot is installed
    pub fn buffer_delta(&mut self, delta: BookDelta) {
        self.buffer.push(delta);
    }

    /// Clear the book for a fresh snapshot, dropping any buffered deltas
    pub fn reset(&mut self) {
        self.sequence = 0;
        self.synced = false;
        self.bids.clear();
        self.asks.clear();
        self.buffer.clear();
    }

    /// Install a snapshot and drain the buffered deltas in arrival order.
    /// Deltas at or below the snapshot sequence are dropped as stale.
    pub fn install_snapshot(&mut self, snapshot: &BookSnapshot) -> InstallOutcome {
        self.bids.clear();
        self.asks.clear();
        for level in &snapshot.bids {
            if !level.quantity.is_zero() {
                self.bids.insert(Reverse(level.price), level.quantity);
            }
        }
        for level in &snapshot.asks {
            if !level.quantity.is_zero() {
                self.asks.insert(level.price, level.quantity);
            }
        }
        self.sequence = snapshot.sequence;
        self.synced = true;

        let buffered = std::mem::take(&mut self.buffer);
        for delta in buffered {
            match self.apply_delta(&delta) {
                DeltaOutcome::Applied | DeltaOutcome::Stale => {}
                DeltaOutcome::Gap => {
                    self.synced = false;
                    return InstallOutcome::Gap;
                }
            }
        }
        InstallOutcome::Synced
    }

    /// Apply a delta to a synced book
    pub fn apply_delta(&mut self, delta: &BookDelta) -> DeltaOutcome {
        if delta.sequence <= self.sequence {
            return DeltaOutcome::Stale;
        }
        let connects = match delta.previous_sequence {
            Some(previous) => previous == self.sequence,
            // Without an explicit link any newer sequence is accepted
            None => true,
        };
        if !connects {
            return DeltaOutcome::Gap;
        }

        for level in &delta.bids {
            if level.quantity.is_zero() {
                self.bids.remove(&Reverse(level.price));
            } else {
                self.bids.insert(Reverse(level.price), level.quantity);
            }
        }
        for level in &delta.asks {
            if level.quantity.is_zero() {
                self.asks.remove(&level.price);
            } else {
                self.asks.insert(level.price, level.quantity);
            }
        }
        self.sequence = delta.sequence;
        DeltaOutcome::Applied
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids
            .iter()
            .next()
            .map(|(Reverse(price), quantity)| PriceLevel::new(*price, *quantity))
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks
            .iter()
            .next()
            .map(|(price, quantity)| PriceLevel::new(*price, *quantity))
    }

    /// Bid levels, best first
    pub fn bids(&self, limit: usize) -> Vec<PriceLevel> {
        self.bids
            .iter()
            .take(limit)
            .map(|(Reverse(price), quantity)| PriceLevel::new(*price, *quantity))
            .collect()
    }

    /// Ask levels, best first
    pub fn asks(&self, limit: usize) -> Vec<PriceLevel> {
        self.asks
            .iter()
            .take(limit)
            .map(|(price, quantity)| PriceLevel::new(*price, *quantity))
            .collect()
    }
}

/// Handle to a live subscription; aborts the producing task when dropped
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A handle with no task behind it, for feeds that need no pump
    pub fn detached() -> Self {
        Self { task: None }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// A live book event stream
pub struct BookSubscription {
    pub events: mpsc::UnboundedReceiver<BookEvent>,
    pub handle: SubscriptionHandle,
}

/// Source of order book data: a delta stream plus a snapshot fetcher
#[async_trait]
pub trait BookFeed: Send + Sync + 'static {
    /// Subscribe to the incremental update stream for a symbol
    async fn subscribe(&self, symbol: &Symbol) -> Result<BookSubscription, ExchangeError>;

    /// Fetch a full book image for a symbol
    async fn fetch_snapshot(&self, symbol: &Symbol) -> Result<BookSnapshot, ExchangeError>;
}

/// Options controlling book synchronization
#[derive(Debug, Clone)]
pub struct BookSyncOptions {
    /// How long to wait for the initial or resync snapshot
    pub snapshot_timeout: Duration,
}

impl Default for BookSyncOptions {
    fn default() -> Self {
        Self {
            snapshot_timeout: Duration::from_millis(10_000),
        }
    }
}

const MAX_INSTALL_ATTEMPTS: u32 = 3;

struct BookShared<F: BookFeed> {
    feed: F,
    symbol: Symbol,
    options: BookSyncOptions,
    book: Mutex<BookCore>,
    state: watch::Sender<SyncState>,
    last_error: Mutex<Option<String>>,
}

impl<F: BookFeed> BookShared<F> {
    fn current_state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Transition state unless the book is already disposed
    fn set_state(&self, next: SyncState) {
        self.state.send_if_modified(|current| {
            if *current == SyncState::Disposed || *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Transition only when the current state matches `from`
    fn set_state_from(&self, from: SyncState, next: SyncState) {
        self.state.send_if_modified(|current| {
            if *current == from {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    fn fault(&self, reason: String) {
        if let Ok(mut last_error) = self.last_error.lock() {
            *last_error = Some(reason);
        }
        self.set_state(SyncState::Faulted);
    }

    /// Wait until a snapshot is installed, fetching one under the configured
    /// timeout. The fetch races the state watch: a snapshot delivered over
    /// the stream satisfies the condition just as well, and a book that is
    /// already synced is never faulted or overwritten with a fetched image.
    /// Retries when the buffered deltas have already outrun the snapshot.
    async fn fetch_and_install(&self) -> Result<(), ExchangeError> {
        let mut state_rx = self.state.subscribe();
        for _ in 0..MAX_INSTALL_ATTEMPTS {
            match self.current_state() {
                SyncState::Disposed | SyncState::Synced => return Ok(()),
                _ => {}
            }

            let fetched = tokio::select! {
                _ = state_rx.wait_for(|state| {
                    matches!(state, SyncState::Synced | SyncState::Disposed)
                }) => {
                    // A stream-delivered snapshot installed first
                    return Ok(());
                }
                result = tokio::time::timeout(
                    self.options.snapshot_timeout,
                    self.feed.fetch_snapshot(&self.symbol),
                ) => result,
            };

            let snapshot = match fetched {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(e)) => {
                    if self.current_state() == SyncState::Synced {
                        return Ok(());
                    }
                    self.fault(e.to_string());
                    return Err(e);
                }
                Err(_) => {
                    if self.current_state() == SyncState::Synced {
                        return Ok(());
                    }
                    let reason = format!(
                        "Snapshot for {} did not arrive within {}ms",
                        self.symbol,
                        self.options.snapshot_timeout.as_millis()
                    );
                    self.fault(reason.clone());
                    return Err(ExchangeError::Timeout(reason));
                }
            };

            let outcome = {
                let mut book = match self.book.lock() {
                    Ok(book) => book,
                    Err(poisoned) => poisoned.into_inner(),
                };
                // A dispose or a stream snapshot may have landed while the
                // fetch was in flight; the fetched image is older, drop it
                match self.current_state() {
                    SyncState::Disposed | SyncState::Synced => return Ok(()),
                    _ => {}
                }
                if book.is_synced() {
                    return Ok(());
                }
                book.install_snapshot(&snapshot)
            };

            match outcome {
                InstallOutcome::Synced => {
                    debug!(symbol = %self.symbol, sequence = snapshot.sequence, "order book synced");
                    self.set_state(SyncState::Synced);
                    return Ok(());
                }
                InstallOutcome::Gap => {
                    warn!(symbol = %self.symbol, "snapshot already stale, refetching");
                }
            }
        }

        let reason = format!(
            "Failed to synchronize order book for {} after {} snapshot attempts",
            self.symbol, MAX_INSTALL_ATTEMPTS
        );
        self.fault(reason.clone());
        Err(ExchangeError::Other(reason))
    }

    /// Re-enter synchronization after a gap, keeping the subscription alive
    async fn resync_internal(&self) {
        self.set_state(SyncState::Resyncing);
        {
            let mut book = match self.book.lock() {
                Ok(book) => book,
                Err(poisoned) => poisoned.into_inner(),
            };
            book.reset();
        }
        if let Err(e) = self.fetch_and_install().await {
            error!(symbol = %self.symbol, error = %e, "resync failed");
        }
    }

    fn handle_event(&self, event: BookEvent) -> Option<ResyncNeeded> {
        match event {
            BookEvent::Snapshot(snapshot) => {
                let outcome = {
                    let mut book = match self.book.lock() {
                        Ok(book) => book,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    book.install_snapshot(&snapshot)
                };
                match outcome {
                    InstallOutcome::Synced => {
                        self.set_state(SyncState::Synced);
                        None
                    }
                    InstallOutcome::Gap => Some(ResyncNeeded),
                }
            }
            BookEvent::Delta(delta) => {
                let outcome = {
                    let mut book = match self.book.lock() {
                        Ok(book) => book,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    if book.is_synced() {
                        book.apply_delta(&delta)
                    } else {
                        book.buffer_delta(delta);
                        self.set_state_from(SyncState::AwaitingSnapshot, SyncState::Buffering);
                        DeltaOutcome::Stale
                    }
                };
                match outcome {
                    DeltaOutcome::Applied | DeltaOutcome::Stale => None,
                    DeltaOutcome::Gap => {
                        warn!(symbol = %self.symbol, "sequence gap detected");
                        Some(ResyncNeeded)
                    }
                }
            }
            BookEvent::Disconnected(reason) => {
                warn!(symbol = %self.symbol, reason = %reason, "book feed disconnected");
                if let Ok(mut last_error) = self.last_error.lock() {
                    *last_error = Some(reason);
                }
                self.set_state(SyncState::Disconnected);
                None
            }
        }
    }
}

struct ResyncNeeded;

/// Keeps a local order book in sync with the exchange.
///
/// Subscribes to the incremental stream first, buffers deltas while the REST
/// snapshot is in flight, then drains the buffer and applies updates in
/// sequence. A detected gap triggers an internal resync that keeps the
/// subscription alive and refetches the snapshot.
pub struct OrderBookSynchronizer<F: BookFeed> {
    shared: Arc<BookShared<F>>,
    state_rx: watch::Receiver<SyncState>,
    pump: Mutex<Option<JoinHandle<()>>>,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl<F: BookFeed> OrderBookSynchronizer<F> {
    pub fn new(feed: F, symbol: Symbol) -> Self {
        Self::with_options(feed, symbol, BookSyncOptions::default())
    }

    pub fn with_options(feed: F, symbol: Symbol, options: BookSyncOptions) -> Self {
        let (state_tx, state_rx) = watch::channel(SyncState::Disconnected);
        Self {
            shared: Arc::new(BookShared {
                feed,
                symbol,
                options,
                book: Mutex::new(BookCore::new()),
                state: state_tx,
                last_error: Mutex::new(None),
            }),
            state_rx,
            pump: Mutex::new(None),
            subscription: Mutex::new(None),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.shared.symbol
    }

    pub fn state(&self) -> SyncState {
        self.shared.current_state()
    }

    /// Watch channel for observing state transitions
    pub fn state_watch(&self) -> watch::Receiver<SyncState> {
        self.state_rx.clone()
    }

    /// The most recent error reason, if any
    pub fn last_error(&self) -> Option<String> {
        self.shared
            .last_error
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// Subscribe to the stream and synchronize against a fresh snapshot.
    ///
    /// Returns once the book is synced. Calling this on an already running
    /// book is a no-op; calling it on a disposed book is an error.
    #[instrument(skip(self), fields(symbol = %self.shared.symbol))]
    pub async fn start(&self) -> Result<(), ExchangeError> {
        match self.state() {
            SyncState::Disposed => {
                return Err(ExchangeError::InvalidParameters(
                    "order book is disposed".to_string(),
                ));
            }
            SyncState::Disconnected | SyncState::Faulted => {}
            _ => return Ok(()),
        }

        {
            let mut book = match self.shared.book.lock() {
                Ok(book) => book,
                Err(poisoned) => poisoned.into_inner(),
            };
            book.reset();
        }
        self.shared.set_state(SyncState::AwaitingSnapshot);

        let subscription = match self.shared.feed.subscribe(&self.shared.symbol).await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.shared.fault(e.to_string());
                return Err(e);
            }
        };

        let BookSubscription { mut events, handle } = subscription;
        if let Ok(mut slot) = self.subscription.lock() {
            *slot = Some(handle);
        }

        let shared = Arc::clone(&self.shared);
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if shared.current_state() == SyncState::Disposed {
                    break;
                }
                if let Some(ResyncNeeded) = shared.handle_event(event) {
                    shared.resync_internal().await;
                }
            }
        });
        if let Ok(mut slot) = self.pump.lock() {
            if let Some(previous) = slot.replace(pump) {
                previous.abort();
            }
        }

        self.shared.fetch_and_install().await
    }

    /// Force a resynchronization against a fresh snapshot
    #[instrument(skip(self), fields(symbol = %self.shared.symbol))]
    pub async fn resync(&self) -> Result<(), ExchangeError> {
        match self.state() {
            SyncState::Disposed => Err(ExchangeError::InvalidParameters(
                "order book is disposed".to_string(),
            )),
            SyncState::Disconnected => Err(ExchangeError::InvalidParameters(
                "order book is not started".to_string(),
            )),
            _ => {
                self.shared.set_state(SyncState::Resyncing);
                {
                    let mut book = match self.shared.book.lock() {
                        Ok(book) => book,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    book.reset();
                }
                self.shared.fetch_and_install().await
            }
        }
    }

    /// Stop the book permanently, dropping all levels and buffered deltas.
    /// Safe to call more than once.
    pub fn dispose(&self) {
        let _ = self.shared.state.send(SyncState::Disposed);
        if let Ok(mut slot) = self.pump.lock() {
            if let Some(pump) = slot.take() {
                pump.abort();
            }
        }
        if let Ok(mut slot) = self.subscription.lock() {
            slot.take();
        }
        let mut book = match self.shared.book.lock() {
            Ok(book) => book,
            Err(poisoned) => poisoned.into_inner(),
        };
        book.reset();
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.shared.book.lock().ok().and_then(|book| book.best_bid())
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.shared.book.lock().ok().and_then(|book| book.best_ask())
    }

    /// Bid levels, best first
    pub fn bids(&self, limit: usize) -> Vec<PriceLevel> {
        self.shared
            .book
            .lock()
            .map(|book| book.bids(limit))
            .unwrap_or_default()
    }

    /// Ask levels, best first
    pub fn asks(&self, limit: usize) -> Vec<PriceLevel> {
        self.shared
            .book
            .lock()
            .map(|book| book.asks(limit))
            .unwrap_or_default()
    }
}

impl<F: BookFeed> Drop for OrderBookSynchronizer<F> {
    fn drop(&mut self) {
        self.dispose();
    }
}
