use crate::core::book::{
    BookEvent, BookFeed, BookSnapshot, BookSubscription, BookSyncOptions, OrderBookSynchronizer,
    PriceLevel, SubscriptionHandle, SyncState,
};
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReconnectWs, RestClient, TungsteniteWs, WsSession};
use crate::core::types::Symbol;
use crate::exchanges::huobi::codec::{HuobiCodec, HuobiMessage};
use crate::exchanges::huobi::converters::{depth_to_snapshot, ws_depth_to_delta};
use crate::exchanges::huobi::rest::{validate_merge_step, HuobiRestClient};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::warn;

/// Depth levels supported by the incremental `mbp` stream
const MBP_LEVELS: &[u32] = &[5, 20, 150, 400];

/// Which push channel feeds the book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuobiBookChannel {
    /// `market.$symbol.depth.step$N`: full images aggregated at the merge
    /// step, every push replacing the book
    MergedDepth,
    /// `market.$symbol.mbp.$levels`: sequence-linked incremental updates
    Incremental { levels: u32 },
}

/// Options for a Huobi order book
#[derive(Debug, Clone)]
pub struct HuobiBookOptions {
    pub channel: HuobiBookChannel,
    /// Price aggregation step for the REST snapshot, and for the stream
    /// when the merged depth channel is selected
    pub merge_step: u32,
    pub sync: BookSyncOptions,
}

impl Default for HuobiBookOptions {
    fn default() -> Self {
        Self {
            channel: HuobiBookChannel::Incremental { levels: 20 },
            merge_step: 0,
            sync: BookSyncOptions::default(),
        }
    }
}

/// Book feed backed by one of the depth push streams and the REST depth
/// endpoint for snapshots
pub struct HuobiBookFeed<R: RestClient + 'static> {
    rest: Arc<HuobiRestClient<R>>,
    ws_url: String,
    channel: HuobiBookChannel,
    merge_step: u32,
}

impl<R: RestClient + 'static> std::fmt::Debug for HuobiBookFeed<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuobiBookFeed")
            .field("ws_url", &self.ws_url)
            .field("channel", &self.channel)
            .field("merge_step", &self.merge_step)
            .finish_non_exhaustive()
    }
}

impl<R: RestClient + 'static> HuobiBookFeed<R> {
    pub fn new(
        rest: Arc<HuobiRestClient<R>>,
        ws_url: String,
        channel: HuobiBookChannel,
        merge_step: u32,
    ) -> Result<Self, ExchangeError> {
        if let HuobiBookChannel::Incremental { levels } = channel {
            if !MBP_LEVELS.contains(&levels) {
                return Err(ExchangeError::InvalidParameters(format!(
                    "Depth levels must be one of {:?}, got {}",
                    MBP_LEVELS, levels
                )));
            }
        }
        validate_merge_step(merge_step)?;
        Ok(Self {
            rest,
            ws_url,
            channel,
            merge_step,
        })
    }

    fn channel_name(&self, symbol: &Symbol) -> String {
        match self.channel {
            HuobiBookChannel::MergedDepth => format!(
                "market.{}.depth.step{}",
                symbol.to_exchange_string(),
                self.merge_step
            ),
            HuobiBookChannel::Incremental { levels } => {
                format!("market.{}.mbp.{}", symbol.to_exchange_string(), levels)
            }
        }
    }
}

type HuobiWs = ReconnectWs<HuobiCodec, TungsteniteWs<HuobiCodec>>;

async fn pump_events(mut ws: HuobiWs, symbol: Symbol, tx: mpsc::UnboundedSender<BookEvent>) {
    loop {
        match ws.next_message().await {
            Some(Ok(HuobiMessage::Ping(value))) => {
                if let Err(e) = ws.send_raw(HuobiCodec::encode_pong(value)).await {
                    warn!(symbol = %symbol, error = %e, "failed to answer ping");
                }
            }
            Some(Ok(HuobiMessage::DepthUpdate { tick, .. })) => {
                let delta = ws_depth_to_delta(symbol.clone(), &tick);
                if tx.send(BookEvent::Delta(delta)).is_err() {
                    break;
                }
            }
            Some(Ok(HuobiMessage::DepthSnapshot { tick, .. })) => {
                let snapshot = depth_to_snapshot(symbol.clone(), &tick);
                if tx.send(BookEvent::Snapshot(snapshot)).is_err() {
                    break;
                }
            }
            Some(Ok(HuobiMessage::SubResponse { status, subbed, .. })) => {
                if status != "ok" {
                    warn!(symbol = %symbol, subbed = ?subbed, status = %status, "subscription rejected");
                }
            }
            Some(Ok(HuobiMessage::Unknown)) => {}
            Some(Err(e)) => {
                let _ = tx.send(BookEvent::Disconnected(e.to_string()));
                break;
            }
            None => {
                let _ = tx.send(BookEvent::Disconnected("stream ended".to_string()));
                break;
            }
        }
    }
}

#[async_trait]
impl<R: RestClient + 'static> BookFeed for HuobiBookFeed<R> {
    async fn subscribe(&self, symbol: &Symbol) -> Result<BookSubscription, ExchangeError> {
        let channel = self.channel_name(symbol);

        let inner = TungsteniteWs::new(self.ws_url.clone(), "huobi".to_string(), HuobiCodec);
        let mut ws = ReconnectWs::new(inner).with_auto_resubscribe(true);
        ws.connect().await?;
        ws.subscribe(&[channel.as_str()]).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let symbol = symbol.clone();
        let task = tokio::spawn(pump_events(ws, symbol, tx));

        Ok(BookSubscription {
            events: rx,
            handle: SubscriptionHandle::new(task),
        })
    }

    async fn fetch_snapshot(&self, symbol: &Symbol) -> Result<BookSnapshot, ExchangeError> {
        let depth = self
            .rest
            .get_depth(&symbol.to_exchange_string(), self.merge_step)
            .await?;
        Ok(depth_to_snapshot(symbol.clone(), &depth))
    }
}

/// A locally synchronized order book for one Huobi symbol.
///
/// Construction validates the options; `start` subscribes and returns once
/// the book is in sync. Dropping the book disposes it.
pub struct HuobiOrderBook<R: RestClient + 'static> {
    inner: OrderBookSynchronizer<HuobiBookFeed<R>>,
}

impl<R: RestClient + 'static> HuobiOrderBook<R> {
    pub fn new(
        rest: Arc<HuobiRestClient<R>>,
        ws_url: String,
        symbol: Symbol,
    ) -> Result<Self, ExchangeError> {
        Self::with_options(rest, ws_url, symbol, HuobiBookOptions::default())
    }

    pub fn with_options(
        rest: Arc<HuobiRestClient<R>>,
        ws_url: String,
        symbol: Symbol,
        options: HuobiBookOptions,
    ) -> Result<Self, ExchangeError> {
        let feed = HuobiBookFeed::new(rest, ws_url, options.channel, options.merge_step)?;
        Ok(Self {
            inner: OrderBookSynchronizer::with_options(feed, symbol, options.sync),
        })
    }

    pub fn symbol(&self) -> &Symbol {
        self.inner.symbol()
    }

    pub fn state(&self) -> SyncState {
        self.inner.state()
    }

    pub fn state_watch(&self) -> watch::Receiver<SyncState> {
        self.inner.state_watch()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }

    /// Subscribe and synchronize; returns once the book is live
    pub async fn start(&self) -> Result<(), ExchangeError> {
        self.inner.start().await
    }

    /// Force a fresh snapshot
    pub async fn resync(&self) -> Result<(), ExchangeError> {
        self.inner.resync().await
    }

    /// Stop the book permanently. Safe to call more than once.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.inner.best_bid()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.inner.best_ask()
    }

    pub fn bids(&self, limit: usize) -> Vec<PriceLevel> {
        self.inner.bids(limit)
    }

    pub fn asks(&self, limit: usize) -> Vec<PriceLevel> {
        self.inner.asks(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::{RestClientBuilder, RestClientConfig};

    fn rest_client() -> Arc<HuobiRestClient<crate::core::kernel::ReqwestRest>> {
        let config = RestClientConfig::new(
            "http://127.0.0.1:1".to_string(),
            "huobi".to_string(),
        );
        let rest = RestClientBuilder::new(config).build().unwrap();
        Arc::new(HuobiRestClient::new(rest))
    }

    fn ws_url() -> String {
        "wss://127.0.0.1:1/ws".to_string()
    }

    fn symbol() -> Symbol {
        Symbol::new("BTC", "USDT").unwrap()
    }

    #[test]
    fn merged_depth_channel_is_keyed_by_merge_step() {
        let feed =
            HuobiBookFeed::new(rest_client(), ws_url(), HuobiBookChannel::MergedDepth, 2)
                .unwrap();
        assert_eq!(feed.channel_name(&symbol()), "market.btcusdt.depth.step2");
    }

    #[test]
    fn incremental_channel_is_keyed_by_levels() {
        let feed = HuobiBookFeed::new(
            rest_client(),
            ws_url(),
            HuobiBookChannel::Incremental { levels: 150 },
            0,
        )
        .unwrap();
        assert_eq!(feed.channel_name(&symbol()), "market.btcusdt.mbp.150");
    }

    #[test]
    fn unsupported_levels_are_rejected() {
        let result = HuobiBookFeed::new(
            rest_client(),
            ws_url(),
            HuobiBookChannel::Incremental { levels: 10 },
            0,
        );
        assert!(matches!(
            result.unwrap_err(),
            ExchangeError::InvalidParameters(_)
        ));
    }

    #[test]
    fn out_of_range_merge_step_is_rejected() {
        let result =
            HuobiBookFeed::new(rest_client(), ws_url(), HuobiBookChannel::MergedDepth, 6);
        assert!(matches!(
            result.unwrap_err(),
            ExchangeError::InvalidParameters(_)
        ));
    }
}
