use rust_decimal::Decimal;
use serde::Deserialize;

/// Symbol metadata from `/v1/common/symbols`
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiSymbol {
    #[serde(rename = "base-currency")]
    pub base_currency: String,
    #[serde(rename = "quote-currency")]
    pub quote_currency: String,
    #[serde(rename = "price-precision")]
    pub price_precision: i32,
    #[serde(rename = "amount-precision")]
    pub amount_precision: i32,
    #[serde(rename = "symbol-partition")]
    pub symbol_partition: String,
    pub symbol: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(rename = "value-precision", default)]
    pub value_precision: Option<i32>,
    #[serde(rename = "min-order-amt", default)]
    pub min_order_amount: Option<Decimal>,
    #[serde(rename = "max-order-amt", default)]
    pub max_order_amount: Option<Decimal>,
}

/// An account from `/v1/account/accounts`
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiAccount {
    pub id: i64,
    #[serde(rename = "type")]
    pub account_type: String,
    pub state: String,
    #[serde(rename = "subtype", default)]
    pub sub_type: Option<String>,
}

/// A single balance entry within an account
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiBalance {
    pub currency: String,
    /// "trade" for available funds, "frozen" for funds locked in orders
    #[serde(rename = "type")]
    pub balance_type: String,
    pub balance: Decimal,
}

/// Balances for an account from `/v1/account/accounts/{id}/balance`
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiAccountBalances {
    pub id: i64,
    #[serde(rename = "type")]
    pub account_type: String,
    pub state: String,
    pub list: Vec<HuobiBalance>,
}

/// An order from the order query endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiOrder {
    pub id: i64,
    pub symbol: String,
    #[serde(rename = "account-id")]
    pub account_id: i64,
    pub amount: Decimal,
    pub price: Decimal,
    #[serde(rename = "created-at")]
    pub created_at: i64,
    /// Combined side and type, e.g. "buy-limit"
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(rename = "field-amount", default)]
    pub filled_amount: Option<Decimal>,
    #[serde(rename = "field-cash-amount", default)]
    pub filled_cash_amount: Option<Decimal>,
    #[serde(rename = "field-fees", default)]
    pub filled_fees: Option<Decimal>,
    #[serde(rename = "finished-at", default)]
    pub finished_at: Option<i64>,
    #[serde(rename = "canceled-at", default)]
    pub canceled_at: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
    pub state: String,
}

/// A fill from the match result endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiOrderTrade {
    pub id: i64,
    #[serde(rename = "order-id")]
    pub order_id: i64,
    #[serde(rename = "match-id")]
    pub match_id: i64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(default)]
    pub source: Option<String>,
    pub price: Decimal,
    #[serde(rename = "filled-amount")]
    pub filled_amount: Decimal,
    #[serde(rename = "filled-fees")]
    pub filled_fees: Decimal,
    #[serde(rename = "created-at")]
    pub created_at: i64,
}

/// A cancellation that the batch cancel endpoint rejected
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiFailedCancel {
    #[serde(rename = "order-id")]
    pub order_id: String,
    #[serde(rename = "err-code")]
    pub error_code: String,
    #[serde(rename = "err-msg")]
    pub error_message: String,
}

/// Result of `/v1/order/orders/batchcancel`
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiBatchCancelResult {
    #[serde(default)]
    pub success: Vec<String>,
    #[serde(default)]
    pub failed: Vec<HuobiFailedCancel>,
}

/// 24h statistics for one symbol from `/market/tickers`
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiSymbolTick {
    pub symbol: String,
    pub open: Decimal,
    pub close: Decimal,
    pub low: Decimal,
    pub high: Decimal,
    /// Base currency volume
    pub amount: Decimal,
    /// Number of trades
    pub count: i64,
    /// Quote currency volume
    pub vol: Decimal,
}

/// Merged market detail from `/market/detail/merged`
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiMergedTick {
    pub id: i64,
    pub open: Decimal,
    pub close: Decimal,
    pub low: Decimal,
    pub high: Decimal,
    pub amount: Decimal,
    pub count: i64,
    pub vol: Decimal,
    /// Best bid as [price, size]
    pub bid: [Decimal; 2],
    /// Best ask as [price, size]
    pub ask: [Decimal; 2],
}

/// 24h statistics from `/market/detail`
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiMarketDetail {
    pub open: Decimal,
    pub close: Decimal,
    pub low: Decimal,
    pub high: Decimal,
    pub amount: Decimal,
    pub count: i64,
    pub vol: Decimal,
}

/// A candlestick from `/market/history/kline`
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiKline {
    /// Bucket start as a unix timestamp in seconds
    pub id: i64,
    pub open: Decimal,
    pub close: Decimal,
    pub low: Decimal,
    pub high: Decimal,
    pub amount: Decimal,
    pub count: i64,
    pub vol: Decimal,
}

/// An order book image from `/market/depth`
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiMarketDepth {
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub ts: Option<i64>,
    /// [price, size] pairs, best bid first
    pub bids: Vec<[Decimal; 2]>,
    /// [price, size] pairs, best ask first
    pub asks: Vec<[Decimal; 2]>,
}

/// A single trade within a trade batch
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiTradeEntry {
    pub id: i64,
    pub price: Decimal,
    pub amount: Decimal,
    /// "buy" or "sell", from the taker's perspective
    pub direction: String,
    pub ts: i64,
}

/// A batch of trades from `/market/trade` and `/market/history/trade`
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiTradeBatch {
    pub id: i64,
    pub ts: i64,
    pub data: Vec<HuobiTradeEntry>,
}

/// Incremental depth update from the `market.$symbol.mbp.$levels` stream
#[derive(Debug, Clone, Deserialize)]
pub struct HuobiWsDepthUpdate {
    #[serde(rename = "seqNum")]
    pub seq_num: u64,
    #[serde(rename = "prevSeqNum", default)]
    pub prev_seq_num: Option<u64>,
    #[serde(default)]
    pub bids: Vec<[Decimal; 2]>,
    #[serde(default)]
    pub asks: Vec<[Decimal; 2]>,
}
