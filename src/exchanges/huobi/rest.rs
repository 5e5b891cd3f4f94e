use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::exchanges::huobi::converters::HuobiPeriod;
use crate::exchanges::huobi::types::{
    HuobiAccount, HuobiAccountBalances, HuobiBatchCancelResult, HuobiKline, HuobiMarketDepth,
    HuobiMarketDetail, HuobiMergedTick, HuobiOrder, HuobiOrderTrade, HuobiSymbol, HuobiSymbolTick,
    HuobiTradeBatch,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::instrument;

/// Split a response envelope into its payload or an API error.
///
/// Only a `status` field present and different from `"ok"` marks an error;
/// envelopes without one are successes, since some endpoints omit it. The
/// payload sits under `data` or `tick`. Error responses carry `err-code` and
/// `err-msg`; when those are missing the raw body becomes the error message.
pub fn classify(value: Value) -> Result<Value, ExchangeError> {
    let is_error = matches!(value.get("status"), Some(status) if status != "ok");
    if !is_error {
        let payload = value
            .get("data")
            .or_else(|| value.get("tick"))
            .cloned()
            .unwrap_or(Value::Null);
        return Ok(payload);
    }

    let code = value
        .get("err-code")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    let message = value
        .get("err-msg")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    match (code, message) {
        (Some(code), Some(message)) => Err(ExchangeError::ApiError { code, message }),
        (code, message) => Err(ExchangeError::ApiError {
            code: code.unwrap_or_else(|| "unknown".to_string()),
            message: message.unwrap_or_else(|| value.to_string()),
        }),
    }
}

fn deserialize_payload<T: DeserializeOwned>(payload: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(payload).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to deserialize payload: {}", e))
    })
}

/// Validate a symbol string: 6 to 8 ASCII letters, e.g. "btcusdt"
pub fn validate_symbol(symbol: &str) -> Result<(), ExchangeError> {
    let valid = (6..=8).contains(&symbol.len())
        && symbol.chars().all(|c| c.is_ascii_alphabetic());
    if valid {
        Ok(())
    } else {
        Err(ExchangeError::InvalidParameters(format!(
            "Invalid symbol: {}",
            symbol
        )))
    }
}

/// Validate a result set size against the 1..=2000 window the API allows
pub fn validate_size(size: u32) -> Result<(), ExchangeError> {
    if (1..=2000).contains(&size) {
        Ok(())
    } else {
        Err(ExchangeError::InvalidParameters(format!(
            "Size must be between 1 and 2000, got {}",
            size
        )))
    }
}

/// Validate a depth merge step; the API supports step0 through step5
pub fn validate_merge_step(step: u32) -> Result<(), ExchangeError> {
    if step <= 5 {
        Ok(())
    } else {
        Err(ExchangeError::InvalidParameters(format!(
            "Merge step must be between 0 and 5, got {}",
            step
        )))
    }
}

/// Typed client for the Huobi spot REST API
pub struct HuobiRestClient<R: RestClient> {
    rest: R,
}

impl<R: RestClient> HuobiRestClient<R> {
    pub fn new(rest: R) -> Self {
        Self { rest }
    }

    pub fn rest(&self) -> &R {
        &self.rest
    }

    async fn get_payload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        signed: bool,
    ) -> Result<T, ExchangeError> {
        let envelope = self.rest.get(endpoint, params, signed).await?;
        deserialize_payload(classify(envelope)?)
    }

    async fn post_payload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ExchangeError> {
        let envelope = self.rest.post(endpoint, params, true).await?;
        deserialize_payload(classify(envelope)?)
    }

    // ---- public market data ----

    /// 24h statistics for every trading pair
    #[instrument(skip(self))]
    pub async fn get_tickers(&self) -> Result<Vec<HuobiSymbolTick>, ExchangeError> {
        self.get_payload("/market/tickers", &[], false).await
    }

    /// Merged detail (best bid/ask plus 24h statistics) for one symbol
    #[instrument(skip(self))]
    pub async fn get_merged_ticker(&self, symbol: &str) -> Result<HuobiMergedTick, ExchangeError> {
        validate_symbol(symbol)?;
        self.get_payload("/market/detail/merged", &[("symbol", symbol)], false)
            .await
    }

    /// Candlesticks for a symbol, most recent first
    #[instrument(skip(self))]
    pub async fn get_klines(
        &self,
        symbol: &str,
        period: HuobiPeriod,
        size: u32,
    ) -> Result<Vec<HuobiKline>, ExchangeError> {
        validate_symbol(symbol)?;
        validate_size(size)?;
        let size = size.to_string();
        self.get_payload(
            "/market/history/kline",
            &[
                ("symbol", symbol),
                ("period", period.as_str()),
                ("size", &size),
            ],
            false,
        )
        .await
    }

    /// Full order book image; `merge_step` controls price aggregation
    #[instrument(skip(self))]
    pub async fn get_depth(
        &self,
        symbol: &str,
        merge_step: u32,
    ) -> Result<HuobiMarketDepth, ExchangeError> {
        validate_symbol(symbol)?;
        validate_merge_step(merge_step)?;
        let step = format!("step{}", merge_step);
        self.get_payload(
            "/market/depth",
            &[("symbol", symbol), ("type", &step)],
            false,
        )
        .await
    }

    /// The most recent trade batch for a symbol
    #[instrument(skip(self))]
    pub async fn get_last_trade(&self, symbol: &str) -> Result<HuobiTradeBatch, ExchangeError> {
        validate_symbol(symbol)?;
        self.get_payload("/market/trade", &[("symbol", symbol)], false)
            .await
    }

    /// Recent trade batches for a symbol
    #[instrument(skip(self))]
    pub async fn get_trade_history(
        &self,
        symbol: &str,
        size: u32,
    ) -> Result<Vec<HuobiTradeBatch>, ExchangeError> {
        validate_symbol(symbol)?;
        validate_size(size)?;
        let size = size.to_string();
        self.get_payload(
            "/market/history/trade",
            &[("symbol", symbol), ("size", &size)],
            false,
        )
        .await
    }

    /// 24h statistics for one symbol
    #[instrument(skip(self))]
    pub async fn get_market_detail(
        &self,
        symbol: &str,
    ) -> Result<HuobiMarketDetail, ExchangeError> {
        validate_symbol(symbol)?;
        self.get_payload("/market/detail", &[("symbol", symbol)], false)
            .await
    }

    /// All supported trading pairs and their precision rules
    #[instrument(skip(self))]
    pub async fn get_symbols(&self) -> Result<Vec<HuobiSymbol>, ExchangeError> {
        self.get_payload("/v1/common/symbols", &[], false).await
    }

    /// All supported currencies
    #[instrument(skip(self))]
    pub async fn get_currencies(&self) -> Result<Vec<String>, ExchangeError> {
        self.get_payload("/v1/common/currencys", &[], false).await
    }

    /// Server time as a unix timestamp in milliseconds
    #[instrument(skip(self))]
    pub async fn get_server_time(&self) -> Result<i64, ExchangeError> {
        self.get_payload("/v1/common/timestamp", &[], false).await
    }

    // ---- accounts ----

    /// Accounts owned by the API key
    #[instrument(skip(self))]
    pub async fn get_accounts(&self) -> Result<Vec<HuobiAccount>, ExchangeError> {
        self.get_payload("/v1/account/accounts", &[], true).await
    }

    /// Balances for one account
    #[instrument(skip(self))]
    pub async fn get_balances(
        &self,
        account_id: i64,
    ) -> Result<HuobiAccountBalances, ExchangeError> {
        let endpoint = format!("/v1/account/accounts/{}/balance", account_id);
        self.get_payload(&endpoint, &[], true).await
    }

    // ---- orders ----

    /// Place an order, returning the exchange order id
    #[instrument(skip(self))]
    pub async fn place_order(
        &self,
        account_id: i64,
        symbol: &str,
        order_type: &str,
        amount: &str,
        price: Option<&str>,
    ) -> Result<i64, ExchangeError> {
        validate_symbol(symbol)?;
        let account_id = account_id.to_string();
        let mut params = vec![
            ("account-id", account_id.as_str()),
            ("symbol", symbol),
            ("type", order_type),
            ("amount", amount),
        ];
        if let Some(price) = price {
            params.push(("price", price));
        }

        let order_id: String = self.post_payload("/v1/order/orders/place", &params).await?;
        order_id.parse().map_err(|_| {
            ExchangeError::DeserializationError(format!("Invalid order id: {}", order_id))
        })
    }

    /// Currently open orders.
    ///
    /// Filtering by account requires a symbol as well; the API rejects an
    /// account filter on its own.
    #[instrument(skip(self))]
    pub async fn get_open_orders(
        &self,
        account_id: Option<i64>,
        symbol: Option<&str>,
        side: Option<&str>,
        size: Option<u32>,
    ) -> Result<Vec<HuobiOrder>, ExchangeError> {
        if account_id.is_some() && symbol.is_none() {
            return Err(ExchangeError::InvalidParameters(
                "Filtering open orders by account also requires a symbol".to_string(),
            ));
        }
        if let Some(symbol) = symbol {
            validate_symbol(symbol)?;
        }
        if let Some(size) = size {
            validate_size(size)?;
        }

        let account_id = account_id.map(|id| id.to_string());
        let size = size.map(|s| s.to_string());
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(account_id) = account_id.as_deref() {
            params.push(("account-id", account_id));
        }
        if let Some(symbol) = symbol {
            params.push(("symbol", symbol));
        }
        if let Some(side) = side {
            params.push(("side", side));
        }
        if let Some(size) = size.as_deref() {
            params.push(("size", size));
        }

        self.get_payload("/v1/order/openOrders", &params, true).await
    }

    /// Historical orders matching the given states, e.g. "filled,canceled"
    #[instrument(skip(self))]
    pub async fn get_orders(
        &self,
        symbol: &str,
        states: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
        from_id: Option<i64>,
        size: Option<u32>,
    ) -> Result<Vec<HuobiOrder>, ExchangeError> {
        validate_symbol(symbol)?;
        if let Some(size) = size {
            validate_size(size)?;
        }

        let from_id = from_id.map(|id| id.to_string());
        let size = size.map(|s| s.to_string());
        let mut params: Vec<(&str, &str)> = vec![("symbol", symbol), ("states", states)];
        if let Some(start_date) = start_date {
            params.push(("start-date", start_date));
        }
        if let Some(end_date) = end_date {
            params.push(("end-date", end_date));
        }
        if let Some(from_id) = from_id.as_deref() {
            params.push(("from", from_id));
        }
        if let Some(size) = size.as_deref() {
            params.push(("size", size));
        }

        self.get_payload("/v1/order/orders", &params, true).await
    }

    /// Cancel one order, returning its id
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: i64) -> Result<i64, ExchangeError> {
        let endpoint = format!("/v1/order/orders/{}/submitcancel", order_id);
        let canceled: String = self.post_payload(&endpoint, &[]).await?;
        canceled.parse().map_err(|_| {
            ExchangeError::DeserializationError(format!("Invalid order id: {}", canceled))
        })
    }

    /// Cancel up to 50 orders in one call
    #[instrument(skip(self, order_ids), fields(count = order_ids.len()))]
    pub async fn cancel_orders(
        &self,
        order_ids: &[i64],
    ) -> Result<HuobiBatchCancelResult, ExchangeError> {
        if order_ids.is_empty() || order_ids.len() > 50 {
            return Err(ExchangeError::InvalidParameters(format!(
                "Batch cancel accepts 1 to 50 order ids, got {}",
                order_ids.len()
            )));
        }
        let ids: Vec<String> = order_ids.iter().map(ToString::to_string).collect();
        let body = json!({ "order-ids": ids });
        let envelope = self
            .rest
            .post_with_body("/v1/order/orders/batchcancel", &body, true)
            .await?;
        deserialize_payload(classify(envelope)?)
    }

    /// Details of one order
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i64) -> Result<HuobiOrder, ExchangeError> {
        let endpoint = format!("/v1/order/orders/{}", order_id);
        self.get_payload(&endpoint, &[], true).await
    }

    /// Fills of one order
    #[instrument(skip(self))]
    pub async fn get_order_trades(
        &self,
        order_id: i64,
    ) -> Result<Vec<HuobiOrderTrade>, ExchangeError> {
        let endpoint = format!("/v1/order/orders/{}/matchresults", order_id);
        self.get_payload(&endpoint, &[], true).await
    }

    /// Historical fills for a symbol
    #[instrument(skip(self))]
    pub async fn get_symbol_trades(
        &self,
        symbol: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
        from_id: Option<i64>,
        size: Option<u32>,
    ) -> Result<Vec<HuobiOrderTrade>, ExchangeError> {
        validate_symbol(symbol)?;
        if let Some(size) = size {
            validate_size(size)?;
        }

        let from_id = from_id.map(|id| id.to_string());
        let size = size.map(|s| s.to_string());
        let mut params: Vec<(&str, &str)> = vec![("symbol", symbol)];
        if let Some(start_date) = start_date {
            params.push(("start-date", start_date));
        }
        if let Some(end_date) = end_date {
            params.push(("end-date", end_date));
        }
        if let Some(from_id) = from_id.as_deref() {
            params.push(("from", from_id));
        }
        if let Some(size) = size.as_deref() {
            params.push(("size", size));
        }

        self.get_payload("/v1/order/matchresults", &params, true)
            .await
    }
}
