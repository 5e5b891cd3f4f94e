pub mod account;
pub mod market_data;
pub mod trading;

use crate::core::{
    config::ExchangeConfig,
    errors::ExchangeError,
    kernel::RestClient,
    traits::{AccountInfo, ExchangeConnector, MarketDataSource, OrderPlacer},
    types::{Balance, Market, OrderRequest, OrderResponse, Symbol},
};
use crate::exchanges::huobi::book::{HuobiBookOptions, HuobiOrderBook};
use crate::exchanges::huobi::rest::HuobiRestClient;
use async_trait::async_trait;
use std::sync::Arc;

pub use account::Account;
pub use market_data::MarketData;
pub use trading::Trading;

/// Connector for the Huobi spot exchange, composed of the market data,
/// account and trading sub-implementations sharing one REST client.
pub struct HuobiConnector<R: RestClient + Clone> {
    rest: R,
    market: MarketData<R>,
    account: Account<R>,
    trading: Trading<R>,
    config: ExchangeConfig,
    ws_url: String,
}

impl<R: RestClient + Clone + 'static> HuobiConnector<R> {
    pub fn new(rest: R, config: ExchangeConfig, ws_url: String) -> Self {
        Self {
            market: MarketData::new(&rest, ws_url.clone()),
            account: Account::new(&rest),
            trading: Trading::new(&rest),
            rest,
            config,
            ws_url,
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn market(&self) -> &MarketData<R> {
        &self.market
    }

    pub fn account(&self) -> &Account<R> {
        &self.account
    }

    pub fn trading(&self) -> &Trading<R> {
        &self.trading
    }

    /// Create a synchronized order book for one symbol
    pub fn order_book(&self, symbol: Symbol) -> Result<HuobiOrderBook<R>, ExchangeError> {
        self.order_book_with_options(symbol, HuobiBookOptions::default())
    }

    /// Create a synchronized order book with custom options
    pub fn order_book_with_options(
        &self,
        symbol: Symbol,
        options: HuobiBookOptions,
    ) -> Result<HuobiOrderBook<R>, ExchangeError> {
        let rest = Arc::new(HuobiRestClient::new(self.rest.clone()));
        HuobiOrderBook::with_options(rest, self.ws_url.clone(), symbol, options)
    }
}

#[async_trait]
impl<R: RestClient + Clone + 'static> MarketDataSource for HuobiConnector<R> {
    async fn get_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        self.market.get_markets().await
    }

    fn get_websocket_url(&self) -> String {
        self.market.get_websocket_url()
    }
}

#[async_trait]
impl<R: RestClient + Clone + 'static> OrderPlacer for HuobiConnector<R> {
    async fn place_order(&self, order: OrderRequest) -> Result<OrderResponse, ExchangeError> {
        self.trading.place_order(order).await
    }

    async fn cancel_order(&self, order_id: i64) -> Result<(), ExchangeError> {
        self.trading.cancel_order(order_id).await
    }
}

#[async_trait]
impl<R: RestClient + Clone + 'static> AccountInfo for HuobiConnector<R> {
    async fn get_account_balance(&self) -> Result<Vec<Balance>, ExchangeError> {
        self.account.get_account_balance().await
    }
}

impl<R: RestClient + Clone + 'static> ExchangeConnector for HuobiConnector<R> {}
