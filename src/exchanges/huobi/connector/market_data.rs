use crate::core::{errors::ExchangeError, kernel::RestClient, traits::MarketDataSource, types::Market};
use crate::exchanges::huobi::converters::convert_symbol;
use crate::exchanges::huobi::rest::HuobiRestClient;
use async_trait::async_trait;
use tracing::{instrument, warn};

/// Market data implementation for Huobi
pub struct MarketData<R: RestClient> {
    rest: HuobiRestClient<R>,
    ws_url: String,
}

impl<R: RestClient> MarketData<R> {
    /// Create a new market data source
    pub fn new(rest: &R, ws_url: String) -> Self
    where
        R: Clone,
    {
        Self {
            rest: HuobiRestClient::new(rest.clone()),
            ws_url,
        }
    }

    pub fn rest(&self) -> &HuobiRestClient<R> {
        &self.rest
    }
}

#[async_trait]
impl<R: RestClient> MarketDataSource for MarketData<R> {
    #[instrument(skip(self), fields(exchange = "huobi"))]
    async fn get_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        let symbols = self.rest.get_symbols().await?;

        let markets = symbols
            .iter()
            .filter_map(|symbol| match convert_symbol(symbol) {
                Ok(market) => Some(market),
                Err(e) => {
                    warn!(symbol = %symbol.symbol, error = %e, "skipping malformed symbol");
                    None
                }
            })
            .collect();

        Ok(markets)
    }

    fn get_websocket_url(&self) -> String {
        self.ws_url.clone()
    }
}
