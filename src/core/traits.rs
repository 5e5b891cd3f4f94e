use crate::core::{
    errors::ExchangeError,
    types::{Balance, Market, OrderRequest, OrderResponse},
};
use async_trait::async_trait;

#[async_trait]
pub trait MarketDataSource {
    /// Get all available markets/trading pairs
    async fn get_markets(&self) -> Result<Vec<Market>, ExchangeError>;

    /// Get WebSocket endpoint URL for market data
    fn get_websocket_url(&self) -> String;
}

#[async_trait]
pub trait OrderPlacer {
    /// Place a new order, returning the exchange order id
    async fn place_order(&self, order: OrderRequest) -> Result<OrderResponse, ExchangeError>;

    /// Cancel an open order by id
    async fn cancel_order(&self, order_id: i64) -> Result<(), ExchangeError>;
}

#[async_trait]
pub trait AccountInfo {
    async fn get_account_balance(&self) -> Result<Vec<Balance>, ExchangeError>;
}

// Composite trait for callers that need the full connector surface
#[async_trait]
pub trait ExchangeConnector: MarketDataSource + OrderPlacer + AccountInfo {}
