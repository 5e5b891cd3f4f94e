use crate::core::{
    errors::ExchangeError,
    kernel::RestClient,
    traits::OrderPlacer,
    types::{OrderRequest, OrderResponse, OrderType},
};
use crate::exchanges::huobi::connector::account::SpotAccountResolver;
use crate::exchanges::huobi::converters::order_type_to_string;
use crate::exchanges::huobi::rest::HuobiRestClient;
use async_trait::async_trait;
use tracing::instrument;

/// Trading implementation for Huobi
pub struct Trading<R: RestClient> {
    rest: HuobiRestClient<R>,
    account_id: SpotAccountResolver,
}

impl<R: RestClient> Trading<R> {
    /// Create a new order manager
    pub fn new(rest: &R) -> Self
    where
        R: Clone,
    {
        Self {
            rest: HuobiRestClient::new(rest.clone()),
            account_id: SpotAccountResolver::new(),
        }
    }

    async fn spot_account_id(&self) -> Result<i64, ExchangeError> {
        self.account_id.resolve(&self.rest).await
    }
}

#[async_trait]
impl<R: RestClient> OrderPlacer for Trading<R> {
    #[instrument(skip(self, order), fields(exchange = "huobi", symbol = %order.symbol))]
    async fn place_order(&self, order: OrderRequest) -> Result<OrderResponse, ExchangeError> {
        if order.order_type != OrderType::Market && order.price.is_none() {
            return Err(ExchangeError::InvalidParameters(
                "Price is required for non-market orders".to_string(),
            ));
        }

        let account_id = self.spot_account_id().await?;
        let symbol = order.symbol.to_exchange_string();
        let order_type = order_type_to_string(order.side, order.order_type);
        let amount = order.amount.to_string();
        let price = order.price.map(|p| p.to_string());

        let order_id = self
            .rest
            .place_order(
                account_id,
                &symbol,
                &order_type,
                &amount,
                price.as_deref(),
            )
            .await?;

        Ok(OrderResponse {
            order_id,
            symbol: order.symbol,
            side: order.side,
            order_type: order.order_type,
        })
    }

    #[instrument(skip(self), fields(exchange = "huobi"))]
    async fn cancel_order(&self, order_id: i64) -> Result<(), ExchangeError> {
        self.rest.cancel_order(order_id).await?;
        Ok(())
    }
}
