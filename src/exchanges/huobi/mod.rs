pub mod book;
pub mod codec;
pub mod connector;
pub mod converters;
pub mod rest;
pub mod signer;
pub mod types;

use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClientBuilder, RestClientConfig};
use signer::HuobiSigner;
use std::sync::Arc;

// Re-export main types for easier importing
pub use book::{HuobiBookChannel, HuobiBookFeed, HuobiBookOptions, HuobiOrderBook};
pub use codec::{HuobiCodec, HuobiMessage};
pub use connector::HuobiConnector;
pub use converters::{HuobiOrderState, HuobiPeriod};
pub use rest::HuobiRestClient;
pub use types::{
    HuobiAccount, HuobiAccountBalances, HuobiBalance, HuobiBatchCancelResult, HuobiKline,
    HuobiMarketDepth, HuobiMarketDetail, HuobiMergedTick, HuobiOrder, HuobiOrderTrade, HuobiSymbol,
    HuobiSymbolTick, HuobiTradeBatch, HuobiWsDepthUpdate,
};

const DEFAULT_REST_URL: &str = "https://api.huobi.pro";
const DEFAULT_WS_URL: &str = "wss://api.huobi.pro/ws";

/// Create a Huobi connector from a configuration.
///
/// Credentials are optional; without them only the public market data
/// endpoints are available and signed calls fail with an authentication
/// error.
pub fn create_huobi_connector(
    config: ExchangeConfig,
) -> Result<HuobiConnector<ReqwestRest>, ExchangeError> {
    let base_url = config
        .rest_url
        .clone()
        .unwrap_or_else(|| DEFAULT_REST_URL.to_string());
    let ws_url = config
        .ws_url
        .clone()
        .unwrap_or_else(|| DEFAULT_WS_URL.to_string());

    let rest_config = RestClientConfig::new(base_url, "huobi".to_string());
    let mut rest_builder = RestClientBuilder::new(rest_config);

    if config.has_credentials() {
        let signer = Arc::new(HuobiSigner::new(
            config.api_key().to_string(),
            config.secret_key().to_string(),
        ));
        rest_builder = rest_builder.with_signer(signer);
    }

    let rest = rest_builder.build()?;
    Ok(HuobiConnector::new(rest, config, ws_url))
}

/// Create a typed REST client only, without the connector surface
pub fn create_huobi_rest_client(
    config: &ExchangeConfig,
) -> Result<HuobiRestClient<ReqwestRest>, ExchangeError> {
    let base_url = config
        .rest_url
        .clone()
        .unwrap_or_else(|| DEFAULT_REST_URL.to_string());

    let rest_config = RestClientConfig::new(base_url, "huobi".to_string());
    let mut rest_builder = RestClientBuilder::new(rest_config);

    if config.has_credentials() {
        let signer = Arc::new(HuobiSigner::new(
            config.api_key().to_string(),
            config.secret_key().to_string(),
        ));
        rest_builder = rest_builder.with_signer(signer);
    }

    Ok(HuobiRestClient::new(rest_builder.build()?))
}
