/// Transport kernel - exchange-agnostic REST and WebSocket plumbing
///
/// The kernel contains only transport logic and generic interfaces. Everything
/// exchange-specific (canonical signing payloads, message formats, endpoint
/// paths) lives behind the traits defined here.
///
/// # Architecture
///
/// ## Transport Layer
/// - `RestClient`: Unified HTTP client interface
/// - `ReqwestRest`: reqwest-backed implementation with a two-phase
///   assemble/execute pipeline, so the exact bytes that were signed are the
///   bytes that go on the wire
/// - `WsSession`: WebSocket connection management
/// - `ReconnectWs`: Automatic reconnection wrapper
///
/// ## Authentication
/// - `Signer`: Pluggable authentication interface. Implementations return the
///   complete signed parameter set; `uri_param_names` tells the assembler
///   which parameters stay in the query string for body-carrying requests.
///
/// ## Message Handling
/// - `WsCodec`: Exchange-specific message encoding/decoding
///
/// # Example
/// ```rust,no_run
/// use huobix::core::kernel::{RestClient, RestClientBuilder, RestClientConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RestClientConfig::new(
///     "https://api.huobi.pro".to_string(),
///     "huobi".to_string(),
/// );
/// let rest = RestClientBuilder::new(config).build()?;
/// let tickers = rest.get("/market/tickers", &[], false).await?;
/// # let _ = tickers;
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod rest;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use codec::WsCodec;
pub use rest::{
    AssembledRequest, BodyFormat, PostParameters, ReqwestRest, RestClient, RestClientBuilder,
    RestClientConfig,
};
pub use signer::{encode_query, percent_encode, SignatureResult, Signer};
pub use ws::{ReconnectWs, TungsteniteWs, WsConfig, WsSession};
