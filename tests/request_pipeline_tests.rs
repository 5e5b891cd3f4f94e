use huobix::core::config::ExchangeConfig;
use huobix::core::errors::ExchangeError;
use huobix::core::kernel::{ReqwestRest, RestClientBuilder, RestClientConfig};
use huobix::exchanges::huobi::signer::HuobiSigner;
use huobix::exchanges::huobi::{create_huobi_rest_client, HuobiPeriod};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;

const AUTH_PARAMS: [&str; 5] = [
    "AccessKeyId",
    "SignatureMethod",
    "SignatureVersion",
    "Timestamp",
    "Signature",
];

fn signed_rest() -> ReqwestRest {
    let config = RestClientConfig::new("https://api.huobi.pro".to_string(), "huobi".to_string());
    RestClientBuilder::new(config)
        .with_signer(Arc::new(HuobiSigner::new(
            "test-key".to_string(),
            "test-secret".to_string(),
        )))
        .build()
        .expect("failed to build rest client")
}

fn unsigned_rest() -> ReqwestRest {
    let config = RestClientConfig::new("https://api.huobi.pro".to_string(), "huobi".to_string());
    RestClientBuilder::new(config)
        .build()
        .expect("failed to build rest client")
}

#[test]
fn signed_post_puts_only_auth_params_in_query() {
    let rest = signed_rest();
    let request = rest
        .assemble(
            Method::POST,
            "/v1/order/orders/place",
            &[("account-id", "1"), ("amount", "5")],
            true,
        )
        .unwrap();

    let query_keys: Vec<&str> = request.query.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(query_keys.len(), 5);
    for name in AUTH_PARAMS {
        assert!(query_keys.contains(&name), "missing {name} in query");
    }

    let body: Value = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body, json!({"account-id": "1", "amount": "5"}));
}

#[test]
fn signed_post_with_no_business_params_sends_empty_object() {
    let rest = signed_rest();
    let request = rest
        .assemble(Method::POST, "/v1/order/orders/1/submitcancel", &[], true)
        .unwrap();

    assert_eq!(request.query.len(), 5);
    assert_eq!(request.body.as_deref().unwrap(), b"{}");
}

#[test]
fn signed_get_puts_everything_in_query() {
    let rest = signed_rest();
    let request = rest
        .assemble(
            Method::GET,
            "/v1/order/orders",
            &[("symbol", "btcusdt"), ("states", "filled")],
            true,
        )
        .unwrap();

    assert!(request.body.is_none());
    assert_eq!(request.query.len(), 7);

    // Sorted auth and business params together, Signature appended last
    let query_keys: Vec<&str> = request.query.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(query_keys.last(), Some(&"Signature"));
    let mut sortable = query_keys.clone();
    sortable.pop();
    let mut sorted = sortable.clone();
    sorted.sort_unstable();
    assert_eq!(sortable, sorted);
}

#[test]
fn signed_query_is_percent_encoded_in_the_url() {
    let rest = signed_rest();
    let request = rest
        .assemble(Method::GET, "/v1/account/accounts", &[], true)
        .unwrap();

    let url = request.full_url();
    // The timestamp colons must be escaped, with uppercase hex and no '+'
    assert!(url.contains("Timestamp="));
    assert!(url.contains("%3A"));
    assert!(!url.contains('+'));
}

#[test]
fn unsigned_request_marked_signed_requires_credentials() {
    let rest = unsigned_rest();
    let err = rest
        .assemble(Method::GET, "/v1/account/accounts", &[], true)
        .unwrap_err();
    assert!(matches!(err, ExchangeError::AuthenticationRequired));
}

#[test]
fn unsigned_get_keeps_params_as_given() {
    let rest = unsigned_rest();
    let request = rest
        .assemble(
            Method::GET,
            "/market/history/kline",
            &[("symbol", "btcusdt"), ("period", "1min"), ("size", "10")],
            false,
        )
        .unwrap();

    assert_eq!(
        request.full_url(),
        "https://api.huobi.pro/market/history/kline?symbol=btcusdt&period=1min&size=10"
    );
}

// Validation failures must surface before any network activity, so these
// calls complete against an unroutable base URL.

fn offline_client() -> huobix::exchanges::huobi::HuobiRestClient<ReqwestRest> {
    let config = ExchangeConfig::read_only().rest_url("http://127.0.0.1:1".to_string());
    create_huobi_rest_client(&config).expect("failed to build client")
}

#[tokio::test]
async fn kline_size_out_of_range_is_rejected_locally() {
    let client = offline_client();
    for size in [0, 2001] {
        let err = client
            .get_klines("btcusdt", HuobiPeriod::OneMinute, size)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ExchangeError::InvalidParameters(_)),
            "size {size} should fail validation, got {err:?}"
        );
    }
}

#[tokio::test]
async fn invalid_symbol_is_rejected_locally() {
    let client = offline_client();
    for symbol in ["btc", "toolongsymbol", "btc-usdt", "btcusd1"] {
        let err = client.get_merged_ticker(symbol).await.unwrap_err();
        assert!(
            matches!(err, ExchangeError::InvalidParameters(_)),
            "symbol {symbol} should fail validation, got {err:?}"
        );
    }
}

#[tokio::test]
async fn merge_step_out_of_range_is_rejected_locally() {
    let client = offline_client();
    let err = client.get_depth("btcusdt", 6).await.unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidParameters(_)));
}

#[tokio::test]
async fn open_orders_account_filter_requires_symbol() {
    let client = offline_client();
    let err = client
        .get_open_orders(Some(42), None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidParameters(_)));
}

#[tokio::test]
async fn batch_cancel_rejects_empty_and_oversized_batches() {
    let client = offline_client();
    let err = client.cancel_orders(&[]).await.unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidParameters(_)));

    let too_many: Vec<i64> = (0..51).collect();
    let err = client.cancel_orders(&too_many).await.unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidParameters(_)));
}

#[tokio::test]
async fn signed_call_without_credentials_fails_fast() {
    let client = offline_client();
    let err = client.get_accounts().await.unwrap_err();
    assert!(matches!(err, ExchangeError::AuthenticationRequired));
}
