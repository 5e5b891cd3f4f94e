use crate::core::{errors::ExchangeError, kernel::RestClient, traits::AccountInfo, types::Balance};
use crate::exchanges::huobi::converters::convert_balances;
use crate::exchanges::huobi::rest::HuobiRestClient;
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::instrument;

/// Resolves the working spot account id for a key, caching it after the
/// first lookup. The id never changes for a key, so one resolver instance
/// serves all callers that share it.
pub(crate) struct SpotAccountResolver {
    cached: Mutex<Option<i64>>,
}

impl SpotAccountResolver {
    pub(crate) fn new() -> Self {
        Self {
            cached: Mutex::new(None),
        }
    }

    pub(crate) async fn resolve<R: RestClient>(
        &self,
        rest: &HuobiRestClient<R>,
    ) -> Result<i64, ExchangeError> {
        if let Ok(cached) = self.cached.lock() {
            if let Some(id) = *cached {
                return Ok(id);
            }
        }

        let accounts = rest.get_accounts().await?;
        let id = accounts
            .iter()
            .find(|account| account.account_type == "spot" && account.state == "working")
            .map(|account| account.id)
            .ok_or_else(|| {
                ExchangeError::InvalidParameters("No working spot account found".to_string())
            })?;

        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some(id);
        }
        Ok(id)
    }
}

/// Account implementation for Huobi
pub struct Account<R: RestClient> {
    rest: HuobiRestClient<R>,
    account_id: SpotAccountResolver,
}

impl<R: RestClient> Account<R> {
    /// Create a new account manager
    pub fn new(rest: &R) -> Self
    where
        R: Clone,
    {
        Self {
            rest: HuobiRestClient::new(rest.clone()),
            account_id: SpotAccountResolver::new(),
        }
    }

    /// The spot account id used for balance and order operations
    pub async fn spot_account_id(&self) -> Result<i64, ExchangeError> {
        self.account_id.resolve(&self.rest).await
    }
}

#[async_trait]
impl<R: RestClient> AccountInfo for Account<R> {
    #[instrument(skip(self), fields(exchange = "huobi"))]
    async fn get_account_balance(&self) -> Result<Vec<Balance>, ExchangeError> {
        let account_id = self.spot_account_id().await?;
        let balances = self.rest.get_balances(account_id).await?;

        let non_zero = convert_balances(&balances)
            .into_iter()
            .filter(|balance| !balance.free.is_zero() || !balance.locked.is_zero())
            .collect();

        Ok(non_zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRest {
        accounts: Value,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RestClient for CountingRest {
        async fn get(
            &self,
            _endpoint: &str,
            _query_params: &[(&str, &str)],
            _signed: bool,
        ) -> Result<Value, ExchangeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"status": "ok", "data": self.accounts}))
        }

        async fn get_json<T: DeserializeOwned>(
            &self,
            endpoint: &str,
            query_params: &[(&str, &str)],
            signed: bool,
        ) -> Result<T, ExchangeError> {
            let value = self.get(endpoint, query_params, signed).await?;
            serde_json::from_value(value)
                .map_err(|e| ExchangeError::DeserializationError(e.to_string()))
        }

        async fn post(
            &self,
            _endpoint: &str,
            _params: &[(&str, &str)],
            _signed: bool,
        ) -> Result<Value, ExchangeError> {
            unimplemented!("not used by these tests")
        }

        async fn post_json<T: DeserializeOwned>(
            &self,
            _endpoint: &str,
            _params: &[(&str, &str)],
            _signed: bool,
        ) -> Result<T, ExchangeError> {
            unimplemented!("not used by these tests")
        }

        async fn post_with_body(
            &self,
            _endpoint: &str,
            _body: &Value,
            _signed: bool,
        ) -> Result<Value, ExchangeError> {
            unimplemented!("not used by these tests")
        }
    }

    fn rest_with(accounts: Value) -> HuobiRestClient<CountingRest> {
        HuobiRestClient::new(CountingRest {
            accounts,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn resolver_fetches_once_and_caches_the_id() {
        let rest = rest_with(json!([
            {"id": 7, "type": "margin", "state": "working"},
            {"id": 12, "type": "spot", "state": "working"}
        ]));
        let resolver = SpotAccountResolver::new();

        assert_eq!(resolver.resolve(&rest).await.unwrap(), 12);
        assert_eq!(resolver.resolve(&rest).await.unwrap(), 12);
        assert_eq!(rest.rest().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolver_skips_locked_spot_accounts() {
        let rest = rest_with(json!([
            {"id": 3, "type": "spot", "state": "lock"}
        ]));
        let resolver = SpotAccountResolver::new();

        let err = resolver.resolve(&rest).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidParameters(_)));
        // A failed lookup is not cached
        assert_eq!(rest.rest().calls.load(Ordering::SeqCst), 1);
        let _ = resolver.resolve(&rest).await;
        assert_eq!(rest.rest().calls.load(Ordering::SeqCst), 2);
    }
}
