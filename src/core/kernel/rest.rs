use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{encode_query, Signer};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{instrument, trace};

/// REST client trait for making HTTP requests
///
/// Implementations handle authentication and parameter placement; callers
/// supply the endpoint path and a flat set of business parameters.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Make a GET request
    async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        signed: bool,
    ) -> Result<Value, ExchangeError>;

    /// Make a GET request with strongly-typed response
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        signed: bool,
    ) -> Result<T, ExchangeError>;

    /// Make a POST request. For signed requests the parameters are split
    /// between the query string and the body per the exchange's placement
    /// rule; for unsigned requests they all go into a JSON body.
    async fn post(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        signed: bool,
    ) -> Result<Value, ExchangeError>;

    /// Make a POST request with strongly-typed response
    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        signed: bool,
    ) -> Result<T, ExchangeError>;

    /// Make a POST request with an explicit JSON body, for endpoints whose
    /// body is not a flat string map. Signed requests still carry the auth
    /// parameters in the query string.
    async fn post_with_body(
        &self,
        endpoint: &str,
        body: &Value,
        signed: bool,
    ) -> Result<Value, ExchangeError>;
}

/// Serialization format for request bodies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    FormUrlEncoded,
}

/// Where POST/PUT parameters are placed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostParameters {
    InBody,
    InUri,
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API, scheme included, no trailing slash
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
    /// Body serialization format for POST/PUT requests
    pub body_format: BodyFormat,
    /// Placement of POST/PUT parameters
    pub post_parameters: PostParameters,
}

impl RestClientConfig {
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout_seconds: 30,
            user_agent: "huobix/0.1".to_string(),
            body_format: BodyFormat::Json,
            post_parameters: PostParameters::InBody,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Set the body serialization format
    pub fn with_body_format(mut self, body_format: BodyFormat) -> Self {
        self.body_format = body_format;
        self
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
        }
    }

    /// Set the signer for authenticated requests
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| {
                ExchangeError::Other(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(ReqwestRest {
            client,
            config: self.config,
            signer: self.signer,
        })
    }
}

/// A fully assembled outbound request. Immutable once built; the network
/// call happens separately in `execute`.
#[derive(Debug, Clone)]
pub struct AssembledRequest {
    pub method: Method,
    pub url: String,
    /// Query parameters, in final order, not yet percent-encoded
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub headers: Vec<(String, String)>,
}

impl AssembledRequest {
    /// Full URL including the encoded query string
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            self.url.clone()
        } else {
            format!("{}?{}", self.url, encode_query(&self.query))
        }
    }
}

/// Implementation of `RestClient` using reqwest
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

fn host_from_url(base_url: &str) -> &str {
    let without_scheme = base_url
        .strip_prefix("https://")
        .or_else(|| base_url.strip_prefix("http://"))
        .unwrap_or(base_url);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
}

impl ReqwestRest {
    pub fn new(
        base_url: String,
        exchange_name: String,
        signer: Option<Arc<dyn Signer>>,
    ) -> Result<Self, ExchangeError> {
        let config = RestClientConfig::new(base_url, exchange_name);
        let mut builder = RestClientBuilder::new(config);
        if let Some(signer) = signer {
            builder = builder.with_signer(signer);
        }
        builder.build()
    }

    /// Assemble an outbound request, deciding parameter placement.
    ///
    /// Placement rule:
    /// - GET/DELETE, or POST/PUT with `PostParameters::InUri`: every
    ///   parameter (auth and business alike) goes into the query string.
    /// - signed POST/PUT otherwise: only the parameters the signer pins to
    ///   the URI go into the query string; the remaining business parameters
    ///   are serialized as the body. An empty parameter set still produces a
    ///   `{}` body, since some endpoints reject a missing one.
    pub fn assemble(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        signed: bool,
    ) -> Result<AssembledRequest, ExchangeError> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];

        let owned: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();

        let all_params = if signed {
            let signer = self
                .signer
                .as_ref()
                .ok_or(ExchangeError::AuthenticationRequired)?;
            let (auth_headers, signed_params) = signer.sign_request(
                method.as_str(),
                host_from_url(&self.config.base_url),
                endpoint,
                &owned,
                Utc::now(),
            )?;
            headers.extend(auth_headers);
            signed_params
        } else {
            owned
        };

        let params_in_uri = matches!(method, Method::GET | Method::DELETE)
            || self.config.post_parameters == PostParameters::InUri;

        if params_in_uri {
            return Ok(AssembledRequest {
                method,
                url,
                query: all_params,
                body: None,
                headers,
            });
        }

        // POST/PUT with parameters in the body. For signed requests the
        // URI-pinned auth parameters stay in the query string.
        let uri_names: &[&str] = if signed {
            self.signer
                .as_ref()
                .map_or(&[], |s| s.uri_param_names())
        } else {
            &[]
        };

        let (query, body_params): (Vec<_>, Vec<_>) = all_params
            .into_iter()
            .partition(|(k, _)| uri_names.contains(&k.as_str()));

        let (content_type, body) = match self.config.body_format {
            BodyFormat::Json => {
                let object: Map<String, Value> = body_params
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect();
                let bytes = serde_json::to_vec(&Value::Object(object)).map_err(|e| {
                    ExchangeError::SerializationError(format!(
                        "Failed to serialize request body: {}",
                        e
                    ))
                })?;
                ("application/json", bytes)
            }
            BodyFormat::FormUrlEncoded => (
                "application/x-www-form-urlencoded",
                encode_query(&body_params).into_bytes(),
            ),
        };

        headers.push(("Content-Type".to_string(), content_type.to_string()));

        Ok(AssembledRequest {
            method,
            url,
            query,
            body: Some(body),
            headers,
        })
    }

    /// Handle the response and extract JSON
    #[instrument(skip(self, response), fields(exchange = %self.config.exchange_name, status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<Value, ExchangeError> {
        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            ExchangeError::NetworkError(format!("Failed to read response body: {}", e))
        })?;

        trace!("Response body: {}", response_text);

        if status.is_success() {
            serde_json::from_str(&response_text).map_err(|e| {
                ExchangeError::DeserializationError(format!("Failed to parse JSON response: {}", e))
            })
        } else {
            Err(ExchangeError::ApiError {
                code: status.as_u16().to_string(),
                message: response_text,
            })
        }
    }

    /// Send an assembled request over the wire
    #[instrument(skip(self, request), fields(exchange = %self.config.exchange_name, method = %request.method, url = %request.url))]
    pub async fn execute(&self, request: AssembledRequest) -> Result<Value, ExchangeError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.full_url());

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(format!("Request failed: {}", e)))?;

        self.handle_response(response).await
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        signed: bool,
    ) -> Result<Value, ExchangeError> {
        let assembled = self.assemble(method, endpoint, params, signed)?;
        self.execute(assembled).await
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(skip(self, query_params), fields(exchange = %self.config.exchange_name, endpoint = %endpoint, param_count = query_params.len()))]
    async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        signed: bool,
    ) -> Result<Value, ExchangeError> {
        self.request(Method::GET, endpoint, query_params, signed)
            .await
    }

    #[instrument(skip(self, query_params), fields(exchange = %self.config.exchange_name, endpoint = %endpoint, param_count = query_params.len()))]
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        signed: bool,
    ) -> Result<T, ExchangeError> {
        self.request(Method::GET, endpoint, query_params, signed)
            .await
            .and_then(|value| {
                serde_json::from_value(value).map_err(|e| {
                    ExchangeError::DeserializationError(format!(
                        "Failed to deserialize JSON: {}",
                        e
                    ))
                })
            })
    }

    #[instrument(skip(self, params), fields(exchange = %self.config.exchange_name, endpoint = %endpoint, param_count = params.len()))]
    async fn post(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        signed: bool,
    ) -> Result<Value, ExchangeError> {
        self.request(Method::POST, endpoint, params, signed).await
    }

    #[instrument(skip(self, params), fields(exchange = %self.config.exchange_name, endpoint = %endpoint, param_count = params.len()))]
    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        signed: bool,
    ) -> Result<T, ExchangeError> {
        self.request(Method::POST, endpoint, params, signed)
            .await
            .and_then(|value| {
                serde_json::from_value(value).map_err(|e| {
                    ExchangeError::DeserializationError(format!(
                        "Failed to deserialize JSON: {}",
                        e
                    ))
                })
            })
    }

    #[instrument(skip(self, body), fields(exchange = %self.config.exchange_name, endpoint = %endpoint))]
    async fn post_with_body(
        &self,
        endpoint: &str,
        body: &Value,
        signed: bool,
    ) -> Result<Value, ExchangeError> {
        let mut assembled = self.assemble(Method::POST, endpoint, &[], signed)?;
        assembled.body = Some(serde_json::to_vec(body).map_err(|e| {
            ExchangeError::SerializationError(format!("Failed to serialize request body: {}", e))
        })?);
        if !assembled
            .headers
            .iter()
            .any(|(key, _)| key.eq_ignore_ascii_case("content-type"))
        {
            assembled
                .headers
                .push(("Content-Type".to_string(), "application/json".to_string()));
        }
        self.execute(assembled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_strips_scheme_and_path() {
        assert_eq!(host_from_url("https://api.huobi.pro"), "api.huobi.pro");
        assert_eq!(host_from_url("https://api.huobi.pro/v1"), "api.huobi.pro");
        assert_eq!(host_from_url("http://localhost:8080"), "localhost:8080");
    }

    #[test]
    fn signed_request_without_signer_is_rejected() {
        let rest = ReqwestRest::new(
            "https://api.huobi.pro".to_string(),
            "huobi".to_string(),
            None,
        )
        .unwrap();

        let err = rest
            .assemble(Method::GET, "/v1/account/accounts", &[], true)
            .unwrap_err();
        assert!(matches!(err, ExchangeError::AuthenticationRequired));
    }

    #[test]
    fn unsigned_get_puts_params_in_query() {
        let rest = ReqwestRest::new(
            "https://api.huobi.pro".to_string(),
            "huobi".to_string(),
            None,
        )
        .unwrap();

        let request = rest
            .assemble(
                Method::GET,
                "/market/depth",
                &[("symbol", "btcusdt"), ("type", "step0")],
                false,
            )
            .unwrap();

        assert!(request.body.is_none());
        assert_eq!(
            request.full_url(),
            "https://api.huobi.pro/market/depth?symbol=btcusdt&type=step0"
        );
    }
}
