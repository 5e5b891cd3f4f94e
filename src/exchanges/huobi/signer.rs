use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{encode_query, SignatureResult, Signer};
use chrono::{DateTime, Utc};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_METHOD: &str = "HmacSHA256";
const SIGNATURE_VERSION: &str = "2";

/// The auth parameters that stay in the query string even when the business
/// parameters of a POST travel in the body.
const URI_PARAM_NAMES: &[&str] = &[
    "AccessKeyId",
    "SignatureMethod",
    "SignatureVersion",
    "Timestamp",
    "Signature",
];

/// Signer implementing Huobi's v2 request signature.
///
/// The signature covers a canonical payload of four newline-joined lines:
/// the HTTP method, the lowercase host, the endpoint path, and the query
/// string built from every parameter (auth included) sorted by raw key and
/// percent-encoded. The HMAC-SHA256 digest is base64-encoded and appended as
/// the `Signature` parameter, which itself is never part of the signed bytes.
pub struct HuobiSigner {
    api_key: String,
    secret_key: String,
}

impl HuobiSigner {
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key,
            secret_key,
        }
    }

    fn signature(&self, payload: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ExchangeError::AuthError(format!("Failed to create HMAC: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

/// Build the canonical payload that gets signed. The parameters must already
/// be sorted by raw key.
fn canonical_payload(method: &str, host: &str, path: &str, params: &[(String, String)]) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        method.to_uppercase(),
        host.to_lowercase(),
        path,
        encode_query(params)
    )
}

impl Signer for HuobiSigner {
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        params: &[(String, String)],
        timestamp: DateTime<Utc>,
    ) -> SignatureResult {
        let mut signed: Vec<(String, String)> = params.to_vec();
        signed.push(("AccessKeyId".to_string(), self.api_key.clone()));
        signed.push((
            "SignatureMethod".to_string(),
            SIGNATURE_METHOD.to_string(),
        ));
        signed.push((
            "SignatureVersion".to_string(),
            SIGNATURE_VERSION.to_string(),
        ));
        signed.push((
            "Timestamp".to_string(),
            timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
        ));

        // Sorted by raw key, before percent-encoding
        signed.sort_by(|a, b| a.0.cmp(&b.0));

        let payload = canonical_payload(method, host, path, &signed);
        let signature = self.signature(&payload)?;
        signed.push(("Signature".to_string(), signature));

        Ok((HashMap::new(), signed))
    }

    fn uri_param_names(&self) -> &'static [&'static str] {
        URI_PARAM_NAMES
    }
}
