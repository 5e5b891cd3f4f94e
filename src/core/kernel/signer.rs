use crate::core::errors::ExchangeError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Result type for signing operations: (headers, fully signed parameter set)
pub type SignatureResult = Result<(HashMap<String, String>, Vec<(String, String)>), ExchangeError>;

/// Signer trait for request authentication
///
/// Implementations take the business parameters of a request and return the
/// complete parameter set, including whatever authentication parameters the
/// exchange mandates. Signing is a pure function of its inputs: the timestamp
/// is passed in rather than sampled, so the same inputs always produce the
/// same signature.
pub trait Signer: Send + Sync {
    /// Sign a request and return headers plus the full signed parameter set
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.)
    /// * `host` - Host part of the request URL, without scheme
    /// * `path` - API endpoint path, with leading '/'
    /// * `params` - Business parameters as key-value pairs
    /// * `timestamp` - UTC timestamp to embed in the signature
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        params: &[(String, String)],
        timestamp: DateTime<Utc>,
    ) -> SignatureResult;

    /// Names of parameters that always travel in the query string, even for
    /// signed POST/PUT requests whose remaining parameters go into the body.
    fn uri_param_names(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Percent-encode a string following RFC3986: unreserved characters pass
/// through, everything else becomes `%XX` with uppercase hex. Space encodes
/// as `%20`, never `+`.
///
/// Both the signer and the request assembler use this, so the bytes that are
/// signed are exactly the bytes that go on the wire.
#[must_use]
pub fn percent_encode(input: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                out.push('%');
                out.push(HEX[usize::from(byte >> 4)] as char);
                out.push(HEX[usize::from(byte & 0xf)] as char);
            }
        }
    }
    out
}

/// Build a query string from already-ordered parameters, percent-encoding
/// both keys and values.
#[must_use]
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreserved_characters_pass_through() {
        assert_eq!(percent_encode("abcXYZ019-_.~"), "abcXYZ019-_.~");
    }

    #[test]
    fn reserved_characters_are_escaped_uppercase() {
        assert_eq!(percent_encode("a b"), "a%20b");
        assert_eq!(percent_encode("2019-09-01T18:16:16"), "2019-09-01T18%3A16%3A16");
        assert_eq!(percent_encode("x+/="), "x%2B%2F%3D");
    }

    #[test]
    fn query_encodes_keys_and_values() {
        let params = vec![
            ("account-id".to_string(), "1".to_string()),
            ("type".to_string(), "buy-limit".to_string()),
        ];
        assert_eq!(encode_query(&params), "account-id=1&type=buy-limit");
    }
}
