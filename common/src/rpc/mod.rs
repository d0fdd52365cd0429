//! Minimal JSON-RPC 2.0 client over HTTP.

mod error;

pub use error::*;

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use log::{debug, trace};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::{DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};

pub const JSON_RPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

pub struct JsonRpcClient {
    client: Client,
    url: Url,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: &str) -> Result<Self, RpcError> {
        Self::with_timeout(
            url,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(url: &str, request_timeout: Duration, connection_timeout: Duration) -> Result<Self, RpcError> {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            Url::parse(url)?
        } else {
            Url::parse(&format!("http://{}", url))?
        };

        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connection_timeout)
            .build()?;

        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn get_url(&self) -> &Url {
        &self.url
    }

    async fn request<P: Serialize>(&self, method: &str, params: P) -> Result<Option<Value>, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: JSON_RPC_VERSION,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        if log::log_enabled!(log::Level::Trace) {
            trace!("JSON-RPC request #{} to {}: {}", request.id, self.url, method);
        }

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RpcError::Http(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        let response: JsonRpcResponse = serde_json::from_slice(&body)?;
        if let Some(error) = response.error {
            if log::log_enabled!(log::Level::Debug) {
                debug!("JSON-RPC {} failed with code {}: {}", method, error.code, error.message);
            }
            return Err(RpcError::Server {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result.filter(|value| !value.is_null()))
    }

    // Call a method whose result must be present
    pub async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R, RpcError> {
        let value = self.request(method, params).await?.ok_or(RpcError::NoResult)?;
        Ok(serde_json::from_value(value)?)
    }

    // Call a method that may return null, like eth_getTransactionReceipt for a pending tx
    pub async fn call_optional<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<Option<R>, RpcError> {
        match self.request(method, params).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_without_scheme() {
        let client = JsonRpcClient::new("localhost:8545").unwrap();
        assert_eq!(client.get_url().as_str(), "http://localhost:8545/");
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            JsonRpcClient::new("http://"),
            Err(RpcError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let request = JsonRpcRequest {
            jsonrpc: JSON_RPC_VERSION,
            id: 7,
            method: "eth_accounts",
            params: Vec::<Value>::new(),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"jsonrpc":"2.0","id":7,"method":"eth_accounts","params":[]}"#
        );
    }

    #[test]
    fn test_error_codes() {
        let err = RpcError::Server {
            code: -32601,
            message: "method not found".into(),
        };
        assert_eq!(err.get_code(), -32601);
        assert_eq!(RpcError::NoResult.get_code(), -32603);
    }
}
