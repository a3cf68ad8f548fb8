//! Ethereum JSON-RPC transport and the node-backed [`ChainClient`](crate::ChainClient).

mod client;

pub use client::RpcChainClient;

use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client(timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// Send one JSON-RPC request. A node-side `error` object becomes an `Err`
/// carrying the node's message.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });

    let body: Value = client
        .post(url)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("{} request to {} failed", method, url))?
        .json()
        .await
        .with_context(|| format!("{} response is not JSON", method))?;

    parse_response(method, body)
}

/// Extract the `result` of a JSON-RPC response, surfacing node errors.
fn parse_response<T: DeserializeOwned>(
    method: &str,
    mut response: Value,
) -> Result<T, anyhow::Error> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        anyhow::bail!("RPC error: {}", message);
    }

    let result = response
        .get_mut("result")
        .map(Value::take)
        .with_context(|| format!("{} response has no result", method))?;

    serde_json::from_value(result)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(value: &str) -> Result<u64, anyhow::Error> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .with_context(|| format!("Invalid hex quantity: '{}'", value))
}
