use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::{BigInt, BigUint};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use model::Address;

use crate::abi::{
    GET_RESERVES_SELECTOR, LATEST_ANSWER_SELECTOR, decode_hex, decode_int256, decode_reserves,
};
use crate::{OracleFeedSource, PoolReserveSource, SourceError};

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorObject>,
}

/// JSON-RPC client answering both price sources with `eth_call`.
#[derive(Clone)]
pub struct RpcClient {
    http: Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(url: String) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// `eth_call` pinned to `block_height`; returns the raw return data.
    #[instrument(skip(self), fields(to = %to), level = "debug")]
    pub async fn eth_call(
        &self,
        to: &Address,
        data: &str,
        block_height: u64,
    ) -> Result<Vec<u8>, SourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "eth_call",
            "params": [
                { "to": to.to_string(), "data": data },
                format!("0x{:x}", block_height),
            ],
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let envelope: RpcResponse = resp.json().await?;
        let out = return_data(envelope)?;

        debug!(bytes = out.len(), "eth_call returned");
        Ok(out)
    }
}

fn return_data(envelope: RpcResponse) -> Result<Vec<u8>, SourceError> {
    if let Some(err) = envelope.error {
        return Err(SourceError::Rpc {
            code: err.code,
            message: err.message,
        });
    }

    let result = envelope
        .result
        .ok_or_else(|| SourceError::InvalidResponse("missing result".into()))?;

    decode_hex(&result)
}

#[async_trait]
impl PoolReserveSource for RpcClient {
    async fn get_reserves(
        &self,
        pair: &Address,
        block_height: u64,
    ) -> Result<(BigUint, BigUint), SourceError> {
        let data = self
            .eth_call(pair, GET_RESERVES_SELECTOR, block_height)
            .await?;
        decode_reserves(&data)
    }
}

#[async_trait]
impl OracleFeedSource for RpcClient {
    async fn latest_answer(&self, feed: &Address, block_height: u64) -> Result<BigInt, SourceError> {
        let data = self
            .eth_call(feed, LATEST_ANSWER_SELECTOR, block_height)
            .await?;
        decode_int256(&data)
    }
}
