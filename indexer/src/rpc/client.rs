//! HTTP JSON-RPC client for the upstream EVM-compatible chain endpoint (§4.1).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::B256;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::error::{Result, RpcError};
use super::types::{JsonRpcRequest, JsonRpcResponse, RawBlock, RawReceipt};

/// Default timeout for requests to the upstream RPC endpoint.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin HTTP JSON-RPC client with batch support.
///
/// Talks directly to the configured endpoint over `reqwest` rather than
/// through `alloy`'s `Provider` abstraction, since the engine needs
/// control over true JSON-RPC batching (one HTTP round trip per polling
/// iteration's worth of `eth_getBlockByNumber` calls, and another per
/// batch of `eth_getTransactionReceipt` calls) and over a Filecoin-specific
/// method (`eth_getMessageCidByTransactionHash`) that `alloy`'s built-in
/// provider does not expose.
#[derive(Debug)]
pub struct RpcClient {
    client: reqwest::Client,
    rpc_url: String,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Create a new client for the given endpoint with the default timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(rpc_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(rpc_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a new client with a custom request timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_timeout(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Connection(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, rpc_url: rpc_url.into(), request_id: AtomicU64::new(1) })
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// `eth_blockNumber` — the chain's current head height.
    ///
    /// # Errors
    /// Returns an error on transport failure or a malformed response.
    #[instrument(skip(self))]
    pub async fn block_number(&self) -> Result<u64> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new("eth_blockNumber", Vec::<()>::new(), id);
        let response: JsonRpcResponse<String> = self.send_request(&request).await?;
        super::types::parse_hex_u64(&response.into_result()?)
    }

    /// `eth_getBlockByNumber(tag, full_tx)`.
    ///
    /// `tag` is either a hex-quantity block number or the string `"latest"`.
    ///
    /// # Errors
    /// Returns an error on transport failure, or `Ok(None)` if the endpoint
    /// reports no block at this height (§8: a null epoch during reorg
    /// walkback, not an error condition).
    #[instrument(skip(self))]
    pub async fn get_block_by_number(&self, tag: &str, full_tx: bool) -> Result<Option<RawBlock>> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new("eth_getBlockByNumber", json!([tag, full_tx]), id);
        let response: JsonRpcResponse<Option<RawBlock>> = self.send_request(&request).await?;
        response.into_result()
    }

    /// `eth_getBlockByNumber(tag, full_tx)`, batched across many tags in a
    /// single HTTP round trip (§4.3 step 5, batch 1).
    ///
    /// Returns blocks in the same order as `tags`; a height with no block
    /// (a null epoch) yields `None` at that position.
    ///
    /// # Errors
    /// Returns an error on transport failure or if the batch response is
    /// misaligned with the request (different length or unmatched ids).
    #[instrument(skip(self, tags), fields(count = tags.len()))]
    pub async fn get_blocks_by_number_batch(&self, tags: &[String], full_tx: bool) -> Result<Vec<Option<RawBlock>>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<JsonRpcRequest<'_, (String, bool)>> = tags
            .iter()
            .map(|tag| {
                let id = self.next_request_id();
                JsonRpcRequest::new("eth_getBlockByNumber", (tag.clone(), full_tx), id)
            })
            .collect();

        let body = self.client.post(&self.rpc_url).json(&requests).send().await?;
        let responses: Vec<JsonRpcResponse<Option<RawBlock>>> = body.json().await?;

        if responses.len() != requests.len() {
            return Err(RpcError::InvalidResponse(format!(
                "batch size mismatch: sent {}, received {}",
                requests.len(),
                responses.len()
            )));
        }

        let mut by_id: std::collections::HashMap<u64, JsonRpcResponse<Option<RawBlock>>> =
            responses.into_iter().map(|r| (r.id, r)).collect();

        requests
            .iter()
            .map(|req| {
                by_id
                    .remove(&req.id)
                    .ok_or_else(|| RpcError::InvalidResponse(format!("missing response for request id {}", req.id)))
                    .and_then(JsonRpcResponse::into_result)
            })
            .collect()
    }

    /// `eth_getTransactionReceipt`, batched across many hashes in a single
    /// HTTP round trip.
    ///
    /// Returns receipts in the same order as `hashes`; a hash the endpoint
    /// has no receipt for (shouldn't happen for a confirmed block, but
    /// defensively handled) yields `None` at that position.
    ///
    /// # Errors
    /// Returns an error on transport failure or if the batch response is
    /// misaligned with the request (different length or unmatched ids).
    #[instrument(skip(self, hashes), fields(count = hashes.len()))]
    pub async fn get_transaction_receipts_batch(&self, hashes: &[B256]) -> Result<Vec<Option<RawReceipt>>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<JsonRpcRequest<'_, [B256; 1]>> = hashes
            .iter()
            .map(|hash| {
                let id = self.next_request_id();
                JsonRpcRequest::new("eth_getTransactionReceipt", [*hash], id)
            })
            .collect();

        let body = self.client.post(&self.rpc_url).json(&requests).send().await?;
        let responses: Vec<JsonRpcResponse<Option<RawReceipt>>> = body.json().await?;

        if responses.len() != requests.len() {
            return Err(RpcError::InvalidResponse(format!(
                "batch size mismatch: sent {}, received {}",
                requests.len(),
                responses.len()
            )));
        }

        let mut by_id: std::collections::HashMap<u64, JsonRpcResponse<Option<RawReceipt>>> =
            responses.into_iter().map(|r| (r.id, r)).collect();

        requests
            .iter()
            .map(|req| {
                by_id
                    .remove(&req.id)
                    .ok_or_else(|| RpcError::InvalidResponse(format!("missing response for request id {}", req.id)))
                    .and_then(JsonRpcResponse::into_result)
            })
            .collect()
    }

    /// `eth_getMessageCidByTransactionHash`, a Filecoin-specific method
    /// that may not exist on a given endpoint (§4.1, §8).
    ///
    /// Returns `Ok(None)` both when the endpoint has no CID for this
    /// transaction and when the method itself is unsupported — callers
    /// that need to distinguish should inspect the underlying error via
    /// [`RpcError::is_method_not_supported`]; the engine treats both cases
    /// identically (the field is simply omitted from projection rows).
    ///
    /// # Errors
    /// Returns an error on transport failure.
    #[instrument(skip(self))]
    pub async fn get_message_cid_by_transaction_hash(&self, hash: B256) -> Result<Option<String>> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new("eth_getMessageCidByTransactionHash", [hash], id);
        match self.send_request::<_, String>(&request).await {
            Ok(response) => match response.into_result() {
                Ok(cid) => Ok(Some(cid)),
                Err(err) if err.is_method_not_supported() => Ok(None),
                Err(err) => Err(err),
            },
            Err(err) if err.is_method_not_supported() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn send_request<P, R>(&self, request: &JsonRpcRequest<'_, P>) -> Result<JsonRpcResponse<R>>
    where
        P: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        debug!(method = request.method, "sending rpc request");
        let response = self.client.post(&self.rpc_url).json(request).send().await?;
        let body: JsonRpcResponse<R> = response.json().await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn client_creation() {
        let client = RpcClient::new("https://example.com/rpc").expect("client creation failed");
        assert_eq!(client.rpc_url(), "https://example.com/rpc");
    }

    #[tokio::test]
    async fn block_number_parses_hex_quantity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0x100"
            })))
            .mount(&server)
            .await;

        let client = RpcClient::new(server.uri()).unwrap();
        assert_eq!(client.block_number().await.unwrap(), 256);
    }

    #[tokio::test]
    async fn get_block_by_number_returns_none_for_null_epoch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": null
            })))
            .mount(&server)
            .await;

        let client = RpcClient::new(server.uri()).unwrap();
        let block = client.get_block_by_number("0x64", true).await.unwrap();
        assert!(block.is_none());
    }

    #[tokio::test]
    async fn get_blocks_by_number_batch_empty_short_circuits() {
        let client = RpcClient::new("https://example.com/rpc").unwrap();
        let blocks = client.get_blocks_by_number_batch(&[], true).await.unwrap();
        assert!(blocks.is_empty());
    }

    #[tokio::test]
    async fn get_blocks_by_number_batch_aligns_results_by_id_and_preserves_null_epochs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {
                        "number": "0x64",
                        "hash": format!("0x{}", "11".repeat(32)),
                        "parentHash": format!("0x{}", "00".repeat(32)),
                        "timestamp": "0x0",
                        "transactions": []
                    }
                },
                {"jsonrpc": "2.0", "id": 2, "result": null}
            ])))
            .mount(&server)
            .await;

        let client = RpcClient::new(server.uri()).unwrap();
        let blocks = client.get_blocks_by_number_batch(&["0x64".to_string(), "0x65".to_string()], true).await.unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].is_some());
        assert!(blocks[1].is_none());
    }

    #[tokio::test]
    async fn get_transaction_receipts_batch_empty_short_circuits() {
        let client = RpcClient::new("https://example.com/rpc").unwrap();
        let receipts = client.get_transaction_receipts_batch(&[]).await.unwrap();
        assert!(receipts.is_empty());
    }

    #[tokio::test]
    async fn method_not_supported_surfaces_as_rpc_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32601, "message": "Method not found"}
            })))
            .mount(&server)
            .await;

        let client = RpcClient::new(server.uri()).unwrap();
        let cid = client.get_message_cid_by_transaction_hash(B256::ZERO).await.unwrap();
        assert!(cid.is_none());
    }
}
