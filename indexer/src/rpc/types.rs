//! Wire types for the upstream EVM-compatible JSON-RPC endpoint (§4.1).

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::rpc::error::RpcErrorDetail;

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: P,
    pub id: u64,
}

impl<'a, P: Serialize> JsonRpcRequest<'a, P> {
    pub fn new(method: &'a str, params: P, id: u64) -> Self {
        Self { jsonrpc: "2.0", method, params, id }
    }
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse<T> {
    pub id: u64,
    pub result: Option<T>,
    pub error: Option<RpcErrorDetail>,
}

impl<T> JsonRpcResponse<T> {
    /// Resolve into `Ok(result)` or the wrapped RPC error.
    pub fn into_result(self) -> super::error::Result<T> {
        if let Some(error) = self.error {
            return Err(error.into_error());
        }
        self.result.ok_or_else(|| super::error::RpcError::InvalidResponse("missing result".into()))
    }
}

/// A raw block as returned by `eth_getBlockByNumber(tag, true)` (full
/// transaction objects).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub number: String,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
}

/// A raw transaction embedded in a full block fetch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub input: String,
    #[serde(default)]
    pub value: U256,
    pub transaction_index: Option<String>,
}

/// A raw transaction receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub transaction_hash: B256,
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

/// A raw log entry as returned inside a receipt or by `eth_getLogs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    pub data: String,
    pub log_index: Option<String>,
    pub transaction_index: Option<String>,
    pub transaction_hash: B256,
    #[serde(default)]
    pub removed: bool,
}

/// Parse a hex quantity string (`"0x..."`) into a `u64`, failing on
/// overflow or malformed input (§8 boundary case: arbitrary-precision
/// values that don't fit must go through [`parse_hex_u256`] instead).
///
/// # Errors
/// Returns an error if `s` is not a valid `0x`-prefixed hex integer.
pub fn parse_hex_u64(s: &str) -> super::error::Result<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(|e| super::error::RpcError::InvalidResponse(format!("bad hex quantity {s:?}: {e}")))
}

/// Parse a hex quantity string into a full 256-bit value, used for
/// transaction `value` fields which may exceed `u64` range.
///
/// # Errors
/// Returns an error if `s` is not a valid `0x`-prefixed hex integer.
pub fn parse_hex_u256(s: &str) -> super::error::Result<U256> {
    U256::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| super::error::RpcError::InvalidResponse(format!("bad hex quantity {s:?}: {e}")))
}
