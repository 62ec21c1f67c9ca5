//! JSON-RPC client for the upstream EVM-compatible chain endpoint (§4.1).

pub mod client;
pub mod error;
pub mod types;

pub use client::RpcClient;
pub use error::{Result, RpcError};
pub use types::{RawBlock, RawLog, RawReceipt, RawTransaction};
