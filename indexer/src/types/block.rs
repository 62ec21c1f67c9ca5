//! In-flight block data as assembled by the Block Ingestor (§4.3).
//!
//! These types live only from fetch to commit; nothing here is persisted
//! directly; handlers turn matched entries into versioned projection rows.

use alloy::primitives::U256;

use super::primitives::{BlockHash, BlockNumber, EthAddress};

/// A log entry that matched the Trigger Registry, enriched with its
/// position within the block for deterministic ordering.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Contract address that emitted the log.
    pub address: EthAddress,
    /// Raw topics, `topics[0]` is the event's topic0 when present.
    pub topics: Vec<BlockHash>,
    /// ABI-encoded, non-indexed event data.
    pub data: Vec<u8>,
    /// Index of this log within the block.
    pub log_index: u64,
    /// Index of the transaction that emitted this log within the block.
    pub transaction_index: u64,
    /// Hash of the transaction that emitted this log.
    pub tx_hash: BlockHash,
    /// True if this log was reported as removed by the upstream RPC
    /// (should never happen under normal polling, see §8 boundary cases).
    pub removed: bool,
}

/// A transaction that matched the Trigger Registry by `(to, selector)`.
#[derive(Debug, Clone)]
pub struct TxEntry {
    /// Transaction hash.
    pub hash: BlockHash,
    /// Sender address.
    pub from: EthAddress,
    /// Recipient address (`None` for contract creation; such transactions
    /// never match a trigger since matching requires a configured `to`).
    pub to: Option<EthAddress>,
    /// Full calldata, ABI-encoded per the matched trigger's signature.
    pub input: Vec<u8>,
    /// Transferred value, preserved at full 256-bit precision.
    pub value: U256,
    /// Index of this transaction within the block.
    pub transaction_index: u64,
    /// Execution status from the transaction's receipt (`true` = success).
    pub status: bool,
    /// Filecoin message CID, when the upstream RPC exposes
    /// `eth_getMessageCidByTransactionHash`; `None` otherwise.
    pub message_cid: Option<String>,
}

/// A fetched block with all matched transactions and logs attached.
///
/// Assembled by the Ingestor's batch fetch (§4.3 step 6) and handed to the
/// Processor in strict height order.
#[derive(Debug, Clone)]
pub struct BlockData {
    /// Block height.
    pub height: BlockNumber,
    /// Block hash.
    pub hash: BlockHash,
    /// Parent block hash, checked against the stored cursor hash before
    /// this block is accepted.
    pub parent_hash: BlockHash,
    /// Unix timestamp of the block.
    pub timestamp: u64,
    /// Transactions matched against the Trigger Registry.
    pub transactions: Vec<TxEntry>,
    /// Logs matched against the Trigger Registry.
    pub logs: Vec<LogEntry>,
}

impl BlockData {
    /// True if this block carries no matched transactions or logs — the
    /// cursor still advances, but no projection rows are inserted (§8
    /// boundary case).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.logs.is_empty()
    }
}
