//! Per-block transactional processing (§4.4).
//!
//! One `sqlx::Transaction` per block. Matched transactions and logs are
//! resolved against the Trigger Registry and decoded concurrently across
//! a bounded worker pool, then applied to their handlers in strict
//! `(transaction_index, log_index)` order inside that single transaction.
//! A handler error rolls back the whole block (`RetryBlock`); a decode
//! error only drops the offending item (`SkipItem`), per the error policy
//! table.

use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use futures::stream::{self, StreamExt};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{instrument, warn};

use crate::error::{InfraError, Result};
use crate::handlers::{EventContext, FunctionContext, HandlerRegistry, decode_event_params, decode_function_params};
use crate::registry::TriggerRegistry;
use crate::types::block::{BlockData, LogEntry, TxEntry};
use crate::types::trigger::TriggerBinding;

enum MatchedItem<'a> {
    Tx(&'a TxEntry),
    Log(&'a LogEntry),
}

struct Decoded<'a> {
    item: MatchedItem<'a>,
    binding: TriggerBinding,
    params: Vec<DynSolValue>,
}

/// Applies matched items from one fetched block inside a single database
/// transaction.
#[derive(Clone)]
pub struct Processor {
    pool: PgPool,
    registry: Arc<TriggerRegistry>,
    handlers: Arc<HandlerRegistry>,
    worker_pool_size: usize,
}

impl Processor {
    /// Build a processor bound to one chain's database pool, resolved
    /// Trigger Registry, and handler registry.
    #[must_use]
    pub const fn new(pool: PgPool, registry: Arc<TriggerRegistry>, handlers: Arc<HandlerRegistry>, worker_pool_size: usize) -> Self {
        Self { pool, registry, handlers, worker_pool_size }
    }

    /// Process one fetched block: decode its matched items concurrently,
    /// then apply them to their handlers, in order, inside one
    /// transaction.
    ///
    /// A block with no matched transactions or logs is a no-op; the
    /// caller still advances the cursor past it.
    ///
    /// # Errors
    /// Returns a [`crate::error::DomainError`] if a handler rejects its
    /// input — the transaction is rolled back before the error reaches
    /// the caller — or an [`InfraError`] on a database failure.
    #[instrument(skip(self, block), fields(height = %block.height, txs = block.transactions.len(), logs = block.logs.len()))]
    pub async fn process_block(&self, block: &BlockData) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }

        let mut items: Vec<MatchedItem<'_>> = Vec::with_capacity(block.transactions.len() + block.logs.len());
        items.extend(block.transactions.iter().map(MatchedItem::Tx));
        items.extend(block.logs.iter().map(MatchedItem::Log));
        items.sort_by_key(|item| match item {
            MatchedItem::Tx(tx) => (tx.transaction_index, 0u64),
            MatchedItem::Log(log) => (log.transaction_index, log.log_index + 1),
        });

        let decoded: Vec<Option<Decoded<'_>>> = stream::iter(items)
            .map(|item| async move { self.decode_item(item) })
            .buffered(self.worker_pool_size.max(1))
            .collect()
            .await;

        let mut tx = self.pool.begin().await.map_err(InfraError::Database)?;

        for entry in decoded.into_iter().flatten() {
            self.apply(&entry, block, &mut tx).await?;
        }

        tx.commit().await.map_err(InfraError::Database)?;
        Ok(())
    }

    fn decode_item<'a>(&self, item: MatchedItem<'a>) -> Option<Decoded<'a>> {
        match item {
            MatchedItem::Tx(entry) => {
                let to = entry.to?;
                if entry.input.len() < 4 {
                    warn!(hash = %entry.hash, "dropping transaction: calldata shorter than a selector");
                    return None;
                }
                let mut selector = [0u8; 4];
                selector.copy_from_slice(&entry.input[..4]);
                let binding = self.registry.match_function(to, selector)?.clone();
                match decode_function_params(&binding, &entry.input[4..]) {
                    Ok(params) => Some(Decoded { item: MatchedItem::Tx(entry), binding, params }),
                    Err(err) => {
                        warn!(hash = %entry.hash, %err, "dropping transaction: decode failed");
                        None
                    }
                }
            }
            MatchedItem::Log(entry) => {
                let topic0 = *entry.topics.first()?.as_bytes();
                let binding = self.registry.match_event(entry.address, topic0)?.clone();
                match decode_event_params(&binding, entry) {
                    Ok(params) => Some(Decoded { item: MatchedItem::Log(entry), binding, params }),
                    Err(err) => {
                        warn!(tx_hash = %entry.tx_hash, %err, "dropping log: decode failed");
                        None
                    }
                }
            }
        }
    }

    async fn apply(&self, decoded: &Decoded<'_>, block: &BlockData, tx: &mut Transaction<'_, Postgres>) -> Result<()> {
        match decoded.item {
            MatchedItem::Tx(entry) => {
                let handler = self.handlers.function(&decoded.binding.handler_name)?;
                // `to` is always Some here: decode_item only builds a Tx
                // Decoded entry after resolving a function binding, which
                // requires a concrete `to`.
                let ctx = FunctionContext {
                    resource_name: decoded.binding.resource_name.clone(),
                    signature: decoded.binding.signature.clone(),
                    from: entry.from,
                    to: entry.to.expect("matched function trigger always has a concrete `to`"),
                    value: entry.value,
                    tx_hash: entry.hash,
                    transaction_index: entry.transaction_index,
                    status: entry.status,
                    message_cid: entry.message_cid.clone(),
                    block_height: block.height,
                    block_hash: block.hash,
                    block_timestamp: block.timestamp,
                };
                handler.handle(ctx, &decoded.params, tx).await
            }
            MatchedItem::Log(entry) => {
                let handler = self.handlers.event(&decoded.binding.handler_name)?;
                let ctx = EventContext {
                    resource_name: decoded.binding.resource_name.clone(),
                    signature: decoded.binding.signature.clone(),
                    address: entry.address,
                    log_index: entry.log_index,
                    removed: entry.removed,
                    tx_hash: entry.tx_hash,
                    transaction_index: entry.transaction_index,
                    block_height: block.height,
                    block_hash: block.hash,
                    block_timestamp: block.timestamp,
                };
                handler.handle(ctx, &decoded.params, tx).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::config::{ResourceConfig, TriggerConfig, TriggerConfigEntry, TriggerKindConfig};
    use crate::types::primitives::{BlockHash, EthAddress};

    fn sample_hash(byte: u8) -> BlockHash {
        BlockHash::new([byte; 32])
    }

    fn build_registry() -> Arc<TriggerRegistry> {
        let config = TriggerConfig {
            resources: vec![ResourceConfig {
                name: "PDPVerifier".into(),
                address: Some("0x1234567890123456789012345678901234567890".into()),
                triggers: vec![TriggerConfigEntry {
                    kind: TriggerKindConfig::Event,
                    signature: "ProofSetCreated(uint256 indexed setId, address indexed owner)".into(),
                    handler: "ProofSetCreatedHandler".into(),
                }],
            }],
        };
        Arc::new(TriggerRegistry::build(&config).unwrap())
    }

    #[test]
    fn items_sort_deterministically_txs_before_logs_in_same_slot() {
        let tx = TxEntry {
            hash: sample_hash(1),
            from: EthAddress::ZERO,
            to: Some(EthAddress::ZERO),
            input: vec![0; 4],
            value: alloy::primitives::U256::ZERO,
            transaction_index: 0,
            status: true,
            message_cid: None,
        };
        let log = LogEntry {
            address: EthAddress::ZERO,
            topics: vec![sample_hash(2)],
            data: vec![],
            log_index: 0,
            transaction_index: 0,
            tx_hash: sample_hash(1),
            removed: false,
        };

        let mut items: Vec<MatchedItem<'_>> = vec![MatchedItem::Log(&log), MatchedItem::Tx(&tx)];
        items.sort_by_key(|item| match item {
            MatchedItem::Tx(tx) => (tx.transaction_index, 0u64),
            MatchedItem::Log(log) => (log.transaction_index, log.log_index + 1),
        });

        assert!(matches!(items[0], MatchedItem::Tx(_)));
        assert!(matches!(items[1], MatchedItem::Log(_)));
    }

    #[test]
    fn builds_registry_for_grounding() {
        let registry = build_registry();
        assert_eq!(registry.binding_count(), 1);
    }
}
