//! Block Ingestor: the per-chain driver loop (§4.3).
//!
//! Polls the chain head, computes a finalization-depth-safe tip, fetches
//! contiguous blocks up to `max_blocks_batch_size` at a time, prefilters
//! them against the Trigger Registry before paying for a receipts batch,
//! checks parent-hash continuity against the stored cursor, and hands
//! each assembled block to the [`Processor`] in strict height order.
//!
//! Unlike the teacher's `RealtimeProcessor`, which subscribes to a
//! streaming source and has no notion of a "safe tip", this Ingestor only
//! ever polls: the upstream endpoint is plain JSON-RPC, so finality is
//! approximated by staying `finalization_depth` blocks behind the
//! reported head.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::B256;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::config::ChainSettings;
use crate::error::{IndexerError, Result};
use crate::ports::clock::Clock;
use crate::ports::store::{BlockCursor, CursorStore, ReorgStore};
use crate::registry::TriggerRegistry;
use crate::rpc::types::parse_hex_u64;
use crate::rpc::{RawBlock, RpcClient};
use crate::types::block::{BlockData, LogEntry, TxEntry};
use crate::types::primitives::{BlockHash, BlockNumber, EthAddress};

use super::checkpoint;
use super::processor::Processor;
use super::reorg::ReorgCoordinator;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const PRUNE_EVERY_N_BLOCKS: u64 = 256;

/// Drives one chain's ingestion loop: fetch, match, decode, apply, advance.
pub struct Ingestor<S, C> {
    chain_id: u64,
    rpc: Arc<RpcClient>,
    store: S,
    registry: Arc<TriggerRegistry>,
    processor: Processor,
    reorg: ReorgCoordinator<S, C>,
    settings: ChainSettings,
}

impl<S, C> Ingestor<S, C>
where
    S: CursorStore + ReorgStore + Clone,
    C: Clock,
{
    /// Build an Ingestor for one chain.
    #[must_use]
    pub fn new(
        rpc: Arc<RpcClient>,
        store: S,
        registry: Arc<TriggerRegistry>,
        processor: Processor,
        settings: ChainSettings,
        clock: C,
    ) -> Self {
        let reorg = ReorgCoordinator::new(store.clone(), Arc::clone(&rpc), clock, settings.max_reorg_depth);
        Self { chain_id: settings.chain_id, rpc, store, registry, processor, reorg, settings }
    }

    /// Run the ingestion loop until a fatal error occurs or `shutdown`
    /// resolves.
    ///
    /// # Errors
    /// Returns the first fatal [`IndexerError`] encountered (per
    /// [`IndexerError::policy`]); transport and lock-contention errors are
    /// retried internally with exponential backoff instead of propagating.
    #[instrument(skip(self, shutdown), fields(chain_id = self.chain_id))]
    pub async fn run(&self, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        let mut backoff = INITIAL_BACKOFF;
        let cap = self.settings.polling_interval();

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("shutdown requested, stopping ingestor");
                    return Err(IndexerError::ShutdownRequested);
                }
                result = self.poll_once() => {
                    match result {
                        Ok(true) => {
                            backoff = INITIAL_BACKOFF;
                        }
                        Ok(false) => {
                            backoff = INITIAL_BACKOFF;
                            sleep(self.settings.polling_interval()).await;
                        }
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => {
                            warn!(%err, backoff_secs = backoff.as_secs(), "ingestion iteration failed, retrying");
                            sleep(backoff).await;
                            backoff = (backoff * 2).min(cap);
                        }
                    }
                }
            }
        }
    }

    /// Run one batch iteration. Returns `Ok(true)` if at least one block
    /// was fetched, `Ok(false)` if the chain hasn't advanced past the
    /// current safe tip.
    async fn poll_once(&self) -> Result<bool> {
        let (start, cursor) = checkpoint::resolve_start(&self.store, self.chain_id, self.settings.start_block).await?;
        let mut last_hash = cursor.map(|c| c.hash);

        let chain_head = self.rpc.block_number().await?;
        let safe_tip = chain_head.saturating_sub(self.settings.finalization_depth);

        if start.get() > safe_tip {
            debug!(next = %start, safe_tip, "caught up to safe tip");
            return Ok(false);
        }

        let batch_end = (start.get() + self.settings.max_blocks_batch_size - 1).min(safe_tip);
        let heights: Vec<u64> = (start.get()..=batch_end).collect();
        let tags: Vec<String> = heights.iter().map(|h| format!("0x{h:x}")).collect();
        let raws = self.rpc.get_blocks_by_number_batch(&tags, true).await?;

        let mut progressed = false;

        for (height, raw) in heights.into_iter().zip(raws) {
            let Some(raw) = raw else {
                debug!(height, "null epoch, skipping");
                continue;
            };

            if let Some(expected_parent) = last_hash {
                let actual_parent = BlockHash::from(raw.parent_hash);
                if expected_parent != actual_parent {
                    warn!(height, "parent hash mismatch, starting reorg recovery");
                    let fork_height = self.reorg.recover(self.chain_id, BlockNumber::new(height)).await?;
                    info!(fork_height = %fork_height, "resuming ingestion past reorg");
                    last_hash = self.store.get_cursor(self.chain_id).await?.map(|c| c.hash);
                    progressed = true;
                    // The rest of this batch was fetched against a chain
                    // view that no longer holds; resume from the fork
                    // point on the next iteration instead of processing it.
                    break;
                }
            }

            let block = self.assemble_block(&raw).await?;
            self.processor.process_block(&block).await?;

            self.store.record_block_hash(self.chain_id, block.height, block.hash, block.parent_hash).await?;
            self.store
                .set_cursor(self.chain_id, BlockCursor { height: block.height, hash: block.hash, parent_hash: block.parent_hash })
                .await?;

            if block.height.get() % PRUNE_EVERY_N_BLOCKS == 0 {
                let pruned = self.store.prune_block_history(self.chain_id, block.height, self.settings.max_reorg_depth).await?;
                if pruned > 0 {
                    debug!(pruned, "pruned stale block hash history");
                }
            }

            last_hash = Some(block.hash);
            progressed = true;
        }

        Ok(progressed)
    }

    async fn assemble_block(&self, raw: &RawBlock) -> Result<BlockData> {
        let height = BlockNumber::new(parse_hex_u64(&raw.number)?);
        let hash = BlockHash::from(raw.hash);
        let parent_hash = BlockHash::from(raw.parent_hash);
        let timestamp = parse_hex_u64(&raw.timestamp)?;

        let prefiltered: Vec<_> = raw
            .transactions
            .iter()
            .filter(|tx| self.registry.might_match(tx.to.map(EthAddress::from)))
            .collect();

        let hashes: Vec<B256> = prefiltered.iter().map(|tx| tx.hash).collect();
        let receipts = self.rpc.get_transaction_receipts_batch(&hashes).await?;

        let mut transactions = Vec::new();
        let mut logs = Vec::new();

        for (tx, receipt) in prefiltered.iter().zip(receipts.iter()) {
            let Some(receipt) = receipt else {
                warn!(hash = %tx.hash, "no receipt for prefiltered transaction, dropping");
                continue;
            };

            let Some(to) = tx.to else { continue };
            let to_addr = EthAddress::from(to);
            let transaction_index = tx.transaction_index.as_deref().map(parse_hex_u64).transpose()?.unwrap_or(0);

            let calldata = hex::decode(tx.input.trim_start_matches("0x")).map_err(|e| {
                IndexerError::Infra(crate::error::InfraError::Decode(format!("bad calldata hex for {:?}: {e}", tx.hash)))
            })?;

            if calldata.len() >= 4 {
                let mut selector = [0u8; 4];
                selector.copy_from_slice(&calldata[..4]);
                if self.registry.match_function(to_addr, selector).is_some() {
                    let message_cid = self.rpc.get_message_cid_by_transaction_hash(tx.hash).await?;

                    transactions.push(TxEntry {
                        hash: BlockHash::from(tx.hash),
                        from: EthAddress::from(tx.from),
                        to: Some(to_addr),
                        input: calldata,
                        value: tx.value,
                        transaction_index,
                        status: receipt.status.as_deref() == Some("0x1"),
                        message_cid,
                    });
                }
            }

            for log in &receipt.logs {
                let Some(&topic0) = log.topics.first() else { continue };
                let address = EthAddress::from(log.address);
                if self.registry.match_event(address, topic0.0).is_some() {
                    let data = hex::decode(log.data.trim_start_matches("0x")).map_err(|e| {
                        IndexerError::Infra(crate::error::InfraError::Decode(format!("bad log data hex: {e}")))
                    })?;
                    let log_index = log.log_index.as_deref().map(parse_hex_u64).transpose()?.unwrap_or(0);
                    logs.push(LogEntry {
                        address,
                        topics: log.topics.iter().map(|t| BlockHash::from(*t)).collect(),
                        data,
                        log_index,
                        transaction_index,
                        tx_hash: BlockHash::from(log.transaction_hash),
                        removed: log.removed,
                    });
                }
            }
        }

        Ok(BlockData { height, hash, parent_hash, timestamp, transactions, logs })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::ports::clock::SystemClock;
    use crate::registry::config::{ResourceConfig, TriggerConfig, TriggerConfigEntry, TriggerKindConfig};
    use crate::types::reorg::ReorgTicket;

    #[derive(Default, Clone)]
    struct FakeStore {
        cursor: Arc<Mutex<Option<BlockCursor>>>,
        hashes: Arc<Mutex<HashMap<u64, BlockHash>>>,
    }

    #[async_trait]
    impl CursorStore for FakeStore {
        async fn get_cursor(&self, _chain_id: u64) -> Result<Option<BlockCursor>> {
            Ok(*self.cursor.lock().unwrap())
        }
        async fn set_cursor(&self, _chain_id: u64, cursor: BlockCursor) -> Result<()> {
            *self.cursor.lock().unwrap() = Some(cursor);
            Ok(())
        }
    }

    #[async_trait]
    impl ReorgStore for FakeStore {
        async fn active_ticket(&self, _chain_id: u64) -> Result<Option<ReorgTicket>> {
            Ok(None)
        }
        async fn create_ticket(&self, _chain_id: u64, _ticket: &ReorgTicket) -> Result<()> {
            Ok(())
        }
        async fn fail_ticket(&self, _chain_id: u64) -> Result<()> {
            Ok(())
        }
        async fn rewind_to(&self, _chain_id: u64, _fork_height: BlockNumber, _hash: BlockHash, _parent: BlockHash) -> Result<()> {
            Ok(())
        }
        async fn record_block_hash(&self, _chain_id: u64, height: BlockNumber, hash: BlockHash, _parent: BlockHash) -> Result<()> {
            self.hashes.lock().unwrap().insert(height.get(), hash);
            Ok(())
        }
        async fn block_hash_at(&self, _chain_id: u64, height: BlockNumber) -> Result<Option<BlockHash>> {
            Ok(self.hashes.lock().unwrap().get(&height.get()).copied())
        }
        async fn prune_block_history(&self, _chain_id: u64, _height: BlockNumber, _retain: u64) -> Result<u64> {
            Ok(0)
        }
    }

    fn sample_settings() -> ChainSettings {
        ChainSettings {
            chain_id: 314,
            rpc_endpoint: "https://example.invalid".into(),
            api_key: None,
            start_block: Some(100),
            finalization_depth: 0,
            polling_interval_seconds: 15,
            max_blocks_batch_size: 10,
            max_reorg_depth: 1000,
            events_file_path: "config/triggers.yaml".into(),
        }
    }

    fn empty_registry() -> Arc<TriggerRegistry> {
        Arc::new(TriggerRegistry::build(&TriggerConfig { resources: vec![] }).unwrap())
    }

    #[test]
    fn might_match_prefilters_unbound_addresses() {
        let config = TriggerConfig {
            resources: vec![ResourceConfig {
                name: "PDPVerifier".into(),
                address: Some("0x1234567890123456789012345678901234567890".into()),
                triggers: vec![TriggerConfigEntry {
                    kind: TriggerKindConfig::Function,
                    signature: "proveRoots(uint256 setId)".into(),
                    handler: "ProveRootsHandler".into(),
                }],
            }],
        };
        let registry = TriggerRegistry::build(&config).unwrap();
        let bound = EthAddress::from_hex("0x1234567890123456789012345678901234567890").unwrap();
        let other = EthAddress::from_hex("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd").unwrap();
        assert!(registry.might_match(Some(bound)));
        assert!(!registry.might_match(Some(other)));
    }

    #[tokio::test]
    async fn ingestor_builds_with_empty_registry() {
        let rpc = Arc::new(RpcClient::new("https://example.invalid").unwrap());
        let store = FakeStore::default();
        let registry = empty_registry();
        let handlers = Arc::new(crate::handlers::HandlerRegistry::new());
        let processor = Processor::new(
            sqlx::PgPool::connect_lazy("postgres://localhost/does-not-matter").unwrap(),
            Arc::clone(&registry),
            handlers,
            1,
        );
        let ingestor = Ingestor::new(rpc, store, registry, processor, sample_settings(), SystemClock);
        assert_eq!(ingestor.chain_id, 314);
    }
}
