//! Startup checkpoint resolution (§4.3 step 1, §6 process lifecycle).
//!
//! Simpler than the teacher's `CheckpointState`/`RecoveryMode` pair: the
//! new [`BlockCursor`] already carries height, hash, and parent hash
//! together, so there's no separate "last hash" to reconcile on load.

use tracing::{info, instrument};

use crate::error::{IndexerError, Result};
use crate::ports::store::{BlockCursor, CursorStore};
use crate::types::primitives::BlockNumber;

/// Resolve the height an Ingestor should begin polling from.
///
/// If a cursor was already persisted, resumes one block past it and
/// returns the cursor so the caller can check parent-hash continuity on
/// its first fetch. Otherwise falls back to `configured_start_block`,
/// which must be set for a chain's first run.
///
/// # Errors
/// Returns [`IndexerError::Config`] if no cursor exists and no
/// `start_block` was configured for this chain.
#[instrument(skip(store))]
pub async fn resolve_start<S: CursorStore>(
    store: &S,
    chain_id: u64,
    configured_start_block: Option<u64>,
) -> Result<(BlockNumber, Option<BlockCursor>)> {
    match store.get_cursor(chain_id).await? {
        Some(cursor) => {
            info!(height = %cursor.height, "resuming from persisted cursor");
            Ok((cursor.height.next(), Some(cursor)))
        }
        None => {
            let start = configured_start_block.ok_or_else(|| {
                IndexerError::Config(format!(
                    "chain {chain_id}: no cursor in database and no start_block configured"
                ))
            })?;
            info!(start, "no persisted cursor, starting from configured start_block");
            Ok((BlockNumber::new(start), None))
        }
    }
}
