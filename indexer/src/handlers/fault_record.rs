//! Reference handler for fault records (§3.3, §9 open question).
//!
//! Binds to `FaultRecorded(uint256 indexed setId, uint256 indexed
//! periodId, uint256[] rootIds)`. Per §9's decision, faults are recorded
//! per challenge period using an array-of-root-ids column, rather than
//! one row per faulted root, since the source event reports faults in
//! that shape.

use alloy::dyn_abi::DynSolValue;
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::{debug, instrument};

use crate::error::{DomainError, InfraError, Result};
use crate::handlers::traits::{EventContext, EventHandler};

/// Handler bound to the `FaultRecorded` event trigger.
#[derive(Debug, Default)]
pub struct FaultRecordedHandler;

impl FaultRecordedHandler {
    /// Construct the handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventHandler for FaultRecordedHandler {
    #[instrument(skip(self, params, tx), fields(block = %ctx.block_height))]
    async fn handle(&self, ctx: EventContext, params: &[DynSolValue], tx: &mut Transaction<'_, Postgres>) -> Result<()> {
        let [set_id, period_id, root_ids] = params else {
            return Err(invalid_payload(&format!("expected 3 params, got {}", params.len())));
        };

        let set_id = set_id.as_uint().ok_or_else(|| invalid_payload("setId must be uint256"))?.0;
        let period_id = period_id.as_uint().ok_or_else(|| invalid_payload("periodId must be uint256"))?.0;
        let root_ids = root_ids.as_array().ok_or_else(|| invalid_payload("rootIds must be uint256[]"))?;

        let root_ids: Vec<String> = root_ids
            .iter()
            .map(|v| v.as_uint().map(|(n, _)| n.to_string()).ok_or_else(|| invalid_payload("rootIds entries must be uint256")))
            .collect::<Result<_>>()?;

        sqlx::query(
            r"
            INSERT INTO fault_records (proof_set_id, period_id, root_ids, block_number, block_hash)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (proof_set_id, period_id, block_number) DO UPDATE SET
                root_ids = EXCLUDED.root_ids
            ",
        )
        .bind(set_id.to_string())
        .bind(period_id.to_string())
        .bind(&root_ids)
        .bind(i64::from(ctx.block_height))
        .bind(ctx.block_hash.to_hex())
        .execute(&mut **tx)
        .await
        .map_err(InfraError::Database)?;

        debug!(set_id = %set_id, period_id = %period_id, faulted = root_ids.len(), "fault record recorded");
        Ok(())
    }
}

fn invalid_payload(reason: &str) -> crate::error::IndexerError {
    DomainError::InvalidPayload { handler: "FaultRecordedHandler", reason: reason.to_string() }.into()
}
