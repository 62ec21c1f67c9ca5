//! Reference handler for root additions (§3.3, §9 open question).
//!
//! Binds to the function trigger `addRoots(uint256 setId, bytes[]
//! calldata rootData)`. Per §9's decision, this binds to the `rootIds[]`
//! array form: one versioned row is emitted per entry in `rootData`,
//! rather than a single scalar `firstAdded` row.

use alloy::dyn_abi::DynSolValue;
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::{debug, instrument};

use crate::error::{DomainError, InfraError, Result};
use crate::handlers::traits::{FunctionContext, FunctionHandler};

/// Handler bound to the `addRoots` function trigger.
#[derive(Debug, Default)]
pub struct RootsAddedFunctionHandler;

impl RootsAddedFunctionHandler {
    /// Construct the handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FunctionHandler for RootsAddedFunctionHandler {
    #[instrument(skip(self, params, tx), fields(block = %ctx.block_height))]
    async fn handle(&self, ctx: FunctionContext, params: &[DynSolValue], tx: &mut Transaction<'_, Postgres>) -> Result<()> {
        let [set_id, root_data] = params else {
            return Err(invalid_payload(&format!("expected 2 params, got {}", params.len())));
        };

        let set_id = set_id.as_uint().ok_or_else(|| invalid_payload("setId must be uint256"))?.0;
        let root_entries = root_data.as_array().ok_or_else(|| invalid_payload("rootData must be bytes[]"))?;

        // root_id is a persistent counter over every root ever added to this
        // proof set, not the position within this call's array: a second
        // addRoots call in a later block must continue the sequence rather
        // than restarting at 0 and colliding with the first call's ids.
        let (max_root_id,): (Option<i64>,) = sqlx::query_as("SELECT MAX(root_id) FROM roots WHERE proof_set_id = $1")
            .bind(set_id.to_string())
            .fetch_one(&mut **tx)
            .await
            .map_err(InfraError::Database)?;
        let mut root_id = max_root_id.map_or(0, |max| max + 1);

        for entry in root_entries {
            let raw = entry.as_bytes().ok_or_else(|| invalid_payload("rootData entries must be bytes"))?;

            sqlx::query(
                r"
                INSERT INTO roots (proof_set_id, root_id, cid, raw_size, removed, block_number, block_hash)
                VALUES ($1, $2, $3, $4, FALSE, $5, $6)
                ON CONFLICT (proof_set_id, root_id, block_number) DO UPDATE SET
                    cid = EXCLUDED.cid,
                    raw_size = EXCLUDED.raw_size
                ",
            )
            .bind(set_id.to_string())
            .bind(root_id)
            .bind(format!("0x{}", hex::encode(raw)))
            .bind(raw.len() as i64)
            .bind(i64::from(ctx.block_height))
            .bind(ctx.block_hash.to_hex())
            .execute(&mut **tx)
            .await
            .map_err(InfraError::Database)?;

            root_id += 1;
        }

        debug!(set_id = %set_id, count = root_entries.len(), "roots added");
        Ok(())
    }
}

fn invalid_payload(reason: &str) -> crate::error::IndexerError {
    DomainError::InvalidPayload { handler: "RootsAddedFunctionHandler", reason: reason.to_string() }.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RootsAddedFunctionHandler>();
    }
}
