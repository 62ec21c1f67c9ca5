//! Reference handler for proof-set lifecycle events (§3.3, §4.4 demo).
//!
//! Binds to `ProofSetCreated(uint256 indexed setId, address indexed
//! owner)` and maintains the `proof_sets` projection table under the
//! copy-on-update-across-blocks discipline (§3.2): a row for `setId` is
//! inserted once, at the block it was created in, and never revised by
//! this handler again.

use alloy::dyn_abi::DynSolValue;
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::{debug, instrument};

use crate::error::{DomainError, InfraError, Result};
use crate::handlers::traits::{EventContext, EventHandler};

/// Handler bound to the `ProofSetCreated` event trigger.
#[derive(Debug, Default)]
pub struct ProofSetCreatedHandler;

impl ProofSetCreatedHandler {
    /// Construct the handler. Stateless: all persistence goes through the
    /// transaction passed to [`EventHandler::handle`].
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventHandler for ProofSetCreatedHandler {
    #[instrument(skip(self, params, tx), fields(block = %ctx.block_height))]
    async fn handle(&self, ctx: EventContext, params: &[DynSolValue], tx: &mut Transaction<'_, Postgres>) -> Result<()> {
        let [set_id, owner] = params else {
            return Err(DomainError::InvalidPayload {
                handler: "ProofSetCreatedHandler",
                reason: format!("expected 2 params, got {}", params.len()),
            }
            .into());
        };

        let set_id = set_id.as_uint().ok_or_else(|| invalid_payload("setId must be uint256"))?.0;
        let owner = owner.as_address().ok_or_else(|| invalid_payload("owner must be address"))?;

        // `provider_id` isn't carried by this event in the illustrative
        // schema; the reference handler mirrors the owner address until a
        // real deployment's contract supplies a distinct provider id.
        sqlx::query(
            r"
            INSERT INTO proof_sets (id, owner, provider_id, is_active, created_at_block, block_number, block_hash)
            VALUES ($1, $2, $3, TRUE, $4, $4, $5)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(set_id.to_string())
        .bind(owner.to_string())
        .bind(owner.to_string())
        .bind(i64::from(ctx.block_height))
        .bind(ctx.block_hash.to_hex())
        .execute(&mut **tx)
        .await
        .map_err(InfraError::Database)?;

        debug!(set_id = %set_id, "proof set created");
        Ok(())
    }
}

fn invalid_payload(reason: &str) -> crate::error::IndexerError {
    DomainError::InvalidPayload { handler: "ProofSetCreatedHandler", reason: reason.to_string() }.into()
}
