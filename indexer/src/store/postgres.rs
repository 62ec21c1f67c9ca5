//! PostgreSQL implementation of the engine's storage ports using SQLx.
//!
//! # Type Conversions
//!
//! PostgreSQL uses signed integers for numeric columns while our domain
//! uses unsigned types. These casts are safe because:
//! - Block numbers won't exceed i64::MAX (~9 quintillion)
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use tracing::{debug, instrument, warn};

use crate::error::{InfraError, Result};
use crate::ports::store::{BlockCursor, CursorStore, ReorgStore};
use crate::types::primitives::{BlockHash, BlockNumber};
use crate::types::reorg::{ReorgStatus, ReorgTicket};

// ═══════════════════════════════════════════════════════════════════════════════
// POSTGRES STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// PostgreSQL-based store implementation of [`CursorStore`] and
/// [`ReorgStore`].
///
/// `versioned_tables` names every handler-owned projection table that
/// carries a `block_number` column, so [`ReorgStore::rewind_to`] can issue
/// the `DELETE WHERE block_number >= fork_height` pass across all of them
/// inside a single transaction (§4.5 step 3). The teacher's rollback
/// hardcoded two tables inline; here the list is supplied at construction
/// time since the set of projection tables is a deployment concern, not
/// something the engine can know statically.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    versioned_tables: Vec<&'static str>,
}

impl PostgresStore {
    /// Create a new store backed by `pool`. `versioned_tables` must list
    /// every projection table a reorg rewind needs to truncate, in
    /// addition to the engine's own `block_cursor`.
    #[must_use]
    pub const fn new(pool: PgPool, versioned_tables: Vec<&'static str>) -> Self {
        Self { pool, versioned_tables }
    }

    /// Reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations.
    ///
    /// # Errors
    /// Returns an error if migrations fail.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| InfraError::Config(format!("migration error: {e}")))?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CURSOR STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(sqlx::FromRow)]
struct CursorRow {
    height: i64,
    hash: Vec<u8>,
    parent_hash: Vec<u8>,
}

impl TryFrom<CursorRow> for BlockCursor {
    type Error = InfraError;

    fn try_from(row: CursorRow) -> std::result::Result<Self, Self::Error> {
        let hash: [u8; 32] = row
            .hash
            .try_into()
            .map_err(|_| InfraError::Decode("invalid hash length in block_cursor row".into()))?;
        let parent_hash: [u8; 32] = row
            .parent_hash
            .try_into()
            .map_err(|_| InfraError::Decode("invalid parent hash length in block_cursor row".into()))?;

        Ok(Self {
            height: BlockNumber::new(row.height as u64),
            hash: BlockHash::new(hash),
            parent_hash: BlockHash::new(parent_hash),
        })
    }
}

#[async_trait]
impl CursorStore for PostgresStore {
    #[instrument(skip(self))]
    async fn get_cursor(&self, chain_id: u64) -> Result<Option<BlockCursor>> {
        let row: Option<CursorRow> = sqlx::query_as(
            "SELECT height, hash, parent_hash FROM block_cursor WHERE chain_id = $1",
        )
        .bind(chain_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(BlockCursor::try_from).transpose().map_err(Into::into)
    }

    #[instrument(skip(self, cursor), fields(height = %cursor.height))]
    async fn set_cursor(&self, chain_id: u64, cursor: BlockCursor) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO block_cursor (chain_id, height, hash, parent_hash, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (chain_id) DO UPDATE SET
                height = EXCLUDED.height,
                hash = EXCLUDED.hash,
                parent_hash = EXCLUDED.parent_hash,
                updated_at = NOW()
            ",
        )
        .bind(chain_id as i64)
        .bind(i64::from(cursor.height))
        .bind(cursor.hash.as_bytes().as_slice())
        .bind(cursor.parent_hash.as_bytes().as_slice())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!("cursor advanced");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REORG STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(sqlx::FromRow)]
struct TicketRow {
    start_height: i64,
    fork_height: Option<i64>,
    detected_at: DateTime<Utc>,
    status: String,
}

impl TryFrom<TicketRow> for ReorgTicket {
    type Error = InfraError;

    fn try_from(row: TicketRow) -> std::result::Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "in_progress" => ReorgStatus::InProgress,
            "done" => ReorgStatus::Done,
            "failed" => ReorgStatus::Failed,
            other => return Err(InfraError::Decode(format!("unknown reorg_tickets.status {other:?}"))),
        };

        Ok(Self {
            start_height: BlockNumber::new(row.start_height as u64),
            fork_height: row.fork_height.map(|h| BlockNumber::new(h as u64)),
            detected_at: row.detected_at,
            status,
        })
    }
}

#[async_trait]
impl ReorgStore for PostgresStore {
    #[instrument(skip(self))]
    async fn active_ticket(&self, chain_id: u64) -> Result<Option<ReorgTicket>> {
        let row: Option<TicketRow> = sqlx::query_as(
            r"
            SELECT start_height, fork_height, detected_at, status
            FROM reorg_tickets
            WHERE chain_id = $1 AND status = 'in_progress'
            ORDER BY detected_at DESC
            LIMIT 1
            ",
        )
        .bind(chain_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(ReorgTicket::try_from).transpose().map_err(Into::into)
    }

    #[instrument(skip(self, ticket), fields(start_height = %ticket.start_height))]
    async fn create_ticket(&self, chain_id: u64, ticket: &ReorgTicket) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO reorg_tickets (chain_id, start_height, fork_height, detected_at, status)
            VALUES ($1, $2, $3, $4, 'in_progress')
            ",
        )
        .bind(chain_id as i64)
        .bind(i64::from(ticket.start_height))
        .bind(ticket.fork_height.map(i64::from))
        .bind(ticket.detected_at)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn fail_ticket(&self, chain_id: u64) -> Result<()> {
        sqlx::query(
            r"
            UPDATE reorg_tickets SET status = 'failed'
            WHERE chain_id = $1 AND status = 'in_progress'
            ",
        )
        .bind(chain_id as i64)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        warn!("reorg ticket marked failed");
        Ok(())
    }

    #[instrument(skip(self), fields(fork_height = %fork_height))]
    async fn rewind_to(
        &self,
        chain_id: u64,
        fork_height: BlockNumber,
        fork_hash: BlockHash,
        fork_parent_hash: BlockHash,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(InfraError::Database)?;

        for table in &self.versioned_tables {
            let query = format!("DELETE FROM {table} WHERE block_number >= $1");
            sqlx::query(&query)
                .bind(i64::from(fork_height))
                .execute(&mut *tx)
                .await
                .map_err(InfraError::Database)?;
        }

        sqlx::query(
            r"
            INSERT INTO block_cursor (chain_id, height, hash, parent_hash, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (chain_id) DO UPDATE SET
                height = EXCLUDED.height,
                hash = EXCLUDED.hash,
                parent_hash = EXCLUDED.parent_hash,
                updated_at = NOW()
            ",
        )
        .bind(chain_id as i64)
        .bind(i64::from(fork_height.prev()))
        .bind(fork_hash.as_bytes().as_slice())
        .bind(fork_parent_hash.as_bytes().as_slice())
        .execute(&mut *tx)
        .await
        .map_err(InfraError::Database)?;

        sqlx::query(
            r"
            UPDATE reorg_tickets SET status = 'done', fork_height = $2
            WHERE chain_id = $1 AND status = 'in_progress'
            ",
        )
        .bind(chain_id as i64)
        .bind(i64::from(fork_height))
        .execute(&mut *tx)
        .await
        .map_err(InfraError::Database)?;

        tx.commit().await.map_err(InfraError::Database)?;

        debug!("reorg rewind committed");
        Ok(())
    }

    #[instrument(skip(self), fields(height = %height))]
    async fn record_block_hash(&self, chain_id: u64, height: BlockNumber, hash: BlockHash, parent_hash: BlockHash) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO block_hash_history (chain_id, height, hash, parent_hash)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (chain_id, height) DO UPDATE SET
                hash = EXCLUDED.hash,
                parent_hash = EXCLUDED.parent_hash
            ",
        )
        .bind(chain_id as i64)
        .bind(i64::from(height))
        .bind(hash.as_bytes().as_slice())
        .bind(parent_hash.as_bytes().as_slice())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self), fields(height = %height))]
    async fn block_hash_at(&self, chain_id: u64, height: BlockNumber) -> Result<Option<BlockHash>> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT hash FROM block_hash_history WHERE chain_id = $1 AND height = $2")
                .bind(chain_id as i64)
                .bind(i64::from(height))
                .fetch_optional(&self.pool)
                .await
                .map_err(InfraError::Database)?;

        row.map(|(bytes,)| {
            let array: [u8; 32] =
                bytes.try_into().map_err(|_| InfraError::Decode("invalid hash length in block_hash_history row".into()))?;
            Ok(BlockHash::new(array))
        })
        .transpose()
    }

    #[instrument(skip(self), fields(height = %height, retain))]
    async fn prune_block_history(&self, chain_id: u64, height: BlockNumber, retain: u64) -> Result<u64> {
        let cutoff = height.get().saturating_sub(retain);
        let result = sqlx::query("DELETE FROM block_hash_history WHERE chain_id = $1 AND height < $2")
            .bind(chain_id as i64)
            .bind(cutoff as i64)
            .execute(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        Ok(result.rows_affected())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_tables_are_stored_verbatim() {
        // Construction alone shouldn't require a live pool; this just
        // documents the field contract without touching sqlx::PgPool,
        // which has no const/default constructor outside a connection.
        let tables: Vec<&'static str> = vec!["proof_sets", "roots", "fault_records"];
        assert_eq!(tables.len(), 3);
    }
}
