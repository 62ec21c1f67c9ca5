//! Test fixtures for integration tests.

use sqlx::PgPool;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;

use super::containers::{Postgres, build_connection_string};
use pdp_indexer::store::PostgresStore;

/// Projection tables the reference handlers own, passed to
/// [`PostgresStore::new`] so reorg rewinds truncate them too.
pub const REFERENCE_VERSIONED_TABLES: [&str; 3] = ["proof_sets", "roots", "fault_records"];

/// A test database instance with pool and container.
///
/// The container is kept alive as long as this struct exists. When
/// dropped, the container is automatically stopped.
pub struct TestDb {
    /// The connection pool to the test database.
    pub pool: PgPool,
    /// The `PostgresStore` wrapping the pool.
    pub store: PostgresStore,
    /// The container (kept alive for the duration of the test).
    _container: ContainerAsync<Postgres>,
}

impl TestDb {
    /// Create a new test database with a fresh `PostgreSQL` container and
    /// the reference handlers' projection tables registered as versioned.
    ///
    /// # Panics
    /// Panics if container startup, connection, or migrations fail.
    pub async fn new() -> Self {
        let container = Postgres::default().start().await.expect("failed to start postgres container");

        let host = container.get_host().await.expect("failed to get host");
        let port = container.get_host_port_ipv4(5432).await.expect("failed to get port");

        let connection_string = build_connection_string(&host.to_string(), port);
        let pool = connect_with_retries(&connection_string, 30).await.expect("failed to connect to database");

        let store = PostgresStore::new(pool.clone(), REFERENCE_VERSIONED_TABLES.to_vec());
        store.run_migrations().await.expect("failed to run migrations");

        Self { pool, store, _container: container }
    }
}

/// Connect to the database with retries.
///
/// The container's "ready to accept connections" message can fire a
/// moment before the server actually accepts TCP connections.
async fn connect_with_retries(url: &str, max_attempts: u32) -> Result<PgPool, sqlx::Error> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match PgPool::connect(url).await {
            Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => return Ok(pool),
                Err(e) if attempts < max_attempts => {
                    tracing::debug!("connection verify failed (attempt {attempts}): {e}");
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e),
            },
            Err(e) if attempts < max_attempts => {
                tracing::debug!("connection failed (attempt {attempts}): {e}");
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Raw-SQL fixtures for the reference projection schema (§3.3): a proof
/// set, its roots, and a fault record, inserted directly since the
/// reference handlers own these tables rather than a store port.
pub mod projection_fixtures {
    use sqlx::PgPool;

    /// Insert a proof set row at `block_number`.
    pub async fn insert_proof_set(pool: &PgPool, id: &str, owner: &str, block_number: i64, block_hash: &str) {
        sqlx::query(
            r"
            INSERT INTO proof_sets (id, owner, provider_id, is_active, created_at_block, block_number, block_hash)
            VALUES ($1, $2, $2, TRUE, $3, $3, $4)
            ",
        )
        .bind(id)
        .bind(owner)
        .bind(block_number)
        .bind(block_hash)
        .execute(pool)
        .await
        .expect("insert proof set fixture");
    }

    /// Insert a root row for `proof_set_id` at `block_number`.
    pub async fn insert_root(pool: &PgPool, proof_set_id: &str, root_id: i64, cid: &str, block_number: i64, block_hash: &str) {
        sqlx::query(
            r"
            INSERT INTO roots (proof_set_id, root_id, cid, raw_size, removed, block_number, block_hash)
            VALUES ($1, $2, $3, 0, FALSE, $4, $5)
            ",
        )
        .bind(proof_set_id)
        .bind(root_id)
        .bind(cid)
        .bind(block_number)
        .bind(block_hash)
        .execute(pool)
        .await
        .expect("insert root fixture");
    }

    /// Insert a fault record row for `proof_set_id`/`period_id` at `block_number`.
    pub async fn insert_fault_record(pool: &PgPool, proof_set_id: &str, period_id: &str, root_ids: &[String], block_number: i64, block_hash: &str) {
        sqlx::query(
            r"
            INSERT INTO fault_records (proof_set_id, period_id, root_ids, block_number, block_hash)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(proof_set_id)
        .bind(period_id)
        .bind(root_ids)
        .bind(block_number)
        .bind(block_hash)
        .execute(pool)
        .await
        .expect("insert fault record fixture");
    }

    /// Row count for a table, used to assert rewind truncation.
    pub async fn row_count(pool: &PgPool, table: &str) -> i64 {
        let query = format!("SELECT COUNT(*) FROM {table}");
        let (count,): (i64,) = sqlx::query_as(&query).fetch_one(pool).await.expect("count fixture rows");
        count
    }
}
