//! Data persistence layer (adapters for store ports).
//!
//! [`PostgresStore`] is the one concrete implementation of
//! [`crate::ports::store::CursorStore`] and
//! [`crate::ports::store::ReorgStore`] — the engine's own state
//! (`block_cursor`, `reorg_tickets`, `block_hash_history`). Handler-owned
//! projection tables (proof sets, roots, fault records, or whatever a
//! deployment's own handlers define) are not behind a port: handlers
//! write to them directly through the `sqlx::Transaction` the Processor
//! hands them, and `PostgresStore` only needs their names, via
//! `versioned_tables`, to truncate them during a reorg rewind.
//!
//! # Usage
//!
//! ```ignore
//! use pdp_indexer::store::PostgresStore;
//! use sqlx::postgres::PgPoolOptions;
//!
//! let pool = PgPoolOptions::new()
//!     .max_connections(10)
//!     .connect("postgres://localhost/pdp_indexer")
//!     .await?;
//!
//! let store = PostgresStore::new(pool, vec!["proof_sets", "roots", "fault_records"]);
//! store.run_migrations().await?;
//! ```
//!
//! # Migrations
//!
//! Migrations are located in `migrations/` and run via the `migrate`
//! subcommand or `sqlx migrate run`.

mod postgres;

pub use postgres::PostgresStore;

// Re-export commonly used types for convenience
pub use sqlx::postgres::PgPool;
