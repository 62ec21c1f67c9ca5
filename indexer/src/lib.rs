//! Chain-following indexer for storage-provider (Filecoin PDP) state.
//!
//! Polls an EVM-compatible JSON-RPC endpoint, matches transactions and
//! logs against a declarative Trigger Registry, decodes them at runtime
//! via `alloy`'s `dyn-abi`, and applies the result to a versioned
//! PostgreSQL projection inside one transaction per block. Detects and
//! recovers from chain reorganizations by walking back through recorded
//! block hashes to the fork point and rewinding every versioned table
//! past it.
//!
//! # Architecture
//!
//! The engine follows a hexagonal architecture: the [`indexer`] module
//! drives the loop against the [`ports`] traits, [`store`] supplies the
//! `PostgreSQL` adapter, and [`rpc`] is the only thing that talks to the
//! chain.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         INDEXER CORE                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │   Ingestor   │─▶│  Processor   │─▶│   Handlers   │          │
//! │  │ (poll+match) │  │ (decode+tx)  │  │ (projection) │          │
//! │  └──────────────┘  └──────────────┘  └──────────────┘          │
//! │         │                                                        │
//! │         ▼                                                        │
//! │  ┌──────────────┐                                                │
//! │  │ReorgCoordinator│ ── walkback + atomic rewind                  │
//! │  └──────────────┘                                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`] - Domain primitives and in-flight block/trigger types
//! - [`error`] - Layered error types
//! - [`config`] - Configuration loading and validation
//! - [`registry`] - Trigger Registry (config parsing + resolved lookups)
//! - [`indexer`] - Ingestor, Processor, Reorg Coordinator, checkpoint resolution
//! - [`handlers`] - Handler framework and reference storage-provider handlers
//! - [`store`] - `PostgreSQL` adapter for the engine's own state
//! - [`rpc`] - JSON-RPC client for the upstream chain endpoint
//!
//! # Getting Started
//!
//! ```bash
//! # Set up environment
//! cp .env.example .env
//! # Edit .env with your configuration
//!
//! # Run migrations
//! pdp-indexer migrate
//!
//! # Start the indexer
//! pdp-indexer run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod indexer;
pub mod ports;
pub mod registry;
pub mod rpc;
pub mod store;
pub mod types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}
