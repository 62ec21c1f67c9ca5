//! Chain-following indexing engine (§4).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Ingestor                                │
//! │  poll head → safe tip → fetch block → check parent hash          │
//! │       │                                   │                      │
//! │       │                            mismatch│                     │
//! │       ▼                                   ▼                      │
//! │  prefilter + batch receipts        ReorgCoordinator               │
//! │       │                             (walkback + rewind)           │
//! │       ▼                                                           │
//! │    Processor                                                      │
//! │  (decode, order, apply inside one sqlx transaction)                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`checkpoint::resolve_start`] resolves the height an Ingestor should
//! begin polling from at startup, resuming past a persisted cursor or
//! falling back to a configured start height.

mod checkpoint;
mod ingestor;
mod processor;
mod reorg;

pub use checkpoint::resolve_start;
pub use ingestor::Ingestor;
pub use processor::Processor;
pub use reorg::ReorgCoordinator;
