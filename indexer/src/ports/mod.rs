//! Port definitions for dependency injection and testability.
//!
//! Ports are trait definitions that describe what the engine needs from
//! infrastructure. Following hexagonal architecture, adapters (in
//! [`crate::store`]) implement these traits to provide concrete
//! functionality.
//!
//! # Port Categories
//!
//! | Category | Ports | Purpose |
//! |----------|-------|---------|
//! | Storage | [`CursorStore`], [`ReorgStore`] | Engine-owned persisted state |
//! | Time | [`Clock`] | Testable time operations |
//!
//! Handler-owned projection tables are not behind a port: the Processor
//! hands matched items a raw `sqlx::Transaction` directly (§4.4), so
//! handlers are free to define whatever schema their domain needs
//! without a trait-shaped bottleneck.

pub mod clock;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use store::{BlockCursor, CursorStore, ReorgStore};

#[cfg(any(test, feature = "test-utils"))]
pub use clock::FakeClock;
