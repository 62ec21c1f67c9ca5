//! Configuration loading and validation for the chain-following indexer.
//!
//! Configuration is loaded from multiple sources in order of precedence:
//! 1. Environment variables (`INDEXER__` prefix, double-underscore separator)
//! 2. Environment-specific file (e.g., `development.toml`)
//! 3. Default file (`default.toml`)
//!
//! # Example
//!
//! ```ignore
//! use pdp_indexer::config::Settings;
//!
//! let settings = Settings::load("development")?;
//! println!("chains configured: {}", settings.chains.len());
//! ```

mod settings;

pub use settings::{ChainSettings, DatabaseSettings, LoggingSettings, Settings};
