//! Handler trait ports for event and function processing.
//!
//! Unlike the teacher's per-event-type ports (one trait per GHOSTNET
//! contract), these two traits form a single, closed interface that any
//! Trigger Registry binding can dispatch to: `(context, decoded_params)
//! → Result` (§9 "dynamic dispatch"). The [`crate::indexer::Processor`]
//! looks handlers up by name from a [`HandlerRegistry`] built at startup.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::U256;
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use crate::error::{IndexerError, Result};
use crate::types::primitives::{BlockHash, BlockNumber, EthAddress};

/// Everything an event handler needs besides the decoded parameters
/// themselves (§4.4 handler contract).
#[derive(Debug, Clone)]
pub struct EventContext {
    /// Name of the `Resource` entry the matched binding belongs to.
    pub resource_name: String,
    /// Canonical signature, e.g. `"ProofSetCreated(uint256,address)"`.
    pub signature: String,
    /// Contract address that emitted the log.
    pub address: EthAddress,
    /// Index of this log within the block.
    pub log_index: u64,
    /// True if the upstream RPC reported this log as removed.
    pub removed: bool,
    /// Hash of the transaction that emitted this log.
    pub tx_hash: BlockHash,
    /// Index of the transaction that emitted this log within the block.
    pub transaction_index: u64,
    /// Height of the enclosing block.
    pub block_height: BlockNumber,
    /// Hash of the enclosing block.
    pub block_hash: BlockHash,
    /// Unix timestamp of the enclosing block.
    pub block_timestamp: u64,
}

/// Everything a function handler needs besides the decoded parameters.
#[derive(Debug, Clone)]
pub struct FunctionContext {
    /// Name of the `Resource` entry the matched binding belongs to.
    pub resource_name: String,
    /// Canonical signature, e.g. `"addRoots(uint256,bytes[])"`.
    pub signature: String,
    /// Transaction sender.
    pub from: EthAddress,
    /// Transaction recipient (always present — matching a function
    /// trigger requires a concrete `to`).
    pub to: EthAddress,
    /// Transferred value.
    pub value: U256,
    /// Transaction hash.
    pub tx_hash: BlockHash,
    /// Index of this transaction within the block.
    pub transaction_index: u64,
    /// Execution status from the receipt (`true` = success).
    pub status: bool,
    /// Filecoin message CID, when the upstream RPC exposes it.
    pub message_cid: Option<String>,
    /// Height of the enclosing block.
    pub block_height: BlockNumber,
    /// Hash of the enclosing block.
    pub block_hash: BlockHash,
    /// Unix timestamp of the enclosing block.
    pub block_timestamp: u64,
}

/// A handler bound to one or more event triggers.
///
/// Implementations receive a raw `sqlx::Transaction` (the "transactional
/// store handle" of §4.4) rather than a store port: handler-owned
/// projection tables are not constrained to a fixed trait shape.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Apply a matched, decoded event within the block's transaction.
    ///
    /// # Errors
    /// A [`crate::error::DomainError`] fails the whole block (rolled
    /// back, retried after backoff per §4.4).
    async fn handle(&self, ctx: EventContext, params: &[DynSolValue], tx: &mut Transaction<'_, Postgres>) -> Result<()>;
}

/// A handler bound to one or more function (transaction) triggers.
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    /// Apply a matched, decoded transaction within the block's transaction.
    ///
    /// # Errors
    /// A [`crate::error::DomainError`] fails the whole block.
    async fn handle(&self, ctx: FunctionContext, params: &[DynSolValue], tx: &mut Transaction<'_, Postgres>) -> Result<()>;
}

/// Startup-resolved map from `handler_name` (as written in the Trigger
/// Registry config) to the concrete implementation.
///
/// Built once, alongside the [`crate::registry::TriggerRegistry`], and
/// consulted by the Processor for every matched item. A name with no
/// registered implementation is a `ConfigError`, fatal at startup (§4.2).
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    events: HashMap<String, Arc<dyn EventHandler>>,
    functions: HashMap<String, Arc<dyn FunctionHandler>>,
}

impl HandlerRegistry {
    /// An empty registry; handlers are registered via
    /// [`Self::register_event`] / [`Self::register_function`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event handler implementation under `name`.
    pub fn register_event(&mut self, name: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.events.insert(name.into(), handler);
    }

    /// Register a function handler implementation under `name`.
    pub fn register_function(&mut self, name: impl Into<String>, handler: Arc<dyn FunctionHandler>) {
        self.functions.insert(name.into(), handler);
    }

    /// Resolve an event handler by name.
    ///
    /// # Errors
    /// Returns [`IndexerError::HandlerNotFound`] if `name` has no
    /// registered implementation.
    pub fn event(&self, name: &str) -> Result<Arc<dyn EventHandler>> {
        self.events.get(name).cloned().ok_or_else(|| IndexerError::HandlerNotFound(name.to_string()))
    }

    /// Resolve a function handler by name.
    ///
    /// # Errors
    /// Returns [`IndexerError::HandlerNotFound`] if `name` has no
    /// registered implementation.
    pub fn function(&self, name: &str) -> Result<Arc<dyn FunctionHandler>> {
        self.functions.get(name).cloned().ok_or_else(|| IndexerError::HandlerNotFound(name.to_string()))
    }
}
