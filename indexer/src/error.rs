//! Layered error hierarchy for the indexing engine.
//!
//! Errors are split the way the rest of this codebase splits them: domain
//! errors (handler-level business rule violations), infrastructure errors
//! (RPC/database/decoding failures), and a top-level [`IndexerError`] that
//! every public API returns. [`ErrorPolicy`] is the single place that maps
//! an error onto the retry/skip/fatal behavior described for each error
//! kind.

use thiserror::Error;

/// Result type alias using [`IndexerError`].
pub type Result<T> = std::result::Result<T, IndexerError>;

/// How the caller should react to a given error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Retry with exponential backoff, indefinitely.
    RetryIndefinitely,
    /// Drop the offending item and continue.
    SkipItem,
    /// Roll back the current block transaction and retry the whole block.
    RetryBlock,
    /// Unrecoverable: log and exit the process.
    Fatal,
}

/// Business-rule violations raised by handlers.
///
/// These are domain concerns, not infrastructure failures: the RPC call
/// and the database write both succeeded, but the handler determined the
/// event cannot be applied.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// A handler referenced a logical key that does not exist in the
    /// projection (e.g. a root addition for an unknown proof set).
    #[error("unknown {entity} referenced by key {key}")]
    UnknownEntity {
        /// Kind of entity that was missing (e.g. `"proof_set"`).
        entity: &'static str,
        /// The logical key that could not be resolved.
        key: String,
    },

    /// A handler rejected the decoded parameters as structurally invalid
    /// for its domain (distinct from [`InfraError::Decode`], which covers
    /// ABI-level decode failures before the handler ever sees the value).
    #[error("invalid event payload for {handler}: {reason}")]
    InvalidPayload {
        /// Name of the handler that rejected the payload.
        handler: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

/// Infrastructure-level failures: RPC, database, decoding, configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// Upstream JSON-RPC failure. Wraps [`crate::rpc::RpcError`].
    #[error(transparent)]
    Rpc(#[from] crate::rpc::RpcError),

    /// Database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// ABI/hex decoding failure for a matched log or transaction.
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration could not be parsed or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Top-level error type returned by the engine's public API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IndexerError {
    /// A handler raised a domain error; the enclosing block is rolled back.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// An infrastructure operation failed.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// Reorg walkback exceeded `max_reorg_depth`.
    #[error("reorg too deep: walked back {depth} blocks, max is {max}")]
    ReorgTooDeep {
        /// Number of blocks walked back before giving up.
        depth: u64,
        /// Configured maximum.
        max: u64,
    },

    /// A reorg was already in progress and the existing ticket is not stale.
    #[error("reorg already in progress")]
    ReorgLockContention,

    /// Configuration failed validation at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A trigger referenced a handler name with no registered implementation.
    #[error("no handler registered for name {0:?}")]
    HandlerNotFound(String),

    /// Cooperative shutdown was requested (SIGINT/SIGTERM).
    #[error("shutdown requested")]
    ShutdownRequested,
}

impl From<sqlx::Error> for IndexerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Infra(InfraError::Database(err))
    }
}

impl From<crate::rpc::RpcError> for IndexerError {
    fn from(err: crate::rpc::RpcError) -> Self {
        Self::Infra(InfraError::Rpc(err))
    }
}

impl IndexerError {
    /// How this error should be handled by its caller, per the error
    /// kind/policy table in the engine's error handling design.
    #[must_use]
    pub const fn policy(&self) -> ErrorPolicy {
        match self {
            Self::Infra(InfraError::Rpc(rpc_err)) => rpc_err.policy(),
            Self::Infra(InfraError::Decode(_)) => ErrorPolicy::SkipItem,
            Self::Infra(InfraError::Config(_)) | Self::Config(_) | Self::HandlerNotFound(_) => {
                ErrorPolicy::Fatal
            }
            Self::Infra(InfraError::Database(_)) => ErrorPolicy::Fatal,
            Self::Domain(_) => ErrorPolicy::RetryBlock,
            Self::ReorgTooDeep { .. } => ErrorPolicy::Fatal,
            Self::ReorgLockContention => ErrorPolicy::RetryIndefinitely,
            Self::ShutdownRequested => ErrorPolicy::Fatal,
        }
    }

    /// True if the process should exit non-zero after logging this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.policy(), ErrorPolicy::Fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcError;

    #[test]
    fn reorg_too_deep_is_fatal() {
        let err = IndexerError::ReorgTooDeep { depth: 1200, max: 1000 };
        assert_eq!(err.policy(), ErrorPolicy::Fatal);
        assert!(err.is_fatal());
    }

    #[test]
    fn lock_contention_retries() {
        let err = IndexerError::ReorgLockContention;
        assert_eq!(err.policy(), ErrorPolicy::RetryIndefinitely);
        assert!(!err.is_fatal());
    }

    #[test]
    fn domain_error_retries_block() {
        let err: IndexerError = DomainError::UnknownEntity { entity: "proof_set", key: "7".into() }.into();
        assert_eq!(err.policy(), ErrorPolicy::RetryBlock);
    }

    #[test]
    fn transport_error_propagates_rpc_policy() {
        let err: IndexerError = RpcError::Timeout.into();
        assert_eq!(err.policy(), ErrorPolicy::RetryIndefinitely);
    }
}
