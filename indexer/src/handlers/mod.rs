//! Handler framework and reference handlers (§3.3, §4.4, §9).
//!
//! [`traits`] defines the closed handler interface every Trigger Registry
//! binding dispatches to (`EventHandler`/`FunctionHandler`) and the
//! [`HandlerRegistry`] that resolves a binding's `handler_name` to a
//! concrete implementation at startup. [`decode`] turns a matched log or
//! transaction's raw bytes into typed parameters ordered per the
//! binding's signature.
//!
//! The remaining submodules (`proof_set`, `roots`, `fault_record`) are
//! illustrative reference handlers (§3.3) sufficient to exercise the
//! framework end to end; they are not a claim of completeness over the
//! storage-provider domain. A real deployment supplies its own handler
//! crate against the same [`EventHandler`]/[`FunctionHandler`] contract.

mod decode;
mod fault_record;
mod proof_set;
mod roots;
mod traits;

pub use decode::{decode_event_params, decode_function_params};
pub use fault_record::FaultRecordedHandler;
pub use proof_set::ProofSetCreatedHandler;
pub use roots::RootsAddedFunctionHandler;
pub use traits::{EventContext, EventHandler, FunctionContext, FunctionHandler, HandlerRegistry};

/// Build the reference [`HandlerRegistry`] (§3.3's illustrative handlers),
/// keyed by the handler names used in `config/triggers.example.yaml`.
#[must_use]
pub fn reference_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register_event("ProofSetCreatedHandler", std::sync::Arc::new(ProofSetCreatedHandler::new()));
    registry.register_event("FaultRecordedHandler", std::sync::Arc::new(FaultRecordedHandler::new()));
    registry.register_function("RootsAddedFunctionHandler", std::sync::Arc::new(RootsAddedFunctionHandler::new()));
    registry
}
