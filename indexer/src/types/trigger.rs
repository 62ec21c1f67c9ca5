//! Trigger Registry configured bindings (§4.2).

use super::primitives::EthAddress;

/// Whether a trigger matches an event log or a transaction's function call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// Matches an event log by `(address, topic0)`.
    Event,
    /// Matches a transaction by `(address, selector)`.
    Function,
}

/// A single signature parameter, as parsed from a trigger's normalized
/// signature string. Handlers use this tree to decode without re-parsing
/// the signature themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParam {
    /// Solidity type name (e.g. `"uint256"`, `"address"`, `"bytes[]"`).
    pub ty: String,
    /// True if this parameter is `indexed` in the original ABI signature
    /// (meaningful only for `TriggerKind::Event`).
    pub indexed: bool,
}

/// An immutable, startup-resolved binding from a configured trigger to the
/// handler that will receive matched items.
#[derive(Debug, Clone)]
pub struct TriggerBinding {
    /// Name of the owning `Resource` entry in the trigger config file.
    pub resource_name: String,
    /// Contract address this binding applies to; `None` means wildcard
    /// (matches any emitter/recipient, §4.2).
    pub address: Option<EthAddress>,
    /// Event vs. function.
    pub kind: TriggerKind,
    /// Normalized signature string, e.g. `"Transfer(address,address,uint256)"`.
    pub signature: String,
    /// `keccak256(signature)` for events, or its first 4 bytes for
    /// functions. Always 32 bytes here; function selectors live in the
    /// first 4.
    pub selector_or_topic0: [u8; 32],
    /// Name of the handler implementation to invoke, resolved against the
    /// handler registry at startup (`IndexerError::HandlerNotFound` if
    /// absent).
    pub handler_name: String,
    /// Parsed parameter list from the signature, in declaration order.
    pub decoded_params: Vec<SignatureParam>,
    /// Order in which this binding was declared in the config file; used
    /// to break ties between a wildcard and an address-specific binding
    /// that both match the same topic0 (§4.2).
    pub declaration_order: usize,
}

impl TriggerBinding {
    /// The 4-byte function selector, valid only for `TriggerKind::Function`
    /// bindings.
    #[must_use]
    pub fn selector(&self) -> [u8; 4] {
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.selector_or_topic0[..4]);
        out
    }

    /// The full 32-byte event topic0, valid only for `TriggerKind::Event`
    /// bindings.
    #[must_use]
    pub const fn topic0(&self) -> [u8; 32] {
        self.selector_or_topic0
    }
}
