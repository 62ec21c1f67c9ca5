//! Resolved Trigger Registry: startup-time lookup maps from address/topic0
//! and address/selector to a bound handler (§4.2).

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::config::{TriggerConfig, TriggerKindConfig};
use super::signature::{ParsedSignature, SignatureError};
use crate::types::primitives::{EthAddress, InvalidAddress};
use crate::types::trigger::{TriggerBinding, TriggerKind};

/// Error resolving a parsed [`TriggerConfig`] into a [`TriggerRegistry`].
///
/// Every variant here is fatal at startup (§4.2, §7): a broken trigger
/// config means the engine cannot know what to index.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A trigger's signature failed to parse.
    #[error("resource {resource:?}: {source}")]
    Signature {
        /// Owning resource's name.
        resource: String,
        #[source]
        source: SignatureError,
    },
    /// A resource's configured address was not valid hex.
    #[error("resource {resource:?}: invalid address: {source}")]
    Address {
        /// Owning resource's name.
        resource: String,
        #[source]
        source: InvalidAddress,
    },
    /// Two bindings of the same kind collided on `(address, topic0/selector)`
    /// with the same declaration order is impossible, but two *distinct*
    /// resources can still collide on the exact same address+selector;
    /// this is reported rather than silently shadowed.
    #[error("duplicate {kind:?} binding for address {address:?} and selector {selector}: {first} and {second}")]
    DuplicateBinding {
        /// Kind of the colliding bindings.
        kind: TriggerKind,
        /// Address both bindings are scoped to (`None` for wildcard).
        address: Option<String>,
        /// Hex-encoded topic0/selector both bindings share.
        selector: String,
        /// Handler name of the first-declared binding.
        first: String,
        /// Handler name of the second-declared binding.
        second: String,
    },
}

/// Key used for the event lookup map: `(address, topic0)`. `address` is
/// `None` for wildcard bindings.
type EventKey = (Option<EthAddress>, [u8; 32]);
/// Key used for the function lookup map: `(address, selector)`.
type FnKey = (EthAddress, [u8; 4]);

/// Startup-resolved Trigger Registry.
///
/// Built once from a [`TriggerConfig`] and then immutable for the
/// lifetime of the process; lookups during block processing never
/// mutate it.
#[derive(Debug, Clone)]
pub struct TriggerRegistry {
    events: HashMap<EventKey, TriggerBinding>,
    functions: HashMap<FnKey, TriggerBinding>,
    has_wildcard_event: bool,
    event_addresses: HashSet<EthAddress>,
    function_addresses: HashSet<EthAddress>,
}

impl TriggerRegistry {
    /// Resolve a parsed trigger configuration into lookup-ready bindings.
    ///
    /// # Errors
    /// Returns [`RegistryError`] if any signature fails to parse, any
    /// resource address is malformed, or two bindings collide on the
    /// same `(address, topic0/selector)` pair.
    pub fn build(config: &TriggerConfig) -> Result<Self, RegistryError> {
        let mut events: HashMap<EventKey, TriggerBinding> = HashMap::new();
        let mut functions: HashMap<FnKey, TriggerBinding> = HashMap::new();
        let mut declaration_order = 0usize;

        for resource in &config.resources {
            let address = match &resource.address {
                Some(raw) if !raw.trim().is_empty() => Some(
                    EthAddress::from_hex(raw)
                        .map_err(|source| RegistryError::Address { resource: resource.name.clone(), source })?,
                ),
                _ => None,
            };

            for trigger in &resource.triggers {
                let parsed = ParsedSignature::parse(&trigger.signature)
                    .map_err(|source| RegistryError::Signature { resource: resource.name.clone(), source })?;

                let kind = match trigger.kind {
                    TriggerKindConfig::Event => TriggerKind::Event,
                    TriggerKindConfig::Function => TriggerKind::Function,
                };

                let binding = TriggerBinding {
                    resource_name: resource.name.clone(),
                    address,
                    kind,
                    signature: parsed.canonical(),
                    selector_or_topic0: if kind == TriggerKind::Event { parsed.topic0() } else { parsed.selector_padded() },
                    handler_name: trigger.handler.clone(),
                    decoded_params: parsed.params,
                    declaration_order,
                };
                declaration_order += 1;

                match kind {
                    TriggerKind::Event => {
                        let key = (address, binding.topic0());
                        if let Some(existing) = events.get(&key) {
                            return Err(RegistryError::DuplicateBinding {
                                kind,
                                address: address.map(|a| a.to_hex()),
                                selector: hex::encode(binding.topic0()),
                                first: existing.handler_name.clone(),
                                second: binding.handler_name,
                            });
                        }
                        events.insert(key, binding);
                    }
                    TriggerKind::Function => {
                        let Some(address) = address else {
                            return Err(RegistryError::Address {
                                resource: resource.name.clone(),
                                source: InvalidAddress::WrongLength(0),
                            });
                        };
                        let key = (address, binding.selector());
                        if let Some(existing) = functions.get(&key) {
                            return Err(RegistryError::DuplicateBinding {
                                kind,
                                address: Some(address.to_hex()),
                                selector: hex::encode(binding.selector()),
                                first: existing.handler_name.clone(),
                                second: binding.handler_name,
                            });
                        }
                        functions.insert(key, binding);
                    }
                }
            }
        }

        let has_wildcard_event = events.keys().any(|(address, _)| address.is_none());
        let event_addresses = events.keys().filter_map(|(address, _)| *address).collect();
        let function_addresses = functions.keys().map(|(address, _)| *address).collect();

        Ok(Self { events, functions, has_wildcard_event, event_addresses, function_addresses })
    }

    /// Resolve an event log's `(address, topic0)` to its bound handler,
    /// preferring an address-specific binding over a wildcard one
    /// (§4.2 matching rules).
    #[must_use]
    pub fn match_event(&self, address: EthAddress, topic0: [u8; 32]) -> Option<&TriggerBinding> {
        self.events.get(&(Some(address), topic0)).or_else(|| self.events.get(&(None, topic0)))
    }

    /// Resolve a transaction's `(to, selector)` to its bound handler.
    /// Transactions with no `to` (contract creation) never match.
    #[must_use]
    pub fn match_function(&self, address: EthAddress, selector: [u8; 4]) -> Option<&TriggerBinding> {
        self.functions.get(&(address, selector))
    }

    /// Total number of resolved bindings, for startup logging.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.events.len() + self.functions.len()
    }

    /// Whether a transaction sent to `to` could plausibly carry a matched
    /// log or be a matched function call, used by the Ingestor's
    /// bloom-filter-style prefilter (§4.3 step 5, batch 2) to decide
    /// whether its receipt is worth fetching.
    ///
    /// A wildcard event binding makes every transaction's receipt worth
    /// checking, since its logs could originate from any contract address
    /// touched during execution, not just `to`.
    #[must_use]
    pub fn might_match(&self, to: Option<EthAddress>) -> bool {
        if self.has_wildcard_event {
            return true;
        }
        let Some(to) = to else { return false };
        self.event_addresses.contains(&to) || self.function_addresses.contains(&to)
    }
}
