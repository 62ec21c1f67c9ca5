//! YAML schema for the Trigger Registry's configuration file (§4.2).
//!
//! Deserialized once at startup and resolved into [`super::TriggerRegistry`].

use serde::{Deserialize, Serialize};

/// Top-level trigger configuration file: a flat list of resources, each
/// carrying its own triggers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriggerConfig {
    /// Resources declared in this file, in declaration order (order
    /// matters for wildcard/address-specific tie-breaking, §4.2).
    pub resources: Vec<ResourceConfig>,
}

/// A named contract (or wildcard) that owns one or more triggers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceConfig {
    /// Logical name for this resource, used only for logging and as the
    /// `resource_name` carried on each resolved binding.
    pub name: String,
    /// Contract address this resource is bound to. Omitted or empty
    /// means wildcard: triggers under this resource match any
    /// emitter/recipient (§4.2).
    #[serde(default)]
    pub address: Option<String>,
    /// Event and function triggers owned by this resource.
    pub triggers: Vec<TriggerConfigEntry>,
}

/// Whether a trigger entry matches an event log or a function call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKindConfig {
    /// Matches by `(address, topic0)`.
    Event,
    /// Matches by `(address, selector)`.
    Function,
}

/// A single configured trigger: a signature bound to a handler.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriggerConfigEntry {
    /// `event` or `function`.
    pub kind: TriggerKindConfig,
    /// Solidity-style signature declaration, e.g.
    /// `"ProofSetCreated(uint256 indexed setId, address indexed owner)"`.
    /// Parameter names, `indexed` markers, and `calldata`/`memory`/`storage`
    /// location keywords are stripped during normalization; only the
    /// `indexed` marker is retained, attached to the parsed parameter.
    pub signature: String,
    /// Name of the handler implementation to dispatch matched items to.
    pub handler: String,
}

impl TriggerConfig {
    /// Parse a trigger configuration file from YAML.
    ///
    /// # Errors
    /// Returns an error if the document doesn't match the schema.
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
resources:
  - name: PDPVerifier
    address: "0x1234567890123456789012345678901234567890"
    triggers:
      - kind: event
        signature: "ProofSetCreated(uint256 indexed setId, address indexed owner)"
        handler: ProofSetCreatedHandler
      - kind: event
        signature: "RootsAdded(uint256 indexed setId, uint256[] rootIds)"
        handler: RootsAddedHandler
  - name: AnyContract
    triggers:
      - kind: function
        signature: "proveRoots(uint256 setId, bytes calldata proof)"
        handler: ProveRootsHandler
"#;

    #[test]
    fn parses_sample_config() {
        let config = TriggerConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.resources.len(), 2);
        assert_eq!(config.resources[0].triggers.len(), 2);
        assert!(config.resources[1].address.is_none());
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(TriggerConfig::from_yaml("not: [valid").is_err());
    }
}
