//! Signature normalization and topic0/selector computation (§4.2).
//!
//! Trigger signatures are authored the way Solidity event/function
//! declarations read (`"uint256 indexed setId, address indexed owner"`),
//! not as pre-stripped type lists. Parsing here strips parameter names,
//! the `indexed` marker, and the `calldata`/`memory`/`storage` location
//! keywords, leaving the canonical `Name(type,type,...)` form that gets
//! hashed.

use alloy::primitives::keccak256;

use crate::types::trigger::SignatureParam;

/// A signature parsed out of its declaration, carrying both the
/// canonical type list (for hashing) and each parameter's `indexed`
/// flag (for event decoding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignature {
    /// Event or function name, e.g. `"Transfer"`.
    pub name: String,
    /// Parsed parameters in declaration order.
    pub params: Vec<SignatureParam>,
}

/// Error parsing a trigger signature string.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// The signature string has no `(...)` parameter list.
    #[error("signature {0:?} is missing a parameter list")]
    MissingParens(String),
    /// The signature string's parameter list was not properly closed.
    #[error("signature {0:?} has an unbalanced parameter list")]
    Unbalanced(String),
    /// A parameter declaration had no type token at all.
    #[error("signature {0:?} has an empty parameter declaration")]
    EmptyParam(String),
}

const LOCATION_KEYWORDS: [&str; 3] = ["calldata", "memory", "storage"];

impl ParsedSignature {
    /// Parse a Solidity-style signature declaration such as
    /// `"ProofSetCreated(uint256 indexed setId, address indexed owner)"`.
    ///
    /// # Errors
    /// Returns [`SignatureError`] if the string isn't `name(param, ...)`
    /// or a parameter declaration has no type.
    pub fn parse(signature: &str) -> Result<Self, SignatureError> {
        let open = signature.find('(').ok_or_else(|| SignatureError::MissingParens(signature.to_string()))?;
        if !signature.trim_end().ends_with(')') {
            return Err(SignatureError::Unbalanced(signature.to_string()));
        }
        let name = signature[..open].trim().to_string();
        let close = signature.rfind(')').expect("checked ends_with above");
        let inner = &signature[open + 1..close];

        let params = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(|raw| parse_param(raw, signature)).collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self { name, params })
    }

    /// Canonical signature string — `Name(type,type,...)` with all
    /// modifiers and parameter names stripped — the form that gets
    /// hashed for the topic0/selector.
    #[must_use]
    pub fn canonical(&self) -> String {
        let types: Vec<&str> = self.params.iter().map(|p| p.ty.as_str()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// `keccak256` of the canonical signature, used directly as an
    /// event's topic0.
    #[must_use]
    pub fn topic0(&self) -> [u8; 32] {
        keccak256(self.canonical().as_bytes()).0
    }

    /// First 4 bytes of `keccak256(canonical)`, a function's selector,
    /// padded into a 32-byte array per [`TriggerBinding`](crate::types::TriggerBinding)'s
    /// storage convention; only the first 4 bytes are meaningful.
    #[must_use]
    pub fn selector_padded(&self) -> [u8; 32] {
        let hash = self.topic0();
        let mut out = [0u8; 32];
        out[..4].copy_from_slice(&hash[..4]);
        out
    }
}

/// Parse a single parameter declaration (everything between commas),
/// e.g. `"uint256 indexed setId"` or `"bytes[] calldata rootData"`.
fn parse_param(raw: &str, full_signature: &str) -> Result<SignatureParam, SignatureError> {
    let mut indexed = false;
    let tokens: Vec<&str> = raw
        .split_whitespace()
        .filter(|tok| {
            if *tok == "indexed" {
                indexed = true;
                false
            } else {
                !LOCATION_KEYWORDS.contains(tok)
            }
        })
        .collect();

    let ty = tokens.first().ok_or_else(|| SignatureError::EmptyParam(full_signature.to_string()))?;
    Ok(SignatureParam { ty: (*ty).to_string(), indexed })
}
