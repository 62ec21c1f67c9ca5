//! Validated primitive types for engine entities.
//!
//! These newtypes provide:
//! - Type safety (can't accidentally pass a block number as a hash)
//! - Validation at construction time
//! - Domain semantics in function signatures

use std::fmt;

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ETHEREUM ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated 20-byte Ethereum address.
///
/// This newtype ensures addresses are always exactly 20 bytes.
/// Use `Address` from `alloy-primitives` for on-chain interaction,
/// but this type for persistence and domain logic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EthAddress([u8; 20]);

impl EthAddress {
    /// Create from a fixed-size array (infallible).
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Try to create from a byte slice.
    ///
    /// # Errors
    /// Returns `InvalidAddress::WrongLength` if the slice is not exactly 20 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, InvalidAddress> {
        let bytes: [u8; 20] = slice
            .try_into()
            .map_err(|_| InvalidAddress::WrongLength(slice.len()))?;
        Ok(Self(bytes))
    }

    /// Parse from hex string (with or without 0x prefix).
    ///
    /// # Errors
    /// Returns `InvalidAddress` if the string is not valid hex or wrong length.
    pub fn from_hex(s: &str) -> Result<Self, InvalidAddress> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 40 {
            return Err(InvalidAddress::WrongLength(s.len() / 2));
        }
        let bytes = hex::decode(s).map_err(|_| InvalidAddress::InvalidHex)?;
        Self::from_slice(&bytes)
    }

    /// Get the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Convert to lowercase hex string with 0x prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Check if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// The zero address (0x0000...0000), used to represent a wildcard
    /// trigger binding (§4.2: a binding with empty address matches any
    /// contract).
    pub const ZERO: Self = Self([0u8; 20]);
}

impl fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EthAddress({})", self.to_hex())
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<EthAddress> for String {
    fn from(addr: EthAddress) -> Self {
        addr.to_hex()
    }
}

impl TryFrom<String> for EthAddress {
    type Error = InvalidAddress;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl TryFrom<&str> for EthAddress {
    type Error = InvalidAddress;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::from_hex(s)
    }
}

impl From<[u8; 20]> for EthAddress {
    fn from(bytes: [u8; 20]) -> Self {
        Self::new(bytes)
    }
}

impl From<Address> for EthAddress {
    fn from(addr: Address) -> Self {
        Self::new(addr.0.0)
    }
}

impl From<EthAddress> for Address {
    fn from(addr: EthAddress) -> Self {
        Self::from(addr.0)
    }
}

/// Error for invalid Ethereum addresses.
#[derive(Debug, Clone, Error)]
pub enum InvalidAddress {
    /// Address has wrong byte length.
    #[error("wrong length: expected 20 bytes, got {0}")]
    WrongLength(usize),
    /// Address contains invalid hex characters.
    #[error("invalid hex encoding")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK HASH
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated 32-byte block (or topic/selector-derived) hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    /// Create from a fixed-size array (infallible).
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from hex string (with or without 0x prefix).
    ///
    /// # Errors
    /// Returns `InvalidHash` if the string is not valid hex or wrong length.
    pub fn from_hex(s: &str) -> Result<Self, InvalidHash> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(InvalidHash::WrongLength(s.len() / 2));
        }
        let bytes = hex::decode(s).map_err(|_| InvalidHash::InvalidHex)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| InvalidHash::WrongLength(v.len()))?;
        Ok(Self(array))
    }

    /// Get the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex string with 0x prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self.to_hex())
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<BlockHash> for String {
    fn from(hash: BlockHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for BlockHash {
    type Error = InvalidHash;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<B256> for BlockHash {
    fn from(hash: B256) -> Self {
        Self::new(hash.0)
    }
}

impl From<BlockHash> for B256 {
    fn from(hash: BlockHash) -> Self {
        Self::from(hash.0)
    }
}

/// Error for invalid block hashes.
#[derive(Debug, Clone, Error)]
pub enum InvalidHash {
    /// Hash has wrong byte length.
    #[error("wrong length: expected 32 bytes, got {0}")]
    WrongLength(usize),
    /// Hash contains invalid hex characters.
    #[error("invalid hex encoding")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK NUMBER (for type clarity)
// ═══════════════════════════════════════════════════════════════════════════════

/// Block number newtype for clarity in function signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockNumber(u64);

impl BlockNumber {
    /// Create a new block number.
    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// Get the value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the next block number (saturating at `u64::MAX`).
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the previous block number (saturating at 0).
    #[must_use]
    pub const fn prev(&self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl From<u64> for BlockNumber {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl From<BlockNumber> for u64 {
    fn from(b: BlockNumber) -> Self {
        b.0
    }
}

impl From<BlockNumber> for i64 {
    #[allow(clippy::cast_possible_wrap)]
    fn from(b: BlockNumber) -> Self {
        b.0 as Self
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
