//! Core type definitions for Aurum

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account address (0x-prefixed, 40 hex chars)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check basic account address format: "0x" + 40 hex digits
    pub fn is_well_formed(&self) -> bool {
        let s = &self.0;
        s.len() == 42 && s.starts_with("0x") && hex::decode(&s[2..]).is_ok()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token contract identifier (0x-prefixed, 40 hex chars)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction hash (0x-prefixed, 64 hex chars)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check basic hash format: "0x" + 64 hex digits
    pub fn is_well_formed(&self) -> bool {
        let s = &self.0;
        s.len() == 66 && s.starts_with("0x") && hex::decode(&s[2..]).is_ok()
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rupiah amount in smallest currency units (1 = Rp 1)
pub type Rupiah = u64;

/// Gold token amount in base units (1 = 0.0001 g)
pub type GoldUnits = u64;

/// Constants
pub mod constants {
    use super::{GoldUnits, Rupiah};

    /// Gold token decimals: base unit is 0.0001 gram
    pub const GOLD_DECIMALS: u8 = 4;

    /// Base units per gram of gold
    pub const GOLD_UNITS_PER_GRAM: GoldUnits = 10_000;

    /// Minimum loan principal accepted by the protocol
    pub const MIN_LOAN_RUPIAH: Rupiah = 10_000;

    /// Above this principal, redemptions route through the treasury desk
    pub const SELF_SERVICE_MAX_RUPIAH: Rupiah = 250_000_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_format_check() {
        let good = Address::new("0x2aE4e9CBce0a2ea8371c2f0c1d16b552a4262a91");
        assert!(good.is_well_formed());

        let short = Address::new("0x2aE4e9");
        assert!(!short.is_well_formed());

        let no_prefix = Address::new("2aE4e9CBce0a2ea8371c2f0c1d16b552a4262a9100");
        assert!(!no_prefix.is_well_formed());
    }

    #[test]
    fn test_tx_hash_format_check() {
        let good = TxHash::new(
            "0x6c3d1baf2f31095b0a5a3b262a21bfb0e7c74f0a9b8b25a6a5d2ffcd3dedc2ba",
        );
        assert!(good.is_well_formed());
        assert!(!TxHash::new("0xdeadbeef").is_well_formed());
    }

    #[test]
    fn test_newtype_serde_transparent() {
        let addr = Address::new("0xabc");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0xabc\"");
    }
}
