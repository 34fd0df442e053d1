//! Identifier types shared by the ledger, troves and the registry.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::constants::{ANONYMOUS_ACCOUNT, MINT_ACCOUNT};

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET SYMBOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Short ticker identifying an asset ("BEUR", "WEWT", ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetSymbol(String);

impl AssetSymbol {
    /// Create a new symbol
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Borrow the symbol text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetSymbol {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

impl From<String> for AssetSymbol {
    fn from(symbol: String) -> Self {
        Self(symbol)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TROVE KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Composite key of a trove: one per (owner, collateral asset)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TroveKey {
    /// Owner identifier
    pub owner: String,
    /// Collateral asset
    pub asset: AssetSymbol,
}

impl TroveKey {
    /// Create a new key
    pub fn new(owner: impl Into<String>, asset: impl Into<AssetSymbol>) -> Self {
        Self {
            owner: owner.into(),
            asset: asset.into(),
        }
    }
}

impl fmt::Display for TroveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.asset)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCOUNT ID
// ═══════════════════════════════════════════════════════════════════════════════

/// Holder of a balance in an asset ledger
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountId {
    /// An external participant
    User(String),
    /// A trove's own sub-account (collateral and liquidation reserve)
    Trove(TroveKey),
    /// The registry's holding account for staked assets
    Registry,
    /// Virtual infinite-supply sender used to issue new units
    Mint,
    /// Reward sink for liquidations triggered without a caller
    Anonymous,
}

impl AccountId {
    /// Account of an external participant
    pub fn user(name: impl Into<String>) -> Self {
        AccountId::User(name.into())
    }

    /// Sub-account of a trove
    pub fn trove(key: &TroveKey) -> Self {
        AccountId::Trove(key.clone())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountId::User(name) => f.write_str(name),
            AccountId::Trove(key) => write!(f, "{}#trove", key),
            AccountId::Registry => f.write_str("registry"),
            AccountId::Mint => f.write_str(MINT_ACCOUNT),
            AccountId::Anonymous => f.write_str(ANONYMOUS_ACCOUNT),
        }
    }
}

/// Plain names map to users, except the reserved `"mint"` and `"anonymous"`
impl From<&str> for AccountId {
    fn from(name: &str) -> Self {
        match name {
            MINT_ACCOUNT => AccountId::Mint,
            ANONYMOUS_ACCOUNT => AccountId::Anonymous,
            other => AccountId::user(other),
        }
    }
}

impl From<String> for AccountId {
    fn from(name: String) -> Self {
        AccountId::from(name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_account_names() {
        assert_eq!(AccountId::from("mint"), AccountId::Mint);
        assert_eq!(AccountId::from("anonymous"), AccountId::Anonymous);
        assert_eq!(AccountId::from("alice"), AccountId::user("alice"));
    }

    #[test]
    fn test_trove_keys_do_not_collide() {
        // "ab" + "C" and "a" + "bC" collide as concatenated strings
        let first = TroveKey::new("ab", "C");
        let second = TroveKey::new("a", "bC");
        assert_ne!(first, second);
        assert_ne!(AccountId::trove(&first), AccountId::trove(&second));
    }

    #[test]
    fn test_display() {
        let key = TroveKey::new("alice", "WEWT");
        assert_eq!(key.to_string(), "alice/WEWT");
        assert_eq!(AccountId::trove(&key).to_string(), "alice/WEWT#trove");
    }
}
