//! Error types for the BONQ ledger engine.
//!
//! Every public operation validates before it mutates, so any error returned
//! here means the registry state is exactly as it was before the call.

use thiserror::Error;

use crate::core::types::{AccountId, AssetSymbol, TroveKey};
use crate::utils::math::Decimal;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ledger engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Amount / Ledger Errors
    // ═══════════════════════════════════════════════════════════════════

    /// A strictly positive amount was required
    #[error("Invalid amount for {operation}: {amount}")]
    InvalidAmount {
        /// Operation that rejected the amount
        operation: &'static str,
        /// The offending amount
        amount: Decimal,
    },

    /// Burn or repay exceeds the funds held by the account
    #[error("Insufficient {asset} balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        /// Asset being debited
        asset: AssetSymbol,
        /// Account being debited
        account: AccountId,
        /// Amount required
        required: Decimal,
        /// Amount available
        available: Decimal,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Trove Errors
    // ═══════════════════════════════════════════════════════════════════

    /// A trove already exists for this owner and asset
    #[error("Trove already exists: {0}")]
    DuplicatePosition(TroveKey),

    /// No open trove for this owner and asset
    #[error("Trove not found: {0}")]
    UnknownPosition(TroveKey),

    /// The trove has been liquidated and can no longer be used
    #[error("Trove is not open: {0}")]
    TroveNotOpen(TroveKey),

    /// Borrowing would push the trove below its minimum ratio
    #[error("Collateralization ratio {ratio} below minimum {minimum}")]
    BelowMinimumRatio {
        /// Ratio the trove would have after the borrow
        ratio: Decimal,
        /// Minimum collateralization ratio of the asset
        minimum: Decimal,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Liquidation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Liquidation attempted on a healthy trove
    #[error("Trove {key} is not undercollateralized (ratio {ratio})")]
    NotUndercollateralized {
        /// Trove that was targeted
        key: TroveKey,
        /// Its current ratio
        ratio: Decimal,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Asset Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Asset symbol is not registered
    #[error("Unknown asset: {0}")]
    UnknownAsset(AssetSymbol),

    /// Asset symbol is already registered
    #[error("Asset already exists: {0}")]
    AssetAlreadyExists(AssetSymbol),

    /// Asset exists but cannot back a trove
    #[error("Asset {0} cannot be used as collateral")]
    NotCollateralAsset(AssetSymbol),

    // ═══════════════════════════════════════════════════════════════════
    // Arithmetic Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Fees cannot be split because every fee stake is zero
    #[error("Cannot distribute fee {fee}: total fee stake is zero")]
    DivisionByZeroStake {
        /// Fee that could not be distributed
        fee: Decimal,
    },

    /// Division by a zero divisor
    #[error("Division by zero in {operation}")]
    DivisionByZero {
        /// Operation that divided
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Validation / Configuration Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns true if the caller can fix the input and try again
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount { .. }
                | Error::InsufficientBalance { .. }
                | Error::BelowMinimumRatio { .. }
                | Error::NotUndercollateralized { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Amount / ledger errors: 1xxx
            Error::InvalidAmount { .. } => 1001,
            Error::InsufficientBalance { .. } => 1002,

            // Trove errors: 2xxx
            Error::DuplicatePosition(_) => 2001,
            Error::UnknownPosition(_) => 2002,
            Error::TroveNotOpen(_) => 2003,
            Error::BelowMinimumRatio { .. } => 2004,

            // Liquidation errors: 3xxx
            Error::NotUndercollateralized { .. } => 3001,

            // Asset errors: 4xxx
            Error::UnknownAsset(_) => 4001,
            Error::AssetAlreadyExists(_) => 4002,
            Error::NotCollateralAsset(_) => 4003,

            // Arithmetic errors: 5xxx
            Error::DivisionByZeroStake { .. } => 5001,
            Error::DivisionByZero { .. } => 5002,

            // Validation errors: 6xxx
            Error::InvalidParameter { .. } => 6001,
            Error::Configuration(_) => 6002,
            Error::Serialization(_) => 6003,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let key = TroveKey::new("alice", "BONQ");
        let codes = vec![
            Error::InvalidAmount { operation: "borrow", amount: Decimal::zero() }.code(),
            Error::DuplicatePosition(key.clone()).code(),
            Error::UnknownPosition(key.clone()).code(),
            Error::NotUndercollateralized { key, ratio: Decimal::zero() }.code(),
            Error::UnknownAsset("WEWT".into()).code(),
            Error::DivisionByZeroStake { fee: Decimal::zero() }.code(),
            Error::Configuration("x".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::BelowMinimumRatio {
            ratio: "1.1".parse().unwrap(),
            minimum: "1.2".parse().unwrap(),
        };
        assert!(err.to_string().contains("1.1"));
        assert!(err.to_string().contains("1.2"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::InvalidAmount { operation: "repay", amount: Decimal::zero() }.is_recoverable());
        assert!(!Error::UnknownAsset("XYZ".into()).is_recoverable());
    }
}
