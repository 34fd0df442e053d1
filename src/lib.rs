//! # BONQ Ledger
//!
//! An in-memory collateralized-debt ledger: owners lock collateral assets in
//! troves, borrow a stable asset against them, and troves that fall to their
//! minimum collateralization ratio are liquidated into a stability pool or
//! redistributed across the surviving troves.
//!
//! ## Architecture
//!
//! - **Core**: Decimal-backed asset ledgers, troves, fee staking and the registry
//! - **Liquidation**: Liquidation algorithm, price sweeps and the stability pool
//! - **Protocol**: Serializable operations and scenario replay
//!
//! ## Example
//!
//! ```rust,ignore
//! use bonq_ledger::prelude::*;
//!
//! let mut registry = Registry::default();
//! let key = registry.create_trove("alice", &"BONQ".into())?;
//! registry.deposit_collateral(&key, &AccountId::user("alice"), &"1000".parse()?)?;
//! let receipt = registry.borrow(&key, &"1000".parse()?)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod core;
pub mod error;
pub mod liquidation;
pub mod protocol;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::{AssetConfig, ProtocolConfig},
        registry::{BorrowReceipt, Registry, RegistryStats},
        token::Asset,
        trove::{Trove, TroveState, TroveStatus},
        types::{AccountId, AssetSymbol, TroveKey},
    };
    pub use crate::error::{Error, Result};
    pub use crate::liquidation::{
        engine::{LiquidationEngine, LiquidationOutcome},
        stability_pool::StabilityPool,
    };
    pub use crate::protocol::operations::{Operation, OperationOutcome, Scenario};
    pub use crate::utils::math::{Decimal, RoundingMode};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name
pub const PROTOCOL_NAME: &str = "BONQ";
