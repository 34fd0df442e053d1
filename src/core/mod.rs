//! Core modules for the ledger engine.
//!
//! This module contains the fundamental building blocks:
//! - Identifiers for assets, troves and accounts
//! - Asset ledgers with the transfer-mints-shortfall rule
//! - Troves and their ratio rules
//! - Fee staking
//! - Configuration and the registry that owns everything

pub mod config;
pub mod fees;
pub mod registry;
pub mod token;
pub mod trove;
pub mod types;

pub use config::*;
pub use fees::*;
pub use registry::*;
pub use token::*;
pub use trove::*;
pub use types::*;
