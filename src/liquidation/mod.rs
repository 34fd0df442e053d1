//! Liquidation module.
//!
//! This module handles liquidations and the stability pool:
//! - Liquidation of troves at or below their MCR
//! - Stability pool for absorbing liquidated debt
//! - Redistribution of the remainder across surviving troves

pub mod engine;
pub mod stability_pool;

pub use engine::*;
pub use stability_pool::*;
