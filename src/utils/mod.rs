//! Utility modules for the ledger engine.
//!
//! - Arbitrary-precision decimal arithmetic
//! - Constants

pub mod constants;
pub mod math;

pub use constants::*;
pub use math::*;
