//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// PRECISION
// ═══════════════════════════════════════════════════════════════════════════════

/// Fractional digits kept by every division in the engine
pub const DIVISION_SCALE: u32 = 128;

/// Fractional digits a collateralization ratio is reported with
pub const RATIO_SCALE: u32 = 64;

/// Basis points are decimals with four fractional digits (10000 = 100%)
pub const BPS_SCALE: u32 = 4;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERALIZATION & FEES
// ═══════════════════════════════════════════════════════════════════════════════

/// Default Minimum Collateralization Ratio (MCR) - 120%
pub const DEFAULT_MCR_BPS: i64 = 12_000;

/// Borrowing fee - 0.5% (50 basis points)
pub const BORROWING_FEE_BPS: i64 = 50;

/// Liquidation reserve minted into a trove on its first borrow (stable units)
pub const LIQUIDATION_RESERVE_UNITS: i64 = 1;

/// Maximum liquidation records kept in memory
pub const MAX_LIQUIDATION_HISTORY: usize = 1000;

// ═══════════════════════════════════════════════════════════════════════════════
// ASSETS
// ═══════════════════════════════════════════════════════════════════════════════

/// Symbol of the protocol's stable asset
pub const STABLE_SYMBOL: &str = "BEUR";

/// Symbol of the fee / governance asset
pub const FEE_ASSET_SYMBOL: &str = "BONQ";

/// Reserved account name of the infinite-supply mint source
pub const MINT_ACCOUNT: &str = "mint";

/// Reserved account name credited when a liquidation has no caller
pub const ANONYMOUS_ACCOUNT: &str = "anonymous";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_constants() {
        assert!(RATIO_SCALE < DIVISION_SCALE);
        assert!(DIVISION_SCALE >= 128);
    }

    #[test]
    fn test_fee_and_ratio_constants() {
        assert!(BORROWING_FEE_BPS < 10_000);
        assert!(DEFAULT_MCR_BPS > 10_000);
    }
}
