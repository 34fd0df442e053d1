//! Trove management.
//!
//! A trove is a single-collateral debt position owned by one participant.
//! Its collateral is not stored on the trove: it is whatever the trove's own
//! sub-account holds in the collateral asset's ledger. The trove itself only
//! tracks debt, the liquidation reserve and its lifecycle.

use serde::{Deserialize, Serialize};

use crate::core::token::Asset;
use crate::core::types::{AccountId, TroveKey};
use crate::error::{Error, Result};
use crate::utils::constants::{DIVISION_SCALE, RATIO_SCALE};
use crate::utils::math::{Decimal, RoundingMode};

// ═══════════════════════════════════════════════════════════════════════════════
// TROVE STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle of a trove
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TroveStatus {
    /// Trove accepts collateral, borrows and repayments
    Open,
    /// Trove was liquidated and removed from the registry
    Liquidated,
}

impl TroveStatus {
    /// Check if the trove can no longer be used
    pub fn is_terminal(&self) -> bool {
        matches!(self, TroveStatus::Liquidated)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TROVE STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot of a trove priced against its collateral asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroveState {
    /// Trove identity
    pub key: TroveKey,
    /// Collateral held by the sub-account
    pub collateral: Decimal,
    /// Collateral value at the current price
    pub collateral_value: Decimal,
    /// Outstanding debt
    pub debt: Decimal,
    /// Collateralization ratio (zero without debt)
    pub ratio: Decimal,
    /// Whether the trove can currently be liquidated
    pub liquidatable: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TROVE
// ═══════════════════════════════════════════════════════════════════════════════

/// A collateralized debt position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trove {
    /// Owner and collateral asset
    key: TroveKey,
    /// Debt including fees and redistributed debt
    debt: Decimal,
    /// Stable units parked in the sub-account as liquidator reward
    liquidation_reserve: Decimal,
    /// Current status
    status: TroveStatus,
    /// Creation order within the registry
    created_seq: u64,
}

impl Trove {
    /// Create an empty trove
    pub fn new(key: TroveKey, created_seq: u64) -> Self {
        Self {
            key,
            debt: Decimal::zero(),
            liquidation_reserve: Decimal::zero(),
            status: TroveStatus::Open,
            created_seq,
        }
    }

    /// Owner and collateral asset
    pub fn key(&self) -> &TroveKey {
        &self.key
    }

    /// Ledger account of the owner
    pub fn owner_account(&self) -> AccountId {
        AccountId::user(self.key.owner.clone())
    }

    /// Sub-account holding collateral and the reserve
    pub fn account(&self) -> AccountId {
        AccountId::trove(&self.key)
    }

    /// Outstanding debt
    pub fn debt(&self) -> &Decimal {
        &self.debt
    }

    /// Liquidation reserve currently parked
    pub fn liquidation_reserve(&self) -> &Decimal {
        &self.liquidation_reserve
    }

    /// Current status
    pub fn status(&self) -> TroveStatus {
        self.status
    }

    /// Creation order within the registry
    pub fn created_seq(&self) -> u64 {
        self.created_seq
    }

    /// Check the trove is still usable
    pub fn ensure_open(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::TroveNotOpen(self.key.clone()));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Collateral held by the sub-account
    pub fn collateral(&self, asset: &Asset) -> Decimal {
        asset.balance_of(&self.account())
    }

    /// Collateralization ratio: collateral value over debt, zero without debt
    pub fn collateral_ratio(&self, asset: &Asset) -> Decimal {
        let value = self.collateral(asset) * asset.price();
        ratio_of(&value, &self.debt)
    }

    /// Check if the trove can be liquidated.
    ///
    /// A trove without debt is never liquidatable even though its ratio
    /// reads as zero.
    pub fn is_undercollateralized(&self, asset: &Asset) -> bool {
        !self.status.is_terminal()
            && self.debt.is_positive()
            && &self.collateral_ratio(asset) <= asset.mcr()
    }

    /// Get full state snapshot
    pub fn state(&self, asset: &Asset) -> TroveState {
        let collateral = self.collateral(asset);
        let collateral_value = &collateral * asset.price();
        TroveState {
            key: self.key.clone(),
            ratio: ratio_of(&collateral_value, &self.debt),
            liquidatable: self.is_undercollateralized(asset),
            debt: self.debt.clone(),
            collateral,
            collateral_value,
        }
    }

    /// Validate a borrow of `amount` against the collateral asset.
    ///
    /// The ratio after the borrow is checked before the fee is added, so a
    /// borrow landing exactly on the MCR is accepted.
    pub fn check_borrow(&self, asset: &Asset, amount: &Decimal) -> Result<()> {
        self.ensure_open()?;

        if !amount.is_positive() {
            return Err(Error::InvalidAmount {
                operation: "borrow",
                amount: amount.clone(),
            });
        }

        let value = self.collateral(asset) * asset.price();
        let new_debt = &self.debt + amount;
        let ratio = value.div(&new_debt, DIVISION_SCALE, RoundingMode::HalfEven)?;

        if &ratio < asset.mcr() {
            return Err(Error::BelowMinimumRatio {
                ratio: ratio.round(RATIO_SCALE, RoundingMode::HalfEven),
                minimum: asset.mcr().clone(),
            });
        }

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn add_debt(&mut self, amount: &Decimal) {
        self.debt += amount;
    }

    /// Reduce debt, never below zero; returns what was actually removed
    pub(crate) fn reduce_debt(&mut self, amount: &Decimal) -> Decimal {
        let actual = self.debt.clone().min(amount.clone());
        self.debt -= &actual;
        actual
    }

    pub(crate) fn set_liquidation_reserve(&mut self, reserve: Decimal) {
        self.liquidation_reserve = reserve;
    }

    /// Zero out debt and reserve and mark the trove liquidated
    pub(crate) fn close_liquidated(&mut self) {
        self.debt = Decimal::zero();
        self.liquidation_reserve = Decimal::zero();
        self.status = TroveStatus::Liquidated;
    }
}

/// `value / debt` at ratio precision, zero when there is no debt
fn ratio_of(value: &Decimal, debt: &Decimal) -> Decimal {
    if debt.is_zero() {
        return Decimal::zero();
    }
    value
        .div(debt, DIVISION_SCALE, RoundingMode::HalfEven)
        .map(|ratio| ratio.round(RATIO_SCALE, RoundingMode::HalfEven))
        .unwrap_or_default()
}
