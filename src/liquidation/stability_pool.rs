//! Stability pool.
//!
//! Participants stake stable units into the pool. When a trove is liquidated
//! the pool absorbs as much of its debt as it can: each staker's stake shrinks
//! by its pro-rata part of the absorbed debt and in exchange receives the same
//! pro-rata part of the collateral released by the trove.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::AccountId;
use crate::error::Result;
use crate::utils::constants::DIVISION_SCALE;
use crate::utils::math::{Decimal, RoundingMode};

// ═══════════════════════════════════════════════════════════════════════════════
// POOL OFFSET
// ═══════════════════════════════════════════════════════════════════════════════

/// One staker's part of an offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolShare {
    /// Staker receiving collateral
    pub staker: AccountId,
    /// Collateral transferred to the staker
    pub collateral: Decimal,
    /// Amount removed from the staker's stake
    pub stake_reduction: Decimal,
}

/// Planned absorption of a liquidated trove's debt by the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolOffset {
    /// Debt absorbed by the pool
    pub debt_offset: Decimal,
    /// Collateral released to stakers in exchange
    pub collateral_released: Decimal,
    /// Per-staker breakdown
    pub shares: Vec<PoolShare>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABILITY POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Stable-asset stakes available to absorb liquidations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StabilityPool {
    /// Stakes by staker
    stakes: BTreeMap<AccountId, Decimal>,
    /// Total liquidations absorbed (fully or partially)
    total_liquidations: u64,
    /// Total debt absorbed
    total_debt_absorbed: Decimal,
}

impl StabilityPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEPOSITS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add to a staker's stake
    pub fn deposit(&mut self, staker: &AccountId, amount: &Decimal) {
        let entry = self.stakes.entry(staker.clone()).or_default();
        *entry += amount;
    }

    /// Remove up to `amount` from a staker's stake, returning what was removed
    pub fn withdraw(&mut self, staker: &AccountId, amount: &Decimal) -> Decimal {
        let actual = self.stake_of(staker).min(amount.clone());
        if let Some(entry) = self.stakes.get_mut(staker) {
            *entry -= &actual;
        }
        actual
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION ABSORPTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Work out how the pool absorbs `debt` backed by `collateral`.
    ///
    /// Returns `None` when the pool holds nothing. The pool absorbs at most
    /// its total stake and releases collateral in proportion to the part of
    /// the debt it absorbs.
    pub fn plan_offset(&self, debt: &Decimal, collateral: &Decimal) -> Result<Option<PoolOffset>> {
        let total = self.total_stake();
        if !total.is_positive() || !debt.is_positive() {
            return Ok(None);
        }

        let debt_offset = total.clone().min(debt.clone());
        let covered = debt_offset.div(debt, DIVISION_SCALE, RoundingMode::HalfEven)?;
        let collateral_released = collateral * &covered;

        let mut shares = Vec::new();
        for (staker, stake) in self.stakes.iter().filter(|(_, stake)| stake.is_positive()) {
            let prorata = stake.div(&total, DIVISION_SCALE, RoundingMode::HalfEven)?;
            shares.push(PoolShare {
                staker: staker.clone(),
                collateral: &collateral_released * &prorata,
                stake_reduction: &debt_offset * &prorata,
            });
        }

        Ok(Some(PoolOffset {
            debt_offset,
            collateral_released,
            shares,
        }))
    }

    /// Reduce stakes by a planned offset. Stakes never go below zero.
    pub fn apply_offset(&mut self, offset: &PoolOffset) {
        for share in &offset.shares {
            if let Some(stake) = self.stakes.get_mut(&share.staker) {
                let reduced = &*stake - &share.stake_reduction;
                *stake = reduced.max(Decimal::zero());
            }
        }

        self.total_liquidations += 1;
        self.total_debt_absorbed += &offset.debt_offset;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current stake (zero for unknown stakers)
    pub fn stake_of(&self, staker: &AccountId) -> Decimal {
        self.stakes.get(staker).cloned().unwrap_or_default()
    }

    /// Sum of all stakes
    pub fn total_stake(&self) -> Decimal {
        self.stakes.values().sum()
    }

    /// Get number of depositors with a positive stake
    pub fn depositor_count(&self) -> usize {
        self.stakes.values().filter(|stake| stake.is_positive()).count()
    }

    /// Get total liquidations absorbed
    pub fn total_liquidations(&self) -> u64 {
        self.total_liquidations
    }

    /// Get total debt absorbed
    pub fn total_debt_absorbed(&self) -> &Decimal {
        &self.total_debt_absorbed
    }

    /// Check if the pool can absorb `debt` in full
    pub fn can_absorb(&self, debt: &Decimal) -> bool {
        &self.total_stake() >= debt
    }

    /// Get pool statistics
    pub fn statistics(&self) -> StabilityPoolStats {
        StabilityPoolStats {
            total_stake: self.total_stake(),
            depositor_count: self.depositor_count() as u64,
            total_liquidations: self.total_liquidations,
            total_debt_absorbed: self.total_debt_absorbed.clone(),
        }
    }
}

/// Stability pool statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityPoolStats {
    pub total_stake: Decimal,
    pub depositor_count: u64,
    pub total_liquidations: u64,
    pub total_debt_absorbed: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn alice() -> AccountId {
        AccountId::user("alice")
    }

    fn bob() -> AccountId {
        AccountId::user("bob")
    }

    #[test]
    fn test_deposit_accumulates() {
        let mut pool = StabilityPool::new();

        pool.deposit(&alice(), &d("1000"));
        pool.deposit(&alice(), &d("500"));

        assert_eq!(pool.stake_of(&alice()), d("1500"));
        assert_eq!(pool.total_stake(), d("1500"));
        assert_eq!(pool.depositor_count(), 1);
    }

    #[test]
    fn test_withdraw_is_clamped() {
        let mut pool = StabilityPool::new();
        pool.deposit(&alice(), &d("1000"));

        assert_eq!(pool.withdraw(&alice(), &d("400")), d("400"));
        assert_eq!(pool.withdraw(&alice(), &d("1000")), d("600"));
        assert!(pool.total_stake().is_zero());
        assert_eq!(pool.depositor_count(), 0);
    }

    #[test]
    fn test_empty_pool_plans_nothing() {
        let pool = StabilityPool::new();
        assert!(pool.plan_offset(&d("100"), &d("10")).unwrap().is_none());
    }

    #[test]
    fn test_full_absorption() {
        let mut pool = StabilityPool::new();
        pool.deposit(&alice(), &d("1000"));
        pool.deposit(&bob(), &d("3000"));

        let offset = pool.plan_offset(&d("400"), &d("50")).unwrap().unwrap();
        assert_eq!(offset.debt_offset, d("400"));
        assert_eq!(offset.collateral_released, d("50"));
        assert_eq!(offset.shares[0].collateral, d("12.5"));
        assert_eq!(offset.shares[0].stake_reduction, d("100"));
        assert_eq!(offset.shares[1].collateral, d("37.5"));

        pool.apply_offset(&offset);
        assert_eq!(pool.stake_of(&alice()), d("900"));
        assert_eq!(pool.stake_of(&bob()), d("2700"));
        assert_eq!(pool.total_liquidations(), 1);
        assert_eq!(pool.total_debt_absorbed(), &d("400"));
    }

    #[test]
    fn test_partial_absorption() {
        let mut pool = StabilityPool::new();
        pool.deposit(&alice(), &d("250"));

        let offset = pool.plan_offset(&d("1000"), &d("80")).unwrap().unwrap();
        assert_eq!(offset.debt_offset, d("250"));
        assert_eq!(offset.collateral_released, d("20"));

        pool.apply_offset(&offset);
        assert!(pool.stake_of(&alice()).is_zero());
        assert!(!pool.can_absorb(&d("1")));
    }
}
