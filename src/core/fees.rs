//! Fee staking.
//!
//! Holders of the fee asset stake it with the registry and receive every
//! borrow fee pro-rata to their stake, paid out as newly issued stable units.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::AccountId;
use crate::error::{Error, Result};
use crate::utils::constants::DIVISION_SCALE;
use crate::utils::math::{Decimal, RoundingMode};

/// One staker's part of a distributed fee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeShare {
    /// Receiving staker
    pub staker: AccountId,
    /// Stable units owed to the staker
    pub amount: Decimal,
}

/// Fee-asset stakes by staker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeStakes {
    stakes: BTreeMap<AccountId, Decimal>,
}

impl FeeStakes {
    /// Create an empty stake book
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to a staker's stake
    pub fn stake(&mut self, staker: &AccountId, amount: &Decimal) {
        let entry = self.stakes.entry(staker.clone()).or_default();
        *entry += amount;
    }

    /// Remove up to `amount` from a staker's stake, returning what was removed
    pub fn unstake(&mut self, staker: &AccountId, amount: &Decimal) -> Decimal {
        let actual = self.clamped(staker, amount);
        if let Some(entry) = self.stakes.get_mut(staker) {
            *entry -= &actual;
        }
        actual
    }

    /// The part of `amount` a staker can actually unstake
    pub fn clamped(&self, staker: &AccountId, amount: &Decimal) -> Decimal {
        self.stake_of(staker).min(amount.clone())
    }

    /// Current stake (zero for unknown stakers)
    pub fn stake_of(&self, staker: &AccountId) -> Decimal {
        self.stakes.get(staker).cloned().unwrap_or_default()
    }

    /// Sum of all stakes
    pub fn total(&self) -> Decimal {
        self.stakes.values().sum()
    }

    /// Number of stakers ever recorded (zeroed stakes included)
    pub fn staker_count(&self) -> usize {
        self.stakes.len()
    }

    /// Split `fee` across stakers pro-rata to stake.
    ///
    /// With no stakers recorded nothing is owed. Stakers whose stakes sum
    /// to zero cannot share a fee.
    pub fn shares(&self, fee: &Decimal) -> Result<Vec<FeeShare>> {
        if self.stakes.is_empty() || fee.is_zero() {
            return Ok(Vec::new());
        }

        let total = self.total();
        if total.is_zero() {
            return Err(Error::DivisionByZeroStake { fee: fee.clone() });
        }

        self.stakes
            .iter()
            .filter(|(_, stake)| stake.is_positive())
            .map(|(staker, stake)| {
                let prorata = stake.div(&total, DIVISION_SCALE, RoundingMode::HalfEven)?;
                Ok(FeeShare {
                    staker: staker.clone(),
                    amount: fee * &prorata,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_stake_accumulates() {
        let mut stakes = FeeStakes::new();
        let alice = AccountId::user("alice");

        stakes.stake(&alice, &d("100"));
        stakes.stake(&alice, &d("50"));

        assert_eq!(stakes.stake_of(&alice), d("150"));
        assert_eq!(stakes.total(), d("150"));
    }

    #[test]
    fn test_unstake_is_clamped() {
        let mut stakes = FeeStakes::new();
        let alice = AccountId::user("alice");

        stakes.stake(&alice, &d("100"));
        assert_eq!(stakes.unstake(&alice, &d("30")), d("30"));
        assert_eq!(stakes.unstake(&alice, &d("500")), d("70"));
        assert!(stakes.stake_of(&alice).is_zero());
        assert!(stakes.unstake(&AccountId::user("nobody"), &d("5")).is_zero());
    }

    #[test]
    fn test_shares_are_pro_rata() {
        let mut stakes = FeeStakes::new();
        stakes.stake(&AccountId::user("a"), &d("100"));
        stakes.stake(&AccountId::user("b"), &d("300"));

        let shares = stakes.shares(&d("5")).unwrap();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].amount, d("1.25"));
        assert_eq!(shares[1].amount, d("3.75"));
    }

    #[test]
    fn test_shares_sum_to_fee_within_rounding() {
        let mut stakes = FeeStakes::new();
        for name in ["a", "b", "c"] {
            stakes.stake(&AccountId::user(name), &d("1"));
        }

        let fee = d("10");
        let distributed: Decimal = stakes.shares(&fee).unwrap().into_iter().map(|s| s.amount).sum();
        let error = (distributed - &fee).abs();
        assert!(error < Decimal::new(1, 120));
    }

    #[test]
    fn test_no_stakers_owes_nothing() {
        let stakes = FeeStakes::new();
        assert!(stakes.shares(&d("5")).unwrap().is_empty());
    }

    #[test]
    fn test_zero_total_stake_fails() {
        let mut stakes = FeeStakes::new();
        let alice = AccountId::user("alice");
        stakes.stake(&alice, &d("10"));
        stakes.unstake(&alice, &d("10"));

        assert!(matches!(stakes.shares(&d("5")), Err(Error::DivisionByZeroStake { .. })));
        assert!(stakes.shares(&Decimal::zero()).unwrap().is_empty());
    }
}
