//! Liquidation engine.
//!
//! Liquidating a trove pays its reserve to the liquidator, lets the stability
//! pool absorb as much of the debt as it can and spreads whatever is left,
//! debt and collateral alike, across the surviving troves of the same asset
//! in proportion to their collateral.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::registry::Registry;
use crate::core::trove::Trove;
use crate::core::types::{AccountId, TroveKey};
use crate::error::{Error, Result};
use crate::utils::constants::{DIVISION_SCALE, MAX_LIQUIDATION_HISTORY};
use crate::utils::math::{Decimal, RoundingMode};

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION OUTCOME
// ═══════════════════════════════════════════════════════════════════════════════

/// Record of one liquidation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    /// The liquidated trove, debt and reserve zeroed
    pub trove: Trove,
    /// Account that received the liquidation reserve
    pub liquidator: AccountId,
    /// Collateralization ratio at liquidation
    pub ratio: Decimal,
    /// Debt before liquidation
    pub debt: Decimal,
    /// Collateral before liquidation
    pub collateral: Decimal,
    /// Reserve paid to the liquidator
    pub reserve_paid: Decimal,
    /// Debt absorbed by the stability pool
    pub debt_to_pool: Decimal,
    /// Collateral paid out to stability-pool stakers
    pub collateral_to_pool: Decimal,
    /// Debt spread across surviving troves
    pub debt_redistributed: Decimal,
    /// Collateral spread across surviving troves
    pub collateral_redistributed: Decimal,
    /// Number of surviving troves that received a share
    pub recipients: usize,
    /// Debt nobody absorbed because no surviving trove held collateral
    pub debt_unabsorbed: Decimal,
    /// Collateral left behind in the liquidated sub-account
    pub residual_collateral: Decimal,
}

impl LiquidationOutcome {
    /// Key of the liquidated trove
    pub fn key(&self) -> &TroveKey {
        self.trove.key()
    }

    /// Whether the stability pool took any of the debt
    pub fn absorbed_by_pool(&self) -> bool {
        self.debt_to_pool.is_positive()
    }

    /// Whether any debt was pushed onto surviving troves
    pub fn redistributed(&self) -> bool {
        self.recipients > 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Liquidation history and running totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEngine {
    /// Most recent outcomes, oldest first
    events: Vec<LiquidationOutcome>,
    /// Maximum events to keep
    max_events: usize,
    /// Total liquidations performed
    total_liquidations: u64,
    /// Total debt liquidated (reserves included)
    total_debt_liquidated: Decimal,
}

impl Default for LiquidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LiquidationEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            max_events: MAX_LIQUIDATION_HISTORY,
            total_liquidations: 0,
            total_debt_liquidated: Decimal::zero(),
        }
    }

    /// Get total liquidations
    pub fn total_liquidations(&self) -> u64 {
        self.total_liquidations
    }

    /// Get total debt liquidated
    pub fn total_debt_liquidated(&self) -> &Decimal {
        &self.total_debt_liquidated
    }

    /// Get recent events
    pub fn recent_events(&self) -> &[LiquidationOutcome] {
        &self.events
    }

    /// Get events for a specific trove key
    pub fn events_for_trove(&self, key: &TroveKey) -> Vec<&LiquidationOutcome> {
        self.events.iter().filter(|e| e.key() == key).collect()
    }

    /// Get statistics
    pub fn statistics(&self) -> LiquidationStats {
        let pool_absorbed = self.events.iter().filter(|e| e.absorbed_by_pool()).count() as u64;
        let redistributed = self.events.iter().filter(|e| e.redistributed()).count() as u64;

        LiquidationStats {
            total_liquidations: self.total_liquidations,
            total_debt_liquidated: self.total_debt_liquidated.clone(),
            pool_absorbed_count: pool_absorbed,
            redistribution_count: redistributed,
        }
    }

    /// Add an event (with pruning)
    fn record(&mut self, event: LiquidationOutcome) {
        self.total_liquidations += 1;
        self.total_debt_liquidated += &event.debt + &event.reserve_paid;
        self.events.push(event);

        if self.events.len() > self.max_events {
            self.events.drain(0..self.events.len() - self.max_events);
        }
    }
}

/// Liquidation statistics over the retained history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationStats {
    pub total_liquidations: u64,
    pub total_debt_liquidated: Decimal,
    pub pool_absorbed_count: u64,
    pub redistribution_count: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION EXECUTION
// ═══════════════════════════════════════════════════════════════════════════════

impl Registry {
    /// Check if an open trove is at or below its asset's MCR
    pub fn is_liquidatable(&self, key: &TroveKey) -> bool {
        match (self.troves.get(key), self.assets.get(&key.asset)) {
            (Some(trove), Some(asset)) => trove.is_undercollateralized(asset),
            _ => false,
        }
    }

    /// Find every liquidatable trove, in creation order
    pub fn liquidatable_troves(&self) -> Vec<TroveKey> {
        self.troves()
            .into_iter()
            .filter(|trove| self.is_liquidatable(trove.key()))
            .map(|trove| trove.key().clone())
            .collect()
    }

    /// Liquidate one trove.
    ///
    /// The reserve goes to `caller`, or to the anonymous account when no
    /// caller is given.
    pub fn liquidate(&mut self, key: &TroveKey, caller: Option<AccountId>) -> Result<LiquidationOutcome> {
        let trove = self.trove(key)?;
        let asset = self.collateral_asset(&key.asset)?;
        if !trove.is_undercollateralized(asset) {
            return Err(Error::NotUndercollateralized {
                key: key.clone(),
                ratio: trove.collateral_ratio(asset),
            });
        }

        let liquidator = caller.unwrap_or(AccountId::Anonymous);
        self.execute_liquidation(key, &liquidator)
    }

    /// Liquidate every trove at or below its MCR.
    ///
    /// Candidates are snapshotted before any liquidation and each one is
    /// re-checked when its turn comes, since earlier liquidations in the same
    /// round move debt and collateral around. Rounds repeat until no
    /// candidate remains.
    pub(crate) fn liquidate_undercollateralized(&mut self) -> Result<Vec<LiquidationOutcome>> {
        let mut outcomes = Vec::new();

        loop {
            let candidates = self.liquidatable_troves();
            if candidates.is_empty() {
                break;
            }

            debug!(candidates = candidates.len(), "liquidation round");
            for key in candidates {
                if !self.is_liquidatable(&key) {
                    debug!(trove = %key, "trove recovered during sweep");
                    continue;
                }
                outcomes.push(self.execute_liquidation(&key, &AccountId::Anonymous)?);
            }
        }

        Ok(outcomes)
    }

    fn execute_liquidation(&mut self, key: &TroveKey, liquidator: &AccountId) -> Result<LiquidationOutcome> {
        let asset = self.assets
            .get_mut(&key.asset)
            .ok_or_else(|| Error::UnknownAsset(key.asset.clone()))?;
        let mut trove = self.troves
            .remove(key)
            .ok_or_else(|| Error::UnknownPosition(key.clone()))?;

        let account = trove.account();
        let ratio = trove.collateral_ratio(asset);
        let collateral = trove.collateral(asset);
        let debt = trove.debt().clone();
        let reserve = trove.liquidation_reserve().clone();

        self.stable.transfer(&account, liquidator, &reserve)?;
        self.total_debt -= &debt;
        let mut working_debt = &debt + &reserve;

        // Stability pool absorbs first
        let mut debt_to_pool = Decimal::zero();
        let mut collateral_to_pool = Decimal::zero();
        if let Some(offset) = self.stability_pool.plan_offset(&working_debt, &collateral)? {
            for share in &offset.shares {
                asset.transfer(&account, &share.staker, &share.collateral)?;
            }
            self.stability_pool.apply_offset(&offset);
            working_debt -= &offset.debt_offset;
            debt_to_pool = offset.debt_offset;
            collateral_to_pool = offset.collateral_released;
        }

        // Whatever is left goes to the surviving troves of the same asset
        let mut debt_redistributed = Decimal::zero();
        let mut collateral_redistributed = Decimal::zero();
        let mut debt_unabsorbed = Decimal::zero();
        let mut recipients = 0;
        if working_debt.is_positive() {
            let remaining = asset.balance_of(&account);
            let mut survivors: Vec<(u64, TroveKey, Decimal)> = self.troves
                .values()
                .filter(|survivor| survivor.key().asset == key.asset)
                .map(|survivor| (survivor.created_seq(), survivor.key().clone(), survivor.collateral(&*asset)))
                .collect();
            survivors.sort_by_key(|(seq, _, _)| *seq);
            let total_collateral: Decimal = survivors.iter().map(|(_, _, c)| c).sum();

            if total_collateral.is_zero() {
                warn!(
                    trove = %key,
                    debt = %working_debt,
                    collateral = %remaining,
                    "no surviving collateral to absorb liquidated debt"
                );
                debt_unabsorbed = working_debt.clone();
            } else {
                for (_, survivor_key, survivor_collateral) in survivors {
                    let prorata = survivor_collateral.div(&total_collateral, DIVISION_SCALE, RoundingMode::HalfEven)?;
                    let debt_share = &working_debt * &prorata;
                    let collateral_share = &remaining * &prorata;

                    asset.transfer(&account, &AccountId::trove(&survivor_key), &collateral_share)?;
                    if let Some(survivor) = self.troves.get_mut(&survivor_key) {
                        survivor.add_debt(&debt_share);
                    }
                    self.total_debt += &debt_share;

                    debt_redistributed += debt_share;
                    collateral_redistributed += collateral_share;
                    recipients += 1;
                }
            }
        }

        trove.close_liquidated();
        let residual_collateral = asset.balance_of(&account);

        info!(
            trove = %key,
            %liquidator,
            %ratio,
            %debt,
            %debt_to_pool,
            %debt_redistributed,
            recipients,
            "trove liquidated"
        );

        let outcome = LiquidationOutcome {
            trove,
            liquidator: liquidator.clone(),
            ratio,
            debt,
            collateral,
            reserve_paid: reserve,
            debt_to_pool,
            collateral_to_pool,
            debt_redistributed,
            collateral_redistributed,
            recipients,
            debt_unabsorbed,
            residual_collateral,
        };
        self.liquidations.record(outcome.clone());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::trove::TroveStatus;
    use crate::core::types::AssetSymbol;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn wewt() -> AssetSymbol {
        AssetSymbol::from("WEWT")
    }

    fn beur() -> AssetSymbol {
        AssetSymbol::from("BEUR")
    }

    /// Open a WEWT trove with `collateral` units and borrow `amount`
    fn open(registry: &mut Registry, owner: &str, collateral: &str, amount: &str) -> TroveKey {
        let key = registry.create_trove(owner, &wewt()).unwrap();
        registry
            .deposit_collateral(&key, &AccountId::Mint, &d(collateral))
            .unwrap();
        registry.borrow(&key, &d(amount)).unwrap();
        key
    }

    fn registry() -> Registry {
        let mut registry = Registry::default();
        registry.stake_fee_asset(&AccountId::user("staker"), &d("1")).unwrap();
        registry
    }

    #[test]
    fn test_cannot_liquidate_healthy_trove() {
        let mut registry = registry();
        let key = open(&mut registry, "alice", "100", "500");

        let result = registry.liquidate(&key, None);

        assert!(matches!(result, Err(Error::NotUndercollateralized { .. })));
        assert_eq!(registry.open_trove_count(), 1);
    }

    #[test]
    fn test_zero_debt_trove_is_exempt() {
        let mut registry = registry();
        let key = registry.create_trove("alice", &wewt()).unwrap();

        assert!(!registry.is_liquidatable(&key));
        assert!(matches!(
            registry.liquidate(&key, None),
            Err(Error::NotUndercollateralized { .. })
        ));
    }

    #[test]
    fn test_liquidate_to_stability_pool() {
        let mut registry = registry();
        let key = open(&mut registry, "alice", "100", "800");
        let depositor = AccountId::user("depositor");
        registry.transfer(&beur(), &AccountId::Mint, &depositor, &d("10000")).unwrap();
        registry.stake_stability_pool(&depositor, &d("10000")).unwrap();

        // debt 804 + reserve 1 against 100 WEWT at 8 = 800
        registry.asset_price_for_test(&wewt(), d("8"));
        let outcome = registry.liquidate(&key, Some(AccountId::user("keeper"))).unwrap();

        assert_eq!(outcome.debt_to_pool, d("805"));
        assert_eq!(outcome.collateral_to_pool, d("100"));
        assert!(!outcome.redistributed());
        assert_eq!(outcome.trove.status(), TroveStatus::Liquidated);
        assert_eq!(registry.pool_stake_of(&depositor), d("9195"));
        assert_eq!(registry.balance(&wewt(), &depositor).unwrap(), d("100"));
        assert_eq!(registry.balance(&beur(), &AccountId::user("keeper")).unwrap(), d("1"));
        assert!(registry.total_debt().is_zero());
        assert!(matches!(registry.trove(&key), Err(Error::UnknownPosition(_))));
    }

    #[test]
    fn test_liquidate_redistributes_to_survivors() {
        let mut registry = registry();
        let a = open(&mut registry, "a", "100", "600");
        let b = open(&mut registry, "b", "100", "200");
        let c = open(&mut registry, "c", "300", "200");

        registry.asset_price_for_test(&wewt(), d("7.236"));
        let outcome = registry.liquidate(&a, None).unwrap();

        // 603 debt + 1 reserve split 1:3 between b and c
        assert_eq!(outcome.recipients, 2);
        assert_eq!(outcome.debt_redistributed, d("604"));
        assert_eq!(registry.trove(&b).unwrap().debt(), &d("352"));
        assert_eq!(registry.trove(&c).unwrap().debt(), &d("654"));
        assert_eq!(registry.collateral_of(&b).unwrap(), d("125"));
        assert_eq!(registry.collateral_of(&c).unwrap(), d("375"));
        assert_eq!(registry.balance(&beur(), &AccountId::Anonymous).unwrap(), d("1"));
        assert_eq!(registry.total_debt(), &d("1006"));
    }

    #[test]
    fn test_pool_overflow_goes_to_survivors() {
        let mut registry = registry();
        let a = open(&mut registry, "a", "100", "600");
        let b = open(&mut registry, "b", "100", "100");
        let depositor = AccountId::user("depositor");
        registry.transfer(&beur(), &AccountId::Mint, &depositor, &d("302")).unwrap();
        registry.stake_stability_pool(&depositor, &d("302")).unwrap();

        registry.asset_price_for_test(&wewt(), d("7.236"));
        let outcome = registry.liquidate(&a, None).unwrap();

        // pool takes half of 604, b takes the rest
        assert_eq!(outcome.debt_to_pool, d("302"));
        assert_eq!(outcome.collateral_to_pool, d("50"));
        assert_eq!(outcome.debt_redistributed, d("302"));
        assert!(registry.pool_stake_of(&depositor).is_zero());
        assert_eq!(registry.trove(&b).unwrap().debt(), &d("402.5"));
        assert_eq!(registry.collateral_of(&b).unwrap(), d("150"));
    }

    #[test]
    fn test_last_trove_debt_is_unabsorbed() {
        let mut registry = registry();
        let key = open(&mut registry, "alice", "100", "800");

        registry.asset_price_for_test(&wewt(), d("1"));
        let outcome = registry.liquidate(&key, None).unwrap();

        assert_eq!(outcome.debt_unabsorbed, d("805"));
        assert_eq!(outcome.residual_collateral, d("100"));
        assert!(registry.total_debt().is_zero());
    }

    #[test]
    fn test_collateral_is_conserved() {
        let mut registry = registry();
        let a = open(&mut registry, "a", "100", "700");
        open(&mut registry, "b", "70", "100");
        open(&mut registry, "c", "30", "100");
        let depositor = AccountId::user("depositor");
        registry.transfer(&beur(), &AccountId::Mint, &depositor, &d("333")).unwrap();
        registry.stake_stability_pool(&depositor, &d("333")).unwrap();

        registry.asset_price_for_test(&wewt(), d("8"));
        let outcome = registry.liquidate(&a, None).unwrap();

        let accounted = &outcome.collateral_to_pool
            + &outcome.collateral_redistributed
            + &outcome.residual_collateral;
        let error = (accounted - &outcome.collateral).abs();
        assert!(error < Decimal::new(1, 100));
    }

    #[test]
    fn test_history_is_recorded() {
        let mut registry = registry();
        let key = open(&mut registry, "alice", "100", "800");
        open(&mut registry, "bob", "100", "100");

        registry.asset_price_for_test(&wewt(), d("8"));
        registry.liquidate(&key, None).unwrap();

        let engine = registry.liquidations();
        assert_eq!(engine.total_liquidations(), 1);
        assert_eq!(engine.events_for_trove(&key).len(), 1);
        assert_eq!(engine.total_debt_liquidated(), &d("805"));
        assert_eq!(engine.statistics().redistribution_count, 1);
    }

    impl Registry {
        /// Move a price without triggering the sweep
        fn asset_price_for_test(&mut self, symbol: &AssetSymbol, price: Decimal) {
            self.assets.get_mut(symbol).unwrap().set_price(price);
        }
    }
}
