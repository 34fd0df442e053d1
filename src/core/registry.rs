//! Protocol registry.
//!
//! The [`Registry`] is the single authoritative state of the engine: the
//! stable asset, every collateral asset, the open troves, both staking books
//! and the global debt and fee totals. Every public operation validates its
//! inputs against the current state first and only then mutates, so a call
//! that returns an error leaves the registry untouched.
//!
//! The liquidation algorithm and the price-triggered sweep live in
//! [`crate::liquidation::engine`] as a further `impl Registry` block.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

use crate::core::config::{AssetConfig, ProtocolConfig};
use crate::core::fees::{FeeShare, FeeStakes};
use crate::core::token::Asset;
use crate::core::trove::{Trove, TroveState};
use crate::core::types::{AccountId, AssetSymbol, TroveKey};
use crate::error::{Error, Result};
use crate::liquidation::engine::{LiquidationEngine, LiquidationOutcome};
use crate::liquidation::stability_pool::StabilityPool;
use crate::utils::math::Decimal;

fn ensure_positive(operation: &'static str, amount: &Decimal) -> Result<()> {
    if !amount.is_positive() {
        return Err(Error::InvalidAmount {
            operation,
            amount: amount.clone(),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECEIPTS AND STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a successful borrow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowReceipt {
    /// Trove that borrowed
    pub key: TroveKey,
    /// Stable units paid out to the owner
    pub amount: Decimal,
    /// Fee added to the debt and distributed to fee stakers
    pub fee: Decimal,
    /// Liquidation reserve set aside by this borrow (zero after the first)
    pub reserve: Decimal,
    /// Trove debt after the borrow
    pub debt: Decimal,
    /// Trove ratio after the borrow
    pub ratio: Decimal,
}

/// Aggregate registry figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub open_troves: usize,
    pub total_debt: Decimal,
    pub fees_paid: Decimal,
    pub total_fee_stake: Decimal,
    pub total_pool_stake: Decimal,
    pub stable_supply: Decimal,
    pub liquidations: u64,
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "troves={} debt={} fees={} fee_stake={} pool_stake={} supply={} liquidations={}",
            self.open_troves,
            self.total_debt,
            self.fees_paid,
            self.total_fee_stake,
            self.total_pool_stake,
            self.stable_supply,
            self.liquidations
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Owner of every asset, trove and stake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    pub(crate) config: ProtocolConfig,
    /// The stable asset borrowed against collateral
    pub(crate) stable: Asset,
    /// Symbol of the fee asset (held in `assets`)
    pub(crate) fee_asset: AssetSymbol,
    /// Collateral assets by symbol
    pub(crate) assets: BTreeMap<AssetSymbol, Asset>,
    /// Open troves
    pub(crate) troves: BTreeMap<TroveKey, Trove>,
    pub(crate) fee_stakes: FeeStakes,
    pub(crate) stability_pool: StabilityPool,
    /// Sum of every open trove's debt
    pub(crate) total_debt: Decimal,
    /// Sum of every fee ever charged
    pub(crate) fees_paid: Decimal,
    pub(crate) next_trove_seq: u64,
    pub(crate) liquidations: LiquidationEngine,
}

impl Default for Registry {
    fn default() -> Self {
        Self::assemble(ProtocolConfig::default())
    }
}

impl Registry {
    /// Create a registry from a validated configuration
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config))
    }

    fn assemble(config: ProtocolConfig) -> Self {
        let stable = Asset::from_config(&config.stable_asset);
        let fee_asset = config.fee_asset.symbol.clone();
        let assets = std::iter::once(&config.fee_asset)
            .chain(config.collateral_assets.iter())
            .map(|asset| (asset.symbol.clone(), Asset::from_config(asset)))
            .collect();

        Self {
            config,
            stable,
            fee_asset,
            assets,
            troves: BTreeMap::new(),
            fee_stakes: FeeStakes::new(),
            stability_pool: StabilityPool::new(),
            total_debt: Decimal::zero(),
            fees_paid: Decimal::zero(),
            next_trove_seq: 0,
            liquidations: LiquidationEngine::new(),
        }
    }

    /// Configuration the registry was created from
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ASSETS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add a collateral asset
    pub fn register_asset(&mut self, config: AssetConfig) -> Result<()> {
        config.validate()?;
        if config.symbol == self.stable.symbol || self.assets.contains_key(&config.symbol) {
            return Err(Error::AssetAlreadyExists(config.symbol));
        }

        info!(asset = %config.symbol, price = %config.price, mcr = %config.mcr, "asset registered");
        self.assets.insert(config.symbol.clone(), Asset::from_config(&config));
        Ok(())
    }

    /// The stable asset
    pub fn stable(&self) -> &Asset {
        &self.stable
    }

    /// Symbol of the fee asset
    pub fn fee_asset_symbol(&self) -> &AssetSymbol {
        &self.fee_asset
    }

    /// Any asset, the stable asset included
    pub fn asset(&self, symbol: &AssetSymbol) -> Result<&Asset> {
        if symbol == &self.stable.symbol {
            return Ok(&self.stable);
        }
        self.assets
            .get(symbol)
            .ok_or_else(|| Error::UnknownAsset(symbol.clone()))
    }

    /// A collateral asset
    pub fn collateral_asset(&self, symbol: &AssetSymbol) -> Result<&Asset> {
        if symbol == &self.stable.symbol {
            return Err(Error::NotCollateralAsset(symbol.clone()));
        }
        self.assets
            .get(symbol)
            .ok_or_else(|| Error::UnknownAsset(symbol.clone()))
    }

    /// Every collateral asset
    pub fn collateral_assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    fn asset_mut(&mut self, symbol: &AssetSymbol) -> Result<&mut Asset> {
        if symbol == &self.stable.symbol {
            return Ok(&mut self.stable);
        }
        self.assets
            .get_mut(symbol)
            .ok_or_else(|| Error::UnknownAsset(symbol.clone()))
    }

    /// Move units of any asset between accounts, issuing any shortfall.
    ///
    /// Returns the amount newly issued.
    pub fn transfer(
        &mut self,
        symbol: &AssetSymbol,
        from: &AccountId,
        to: &AccountId,
        amount: &Decimal,
    ) -> Result<Decimal> {
        self.asset_mut(symbol)?.transfer(from, to, amount)
    }

    /// Balance of an account in any asset
    pub fn balance(&self, symbol: &AssetSymbol, account: &AccountId) -> Result<Decimal> {
        Ok(self.asset(symbol)?.balance_of(account))
    }

    /// Update an asset's price and liquidate every trove left at or below
    /// its asset's MCR.
    pub fn set_asset_price(&mut self, symbol: &AssetSymbol, price: Decimal) -> Result<Vec<LiquidationOutcome>> {
        ensure_positive("set_asset_price", &price)?;

        info!(asset = %symbol, %price, "price update");
        self.asset_mut(symbol)?.set_price(price);
        self.liquidate_undercollateralized()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TROVES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Open an empty trove for `owner` against a collateral asset
    pub fn create_trove(&mut self, owner: &str, symbol: &AssetSymbol) -> Result<TroveKey> {
        self.collateral_asset(symbol)?;

        let key = TroveKey::new(owner, symbol.clone());
        if self.troves.contains_key(&key) {
            return Err(Error::DuplicatePosition(key));
        }

        let trove = Trove::new(key.clone(), self.next_trove_seq);
        self.next_trove_seq += 1;
        self.troves.insert(key.clone(), trove);

        info!(trove = %key, "trove created");
        Ok(key)
    }

    /// An open trove
    pub fn trove(&self, key: &TroveKey) -> Result<&Trove> {
        self.troves
            .get(key)
            .ok_or_else(|| Error::UnknownPosition(key.clone()))
    }

    /// Open troves in creation order
    pub fn troves(&self) -> Vec<&Trove> {
        let mut troves: Vec<&Trove> = self.troves.values().collect();
        troves.sort_by_key(|trove| trove.created_seq());
        troves
    }

    /// Number of open troves
    pub fn open_trove_count(&self) -> usize {
        self.troves.len()
    }

    /// Collateral held by a trove
    pub fn collateral_of(&self, key: &TroveKey) -> Result<Decimal> {
        let trove = self.trove(key)?;
        Ok(trove.collateral(self.collateral_asset(&key.asset)?))
    }

    /// Collateralization ratio of a trove
    pub fn collateral_ratio(&self, key: &TroveKey) -> Result<Decimal> {
        let trove = self.trove(key)?;
        Ok(trove.collateral_ratio(self.collateral_asset(&key.asset)?))
    }

    /// Priced snapshot of a trove
    pub fn trove_state(&self, key: &TroveKey) -> Result<TroveState> {
        let trove = self.trove(key)?;
        Ok(trove.state(self.collateral_asset(&key.asset)?))
    }

    /// Move collateral from `from` into a trove's sub-account
    pub fn deposit_collateral(&mut self, key: &TroveKey, from: &AccountId, amount: &Decimal) -> Result<Decimal> {
        ensure_positive("deposit_collateral", amount)?;

        let trove = self.troves
            .get(key)
            .ok_or_else(|| Error::UnknownPosition(key.clone()))?;
        trove.ensure_open()?;
        let account = trove.account();

        let asset = self.assets
            .get_mut(&key.asset)
            .ok_or_else(|| Error::UnknownAsset(key.asset.clone()))?;
        let minted = asset.transfer(from, &account, amount)?;

        debug!(trove = %key, %from, %amount, "collateral deposited");
        Ok(minted)
    }

    /// Borrow stable units against a trove's collateral.
    ///
    /// The fee is added to the debt and shared among fee stakers. The first
    /// borrow of a trove also sets aside the liquidation reserve in its
    /// sub-account.
    pub fn borrow(&mut self, key: &TroveKey, amount: &Decimal) -> Result<BorrowReceipt> {
        let trove = self.trove(key)?;
        let asset = self.collateral_asset(&key.asset)?;
        trove.check_borrow(asset, amount)?;

        let fee = amount * &self.config.borrow_fee_rate;
        let fee_shares = self.fee_stakes.shares(&fee)?;
        let needs_reserve = trove.liquidation_reserve().is_zero();
        let reserve = if needs_reserve {
            self.config.liquidation_reserve.clone()
        } else {
            Decimal::zero()
        };
        let account = trove.account();
        let owner = trove.owner_account();

        if needs_reserve {
            self.stable.transfer(&AccountId::Mint, &account, &reserve)?;
        }
        self.stable.transfer(&AccountId::Mint, &owner, amount)?;

        let trove = self.troves
            .get_mut(key)
            .ok_or_else(|| Error::UnknownPosition(key.clone()))?;
        if needs_reserve {
            trove.set_liquidation_reserve(reserve.clone());
        }
        let charged = amount + &fee;
        trove.add_debt(&charged);
        let debt = trove.debt().clone();

        self.total_debt += &charged;
        self.pay_fees(&fee, fee_shares)?;

        let ratio = self.collateral_ratio(key)?;
        info!(trove = %key, %amount, %fee, %debt, %ratio, "borrow");

        Ok(BorrowReceipt {
            key: key.clone(),
            amount: amount.clone(),
            fee,
            reserve,
            debt,
            ratio,
        })
    }

    /// Repay up to `amount` of a trove's debt from the owner's stable balance.
    ///
    /// Returns the amount actually repaid. Repaying the last of the debt also
    /// burns the liquidation reserve.
    pub fn repay(&mut self, key: &TroveKey, amount: &Decimal) -> Result<Decimal> {
        ensure_positive("repay", amount)?;

        let trove = self.trove(key)?;
        trove.ensure_open()?;

        let repaid = trove.debt().clone().min(amount.clone());
        let clears = trove.debt() == &repaid;
        let reserve = trove.liquidation_reserve().clone();
        let owner = trove.owner_account();
        let account = trove.account();

        let available = self.stable.balance_of(&owner);
        if available < repaid {
            return Err(Error::InsufficientBalance {
                asset: self.stable.symbol.clone(),
                account: owner,
                required: repaid,
                available,
            });
        }
        if clears {
            let held = self.stable.balance_of(&account);
            if held < reserve {
                return Err(Error::InsufficientBalance {
                    asset: self.stable.symbol.clone(),
                    account,
                    required: reserve,
                    available: held,
                });
            }
        }

        self.stable.burn(&owner, &repaid)?;
        if clears {
            self.stable.burn(&account, &reserve)?;
        }

        let trove = self.troves
            .get_mut(key)
            .ok_or_else(|| Error::UnknownPosition(key.clone()))?;
        trove.reduce_debt(&repaid);
        if clears {
            trove.set_liquidation_reserve(Decimal::zero());
        }
        self.total_debt -= &repaid;

        info!(trove = %key, requested = %amount, %repaid, cleared = clears, "repay");
        Ok(repaid)
    }

    /// Sum of collateral held by every open trove of an asset
    pub fn total_collateral(&self, symbol: &AssetSymbol) -> Result<Decimal> {
        let asset = self.collateral_asset(symbol)?;
        Ok(self.troves
            .values()
            .filter(|trove| &trove.key().asset == symbol)
            .map(|trove| trove.collateral(asset))
            .sum())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FEES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record `fee` and pay it out to fee stakers as new stable units
    pub fn distribute_fees(&mut self, fee: &Decimal) -> Result<()> {
        if fee.is_negative() {
            return Err(Error::InvalidAmount {
                operation: "distribute_fees",
                amount: fee.clone(),
            });
        }

        let shares = self.fee_stakes.shares(fee)?;
        self.pay_fees(fee, shares)
    }

    fn pay_fees(&mut self, fee: &Decimal, shares: Vec<FeeShare>) -> Result<()> {
        self.fees_paid += fee;
        for share in &shares {
            self.stable.transfer(&AccountId::Mint, &share.staker, &share.amount)?;
        }

        debug!(%fee, stakers = shares.len(), "fees distributed");
        Ok(())
    }

    /// Stake fee-asset units with the registry
    pub fn stake_fee_asset(&mut self, staker: &AccountId, amount: &Decimal) -> Result<()> {
        ensure_positive("stake_fee_asset", amount)?;

        let asset = self.assets
            .get_mut(&self.fee_asset)
            .ok_or_else(|| Error::UnknownAsset(self.fee_asset.clone()))?;
        asset.transfer(staker, &AccountId::Registry, amount)?;
        self.fee_stakes.stake(staker, amount);

        debug!(%staker, %amount, "fee asset staked");
        Ok(())
    }

    /// Unstake up to `amount` of fee-asset units; returns what was unstaked
    pub fn unstake_fee_asset(&mut self, staker: &AccountId, amount: &Decimal) -> Result<Decimal> {
        ensure_positive("unstake_fee_asset", amount)?;

        let actual = self.fee_stakes.clamped(staker, amount);
        let asset = self.assets
            .get_mut(&self.fee_asset)
            .ok_or_else(|| Error::UnknownAsset(self.fee_asset.clone()))?;
        asset.transfer(&AccountId::Registry, staker, &actual)?;
        self.fee_stakes.unstake(staker, &actual);

        debug!(%staker, requested = %amount, unstaked = %actual, "fee asset unstaked");
        Ok(actual)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STABILITY POOL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Stake stable units into the stability pool. Repeated stakes add up.
    pub fn stake_stability_pool(&mut self, staker: &AccountId, amount: &Decimal) -> Result<()> {
        ensure_positive("stake_stability_pool", amount)?;

        self.stable.transfer(staker, &AccountId::Registry, amount)?;
        self.stability_pool.deposit(staker, amount);

        debug!(%staker, %amount, "stability pool stake");
        Ok(())
    }

    /// Withdraw up to `amount` from the stability pool; returns what was withdrawn
    pub fn unstake_stability_pool(&mut self, staker: &AccountId, amount: &Decimal) -> Result<Decimal> {
        ensure_positive("unstake_stability_pool", amount)?;

        let actual = self.stability_pool.stake_of(staker).min(amount.clone());
        self.stable.transfer(&AccountId::Registry, staker, &actual)?;
        self.stability_pool.withdraw(staker, &actual);

        debug!(%staker, requested = %amount, withdrawn = %actual, "stability pool unstake");
        Ok(actual)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Sum of every open trove's debt
    pub fn total_debt(&self) -> &Decimal {
        &self.total_debt
    }

    /// Sum of every fee charged
    pub fn fees_paid(&self) -> &Decimal {
        &self.fees_paid
    }

    /// Fee staking book
    pub fn fee_stakes(&self) -> &FeeStakes {
        &self.fee_stakes
    }

    /// Sum of fee-asset stakes
    pub fn total_fee_stake(&self) -> Decimal {
        self.fee_stakes.total()
    }

    /// Fee-asset stake of one staker
    pub fn fee_stake_of(&self, staker: &AccountId) -> Decimal {
        self.fee_stakes.stake_of(staker)
    }

    /// The stability pool
    pub fn stability_pool(&self) -> &StabilityPool {
        &self.stability_pool
    }

    /// Sum of stability-pool stakes
    pub fn total_pool_stake(&self) -> Decimal {
        self.stability_pool.total_stake()
    }

    /// Stability-pool stake of one staker
    pub fn pool_stake_of(&self, staker: &AccountId) -> Decimal {
        self.stability_pool.stake_of(staker)
    }

    /// Liquidation history and totals
    pub fn liquidations(&self) -> &LiquidationEngine {
        &self.liquidations
    }

    /// Aggregate figures
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            open_troves: self.troves.len(),
            total_debt: self.total_debt.clone(),
            fees_paid: self.fees_paid.clone(),
            total_fee_stake: self.total_fee_stake(),
            total_pool_stake: self.total_pool_stake(),
            stable_supply: self.stable.total_supply().clone(),
            liquidations: self.liquidations.total_liquidations(),
        }
    }
}
