//! Asset ledger.
//!
//! Every asset (the stable asset, the fee asset and each collateral asset) is
//! an [`Asset`]: a reference price, a minimum collateralization ratio and a
//! balance book with a running total supply.
//!
//! There is no dedicated mint call. A transfer whose sender holds less than
//! the amount credits the recipient in full, floors the sender at zero and
//! adds the shortfall to total supply. Sending from [`AccountId::Mint`] is
//! therefore how new units are issued.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::config::AssetConfig;
use crate::core::types::{AccountId, AssetSymbol};
use crate::error::{Error, Result};
use crate::utils::constants::{BPS_SCALE, DEFAULT_MCR_BPS};
use crate::utils::math::Decimal;

/// An asset with its price parameters and balance book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Short ticker
    pub symbol: AssetSymbol,
    /// Human readable name
    pub name: String,
    /// Reference price in the common unit of account
    price: Decimal,
    /// Minimum collateralization ratio for troves backed by this asset
    mcr: Decimal,
    /// Balances by account
    balances: BTreeMap<AccountId, Decimal>,
    /// Units issued minus units burned
    total_supply: Decimal,
}

impl Asset {
    /// Create an asset with the default MCR
    pub fn new(symbol: impl Into<AssetSymbol>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            price,
            mcr: Decimal::new(DEFAULT_MCR_BPS, BPS_SCALE),
            balances: BTreeMap::new(),
            total_supply: Decimal::zero(),
        }
    }

    /// Create an asset from its configuration
    pub fn from_config(config: &AssetConfig) -> Self {
        Self::new(config.symbol.clone(), config.name.clone(), config.price.clone())
            .with_mcr(config.mcr.clone())
    }

    /// Override the minimum collateralization ratio
    pub fn with_mcr(mut self, mcr: Decimal) -> Self {
        self.mcr = mcr;
        self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PRICE PARAMETERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current reference price
    pub fn price(&self) -> &Decimal {
        &self.price
    }

    /// Minimum collateralization ratio
    pub fn mcr(&self) -> &Decimal {
        &self.mcr
    }

    pub(crate) fn set_price(&mut self, price: Decimal) {
        self.price = price;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BALANCES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Balance of an account (zero if never referenced)
    pub fn balance_of(&self, account: &AccountId) -> Decimal {
        self.balances.get(account).cloned().unwrap_or_default()
    }

    /// Total supply
    pub fn total_supply(&self) -> &Decimal {
        &self.total_supply
    }

    /// Iterate over every referenced account and its balance
    pub fn holders(&self) -> impl Iterator<Item = (&AccountId, &Decimal)> {
        self.balances.iter()
    }

    /// Sum of every balance (differs from total supply only by floor effects)
    pub fn sum_of_balances(&self) -> Decimal {
        self.balances.values().sum()
    }

    /// Move `amount` from `sender` to `recipient`, issuing any shortfall.
    ///
    /// Returns the amount newly issued because the sender was short.
    pub fn transfer(&mut self, sender: &AccountId, recipient: &AccountId, amount: &Decimal) -> Result<Decimal> {
        if amount.is_negative() {
            return Err(Error::InvalidAmount {
                operation: "transfer",
                amount: amount.clone(),
            });
        }

        let sender_balance = self.balance_of(sender);
        let remaining = &sender_balance - amount;
        let minted = if remaining.is_negative() {
            remaining.abs()
        } else {
            Decimal::zero()
        };
        self.total_supply += &minted;
        self.balances.insert(sender.clone(), remaining.max(Decimal::zero()));

        let recipient_balance = self.balance_of(recipient);
        self.balances.insert(recipient.clone(), recipient_balance + amount);

        debug!(
            asset = %self.symbol,
            from = %sender,
            to = %recipient,
            %amount,
            %minted,
            "transfer"
        );
        Ok(minted)
    }

    /// Destroy `amount` held by `sender`
    pub fn burn(&mut self, sender: &AccountId, amount: &Decimal) -> Result<()> {
        if amount.is_negative() {
            return Err(Error::InvalidAmount {
                operation: "burn",
                amount: amount.clone(),
            });
        }

        let available = self.balance_of(sender);
        if &available < amount {
            return Err(Error::InsufficientBalance {
                asset: self.symbol.clone(),
                account: sender.clone(),
                required: amount.clone(),
                available,
            });
        }

        self.balances.insert(sender.clone(), available - amount);
        self.total_supply -= amount;

        debug!(asset = %self.symbol, from = %sender, %amount, "burn");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn beur() -> Asset {
        Asset::new("BEUR", "BONQ EUR", d("1.0"))
    }

    #[test]
    fn test_mint_via_transfer() {
        let mut token = beur();
        let alice = AccountId::user("alice");

        let minted = token.transfer(&AccountId::Mint, &alice, &d("1000")).unwrap();

        assert_eq!(minted, d("1000"));
        assert_eq!(token.balance_of(&alice), d("1000"));
        assert_eq!(token.balance_of(&AccountId::Mint), Decimal::zero());
        assert_eq!(token.total_supply(), &d("1000"));
    }

    #[test]
    fn test_transfer() {
        let mut token = beur();
        let alice = AccountId::user("alice");
        let bob = AccountId::user("bob");

        token.transfer(&AccountId::Mint, &alice, &d("1000")).unwrap();
        let minted = token.transfer(&alice, &bob, &d("300")).unwrap();

        assert!(minted.is_zero());
        assert_eq!(token.balance_of(&alice), d("700"));
        assert_eq!(token.balance_of(&bob), d("300"));
        assert_eq!(token.total_supply(), &d("1000"));
    }

    #[test]
    fn test_underfunded_transfer_mints_shortfall() {
        let mut token = beur();
        let alice = AccountId::user("alice");
        let bob = AccountId::user("bob");

        token.transfer(&AccountId::Mint, &alice, &d("100")).unwrap();
        let minted = token.transfer(&alice, &bob, &d("250")).unwrap();

        assert_eq!(minted, d("150"));
        assert_eq!(token.balance_of(&alice), Decimal::zero());
        assert_eq!(token.balance_of(&bob), d("250"));
        assert_eq!(token.total_supply(), &d("250"));
    }

    #[test]
    fn test_negative_transfer_rejected() {
        let mut token = beur();
        let result = token.transfer(&AccountId::Mint, &AccountId::user("alice"), &d("-1"));
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        assert!(token.total_supply().is_zero());
    }

    #[test]
    fn test_burn() {
        let mut token = beur();
        let owner = AccountId::user("alice");

        token.transfer(&AccountId::Mint, &owner, &d("1000")).unwrap();
        token.burn(&owner, &d("400")).unwrap();

        assert_eq!(token.balance_of(&owner), d("600"));
        assert_eq!(token.total_supply(), &d("600"));
    }

    #[test]
    fn test_burn_insufficient_balance() {
        let mut token = beur();
        let owner = AccountId::user("alice");

        token.transfer(&AccountId::Mint, &owner, &d("100")).unwrap();
        let result = token.burn(&owner, &d("200"));

        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
        assert_eq!(token.balance_of(&owner), d("100"));
        assert_eq!(token.total_supply(), &d("100"));
    }

    #[test]
    fn test_supply_matches_balances_without_shortfalls() {
        let mut token = beur();
        let alice = AccountId::user("alice");
        let bob = AccountId::user("bob");

        token.transfer(&AccountId::Mint, &alice, &d("1000")).unwrap();
        token.transfer(&AccountId::Mint, &bob, &d("500")).unwrap();
        token.transfer(&alice, &bob, &d("200")).unwrap();
        token.burn(&bob, &d("100")).unwrap();

        assert_eq!(token.sum_of_balances(), *token.total_supply());
    }

    proptest! {
        #[test]
        fn prop_balances_never_negative(ops in proptest::collection::vec((0usize..3, 0usize..3, 0i64..10_000), 1..40)) {
            let accounts = [AccountId::Mint, AccountId::user("a"), AccountId::user("b")];
            let mut token = beur();
            for (from, to, cents) in ops {
                let amount = Decimal::new(cents, 2);
                token.transfer(&accounts[from], &accounts[to], &amount).unwrap();
                let _ = token.burn(&accounts[to], &Decimal::new(cents / 2, 2));
            }
            for (_, balance) in token.holders() {
                prop_assert!(!balance.is_negative());
            }
        }
    }
}
