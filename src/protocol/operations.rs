//! Protocol operations.
//!
//! Every public mutating call on the [`Registry`] has an [`Operation`]
//! counterpart so that a whole session can be described as data, stored as
//! JSON and replayed. A [`Scenario`] bundles a configuration with a list of
//! operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::core::config::ProtocolConfig;
use crate::core::registry::{BorrowReceipt, Registry};
use crate::core::types::{AccountId, AssetSymbol, TroveKey};
use crate::error::{Error, Result};
use crate::liquidation::engine::LiquidationOutcome;
use crate::utils::math::Decimal;

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATION
// ═══════════════════════════════════════════════════════════════════════════════

/// A single state change against the registry.
///
/// Account names follow the ledger convention: `"mint"` and `"anonymous"`
/// are the reserved accounts, anything else is a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Open an empty trove
    CreateTrove { owner: String, asset: AssetSymbol },
    /// Move collateral into a trove (from the owner unless `from` is given)
    DepositCollateral {
        owner: String,
        asset: AssetSymbol,
        amount: Decimal,
        #[serde(default)]
        from: Option<String>,
    },
    /// Borrow stable units
    Borrow { owner: String, asset: AssetSymbol, amount: Decimal },
    /// Repay debt from the owner's stable balance
    Repay { owner: String, asset: AssetSymbol, amount: Decimal },
    /// Liquidate a trove explicitly
    Liquidate {
        owner: String,
        asset: AssetSymbol,
        #[serde(default)]
        caller: Option<String>,
    },
    /// Update a price and run the liquidation sweep
    SetPrice { asset: AssetSymbol, price: Decimal },
    /// Ledger transfer on any asset
    Transfer { asset: AssetSymbol, from: String, to: String, amount: Decimal },
    /// Pay out a fee to fee stakers
    DistributeFees { fee: Decimal },
    /// Stake the fee asset
    StakeFee { staker: String, amount: Decimal },
    /// Unstake the fee asset
    UnstakeFee { staker: String, amount: Decimal },
    /// Stake stable units into the stability pool
    StakePool { staker: String, amount: Decimal },
    /// Withdraw stable units from the stability pool
    UnstakePool { staker: String, amount: Decimal },
}

impl Operation {
    /// Get the operation type name
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::CreateTrove { .. } => "CreateTrove",
            Self::DepositCollateral { .. } => "DepositCollateral",
            Self::Borrow { .. } => "Borrow",
            Self::Repay { .. } => "Repay",
            Self::Liquidate { .. } => "Liquidate",
            Self::SetPrice { .. } => "SetPrice",
            Self::Transfer { .. } => "Transfer",
            Self::DistributeFees { .. } => "DistributeFees",
            Self::StakeFee { .. } => "StakeFee",
            Self::UnstakeFee { .. } => "UnstakeFee",
            Self::StakePool { .. } => "StakePool",
            Self::UnstakePool { .. } => "UnstakePool",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATION OUTCOME
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of any operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OperationOutcome {
    /// A trove was opened
    TroveCreated { key: TroveKey },
    /// Collateral moved into a trove
    CollateralDeposited { key: TroveKey, minted: Decimal },
    /// Stable units were borrowed
    Borrowed { receipt: BorrowReceipt },
    /// Debt was repaid
    Repaid { key: TroveKey, repaid: Decimal },
    /// A trove was liquidated explicitly
    Liquidated { liquidation: Box<LiquidationOutcome> },
    /// A price moved, possibly liquidating troves
    PriceSet { asset: AssetSymbol, liquidations: Vec<LiquidationOutcome> },
    /// A ledger transfer happened
    Transferred { minted: Decimal },
    /// A fee was paid out
    FeesDistributed { fee: Decimal },
    /// A stake was added
    Staked { staker: AccountId, amount: Decimal },
    /// A stake was removed
    Unstaked { staker: AccountId, amount: Decimal },
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TroveCreated { key } => write!(f, "trove {} created", key),
            Self::CollateralDeposited { key, minted } if minted.is_positive() => {
                write!(f, "collateral deposited into {} ({} issued)", key, minted)
            }
            Self::CollateralDeposited { key, .. } => write!(f, "collateral deposited into {}", key),
            Self::Borrowed { receipt } => write!(
                f,
                "{} borrowed {} (fee {}, debt {}, ratio {})",
                receipt.key,
                receipt.amount,
                receipt.fee,
                receipt.debt,
                receipt.ratio.round(6, Default::default())
            ),
            Self::Repaid { key, repaid } => write!(f, "{} repaid {}", key, repaid),
            Self::Liquidated { liquidation } => write!(
                f,
                "{} liquidated by {} (pool {}, redistributed {})",
                liquidation.key(),
                liquidation.liquidator,
                liquidation.debt_to_pool,
                liquidation.debt_redistributed
            ),
            Self::PriceSet { asset, liquidations } => write!(
                f,
                "{} price set, {} trove(s) liquidated",
                asset,
                liquidations.len()
            ),
            Self::Transferred { minted } => write!(f, "transfer ({} issued)", minted),
            Self::FeesDistributed { fee } => write!(f, "fee {} distributed", fee),
            Self::Staked { staker, amount } => write!(f, "{} staked {}", staker, amount),
            Self::Unstaked { staker, amount } => write!(f, "{} unstaked {}", staker, amount),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXECUTION
// ═══════════════════════════════════════════════════════════════════════════════

impl Registry {
    /// Execute an operation
    pub fn execute(&mut self, op: &Operation) -> Result<OperationOutcome> {
        debug!(op = op.operation_type(), "execute");

        match op {
            Operation::CreateTrove { owner, asset } => {
                let key = self.create_trove(owner, asset)?;
                Ok(OperationOutcome::TroveCreated { key })
            }
            Operation::DepositCollateral { owner, asset, amount, from } => {
                let key = TroveKey::new(owner.as_str(), asset.clone());
                let from = match from {
                    Some(name) => AccountId::from(name.as_str()),
                    None => AccountId::user(owner.as_str()),
                };
                let minted = self.deposit_collateral(&key, &from, amount)?;
                Ok(OperationOutcome::CollateralDeposited { key, minted })
            }
            Operation::Borrow { owner, asset, amount } => {
                let key = TroveKey::new(owner.as_str(), asset.clone());
                let receipt = self.borrow(&key, amount)?;
                Ok(OperationOutcome::Borrowed { receipt })
            }
            Operation::Repay { owner, asset, amount } => {
                let key = TroveKey::new(owner.as_str(), asset.clone());
                let repaid = self.repay(&key, amount)?;
                Ok(OperationOutcome::Repaid { key, repaid })
            }
            Operation::Liquidate { owner, asset, caller } => {
                let key = TroveKey::new(owner.as_str(), asset.clone());
                let caller = caller.as_deref().map(AccountId::from);
                let liquidation = self.liquidate(&key, caller)?;
                Ok(OperationOutcome::Liquidated { liquidation: Box::new(liquidation) })
            }
            Operation::SetPrice { asset, price } => {
                let liquidations = self.set_asset_price(asset, price.clone())?;
                Ok(OperationOutcome::PriceSet { asset: asset.clone(), liquidations })
            }
            Operation::Transfer { asset, from, to, amount } => {
                let from = AccountId::from(from.as_str());
                let to = AccountId::from(to.as_str());
                let minted = self.transfer(asset, &from, &to, amount)?;
                Ok(OperationOutcome::Transferred { minted })
            }
            Operation::DistributeFees { fee } => {
                self.distribute_fees(fee)?;
                Ok(OperationOutcome::FeesDistributed { fee: fee.clone() })
            }
            Operation::StakeFee { staker, amount } => {
                let staker = AccountId::from(staker.as_str());
                self.stake_fee_asset(&staker, amount)?;
                Ok(OperationOutcome::Staked { staker, amount: amount.clone() })
            }
            Operation::UnstakeFee { staker, amount } => {
                let staker = AccountId::from(staker.as_str());
                let amount = self.unstake_fee_asset(&staker, amount)?;
                Ok(OperationOutcome::Unstaked { staker, amount })
            }
            Operation::StakePool { staker, amount } => {
                let staker = AccountId::from(staker.as_str());
                self.stake_stability_pool(&staker, amount)?;
                Ok(OperationOutcome::Staked { staker, amount: amount.clone() })
            }
            Operation::UnstakePool { staker, amount } => {
                let staker = AccountId::from(staker.as_str());
                let amount = self.unstake_stability_pool(&staker, amount)?;
                Ok(OperationOutcome::Unstaked { staker, amount })
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO
// ═══════════════════════════════════════════════════════════════════════════════

/// A configuration plus the operations to run against it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Registry configuration (defaults when omitted)
    #[serde(default)]
    pub config: ProtocolConfig,
    /// Operations in execution order
    #[serde(default)]
    pub operations: Vec<Operation>,
}

/// Final state after replaying a scenario
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Registry after the last operation
    pub registry: Registry,
    /// One outcome per operation
    pub outcomes: Vec<OperationOutcome>,
}

impl Scenario {
    /// Parse from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Run every operation on a fresh registry, stopping at the first failure
    pub fn run(&self) -> Result<ScenarioReport> {
        let mut registry = Registry::new(self.config.clone())?;
        let outcomes = self.operations
            .iter()
            .map(|op| registry.execute(op))
            .collect::<Result<Vec<_>>>()?;

        Ok(ScenarioReport { registry, outcomes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_operation_json_shape() {
        let json = r#"{ "op": "borrow", "owner": "alice", "asset": "BONQ", "amount": "1000" }"#;
        let op: Operation = serde_json::from_str(json).unwrap();

        assert_eq!(
            op,
            Operation::Borrow { owner: "alice".into(), asset: "BONQ".into(), amount: d("1000") }
        );
        assert_eq!(op.operation_type(), "Borrow");
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{ "op": "deposit_collateral", "owner": "alice", "asset": "BONQ", "amount": 5 }"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert!(matches!(op, Operation::DepositCollateral { from: None, .. }));
    }

    #[test]
    fn test_execute_sequence() {
        let mut registry = Registry::default();
        let ops = vec![
            Operation::StakeFee { staker: "carol".into(), amount: d("10") },
            Operation::CreateTrove { owner: "alice".into(), asset: "BONQ".into() },
            Operation::DepositCollateral {
                owner: "alice".into(),
                asset: "BONQ".into(),
                amount: d("1000"),
                from: None,
            },
            Operation::Borrow { owner: "alice".into(), asset: "BONQ".into(), amount: d("1000") },
            Operation::Repay { owner: "alice".into(), asset: "BONQ".into(), amount: d("400") },
        ];

        let outcomes: Vec<_> = ops.iter().map(|op| registry.execute(op).unwrap()).collect();

        assert!(matches!(&outcomes[2], OperationOutcome::CollateralDeposited { minted, .. } if minted == &d("1000")));
        assert!(matches!(&outcomes[4], OperationOutcome::Repaid { repaid, .. } if repaid == &d("400")));
        let key = TroveKey::new("alice", "BONQ");
        assert_eq!(registry.trove(&key).unwrap().debt(), &d("605"));
        assert_eq!(registry.balance(&"BEUR".into(), &AccountId::user("carol")).unwrap(), d("5"));
    }

    #[test]
    fn test_reserved_names_in_transfer() {
        let mut registry = Registry::default();
        let op = Operation::Transfer {
            asset: "BEUR".into(),
            from: "mint".into(),
            to: "bob".into(),
            amount: d("3"),
        };

        let outcome = registry.execute(&op).unwrap();
        assert!(matches!(outcome, OperationOutcome::Transferred { minted } if minted == d("3")));
        assert_eq!(registry.balance(&"BEUR".into(), &AccountId::user("bob")).unwrap(), d("3"));
    }

    #[test]
    fn test_scenario_stops_at_first_error() {
        let scenario = Scenario {
            config: ProtocolConfig::default(),
            operations: vec![
                Operation::CreateTrove { owner: "alice".into(), asset: "WEWT".into() },
                Operation::CreateTrove { owner: "alice".into(), asset: "WEWT".into() },
            ],
        };

        assert!(matches!(scenario.run(), Err(Error::DuplicatePosition(_))));
    }

    #[test]
    fn test_scenario_json_roundtrip() {
        let json = r#"{
            "operations": [
                { "op": "create_trove", "owner": "alice", "asset": "WEWT" },
                { "op": "set_price", "asset": "WEWT", "price": "9.5" }
            ]
        }"#;

        let scenario = Scenario::from_json(json).unwrap();
        assert_eq!(scenario.config, ProtocolConfig::default());
        assert_eq!(Scenario::from_json(&scenario.to_json().unwrap()).unwrap(), scenario);

        let report = scenario.run().unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.registry.asset(&"WEWT".into()).unwrap().price(), &d("9.5"));
    }
}
