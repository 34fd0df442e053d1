//! Protocol configuration and parameters.
//!
//! A [`ProtocolConfig`] fixes everything the registry is created with: the
//! borrow fee, the liquidation reserve, the stable and fee assets and the
//! starter set of collateral assets. It can be loaded from a JSON file and
//! partially overridden from the environment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::core::types::AssetSymbol;
use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::math::Decimal;

fn default_mcr() -> Decimal {
    Decimal::new(DEFAULT_MCR_BPS, BPS_SCALE)
}

fn default_borrow_fee_rate() -> Decimal {
    Decimal::new(BORROWING_FEE_BPS, BPS_SCALE)
}

fn default_liquidation_reserve() -> Decimal {
    Decimal::from(LIQUIDATION_RESERVE_UNITS)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parameters of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Short ticker
    pub symbol: AssetSymbol,
    /// Long name
    pub name: String,
    /// Initial reference price
    pub price: Decimal,
    /// Minimum collateralization ratio
    #[serde(default = "default_mcr")]
    pub mcr: Decimal,
}

impl AssetConfig {
    /// Create with the default MCR
    pub fn new(symbol: &str, name: &str, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            price,
            mcr: default_mcr(),
        }
    }

    /// Override the MCR
    pub fn with_mcr(mut self, mcr: Decimal) -> Self {
        self.mcr = mcr;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.price.is_positive() {
            return Err(Error::Configuration(format!(
                "price of {} must be positive, got {}",
                self.symbol, self.price
            )));
        }
        if !self.mcr.is_positive() {
            return Err(Error::Configuration(format!(
                "MCR of {} must be positive, got {}",
                self.symbol, self.mcr
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration the registry is created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Fraction of every borrow charged as a fee (0.005 = 0.5%)
    pub borrow_fee_rate: Decimal,
    /// Stable units set aside per trove on its first borrow
    pub liquidation_reserve: Decimal,
    /// The pegged stable asset
    pub stable_asset: AssetConfig,
    /// The fee / governance asset (also accepted as collateral)
    pub fee_asset: AssetConfig,
    /// Further collateral assets
    pub collateral_assets: Vec<AssetConfig>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            borrow_fee_rate: default_borrow_fee_rate(),
            liquidation_reserve: default_liquidation_reserve(),
            stable_asset: AssetConfig::new(STABLE_SYMBOL, "BONQ EUR", Decimal::new(10, 1)),
            fee_asset: AssetConfig::new(FEE_ASSET_SYMBOL, "BONQ Token", Decimal::new(20, 1)),
            collateral_assets: vec![
                AssetConfig::new("WEWT", "Wrapped EWT", Decimal::new(100, 1)),
                AssetConfig::new("ALBT", "Alliance Block Token", Decimal::new(100, 1)),
            ],
        }
    }
}

impl ProtocolConfig {
    /// Use a different borrow fee rate
    pub fn with_borrow_fee_rate(mut self, rate: Decimal) -> Self {
        self.borrow_fee_rate = rate;
        self
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Apply `BONQ_BORROW_FEE_RATE` / `BONQ_LIQUIDATION_RESERVE` overrides
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(rate) = std::env::var("BONQ_BORROW_FEE_RATE") {
            self.borrow_fee_rate = rate.parse()?;
        }

        if let Ok(reserve) = std::env::var("BONQ_LIQUIDATION_RESERVE") {
            self.liquidation_reserve = reserve.parse()?;
        }

        Ok(self)
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Every asset this configuration declares, stable asset first
    pub fn assets(&self) -> impl Iterator<Item = &AssetConfig> {
        std::iter::once(&self.stable_asset)
            .chain(std::iter::once(&self.fee_asset))
            .chain(self.collateral_assets.iter())
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        if self.borrow_fee_rate.is_negative() || self.borrow_fee_rate >= Decimal::one() {
            return Err(Error::Configuration(format!(
                "borrow fee rate must be in [0, 1), got {}",
                self.borrow_fee_rate
            )));
        }

        if self.liquidation_reserve.is_negative() {
            return Err(Error::Configuration(format!(
                "liquidation reserve cannot be negative, got {}",
                self.liquidation_reserve
            )));
        }

        let mut seen = BTreeSet::new();
        for asset in self.assets() {
            asset.validate()?;
            if !seen.insert(asset.symbol.clone()) {
                return Err(Error::Configuration(format!("duplicate asset symbol {}", asset.symbol)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProtocolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.borrow_fee_rate, "0.005".parse().unwrap());
        assert_eq!(config.fee_asset.mcr, "1.2".parse().unwrap());
        assert_eq!(config.assets().count(), 4);
    }

    #[test]
    fn test_duplicate_symbol_rejected() {
        let mut config = ProtocolConfig::default();
        config.collateral_assets.push(AssetConfig::new("BEUR", "Clash", Decimal::one()));
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_fee_rate_bounds() {
        let config = ProtocolConfig::default().with_borrow_fee_rate(Decimal::one());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "borrow_fee_rate": "0.01",
                "collateral_assets": [
                    {{ "symbol": "WEWT", "name": "Wrapped EWT", "price": "12.5", "mcr": "1.5" }},
                    {{ "symbol": "ALBT", "name": "Alliance Block Token", "price": 3 }}
                ]
            }}"#
        )
        .unwrap();

        let config = ProtocolConfig::load(file.path()).unwrap();
        assert_eq!(config.borrow_fee_rate, "0.01".parse().unwrap());
        assert_eq!(config.stable_asset.symbol.as_str(), STABLE_SYMBOL);
        assert_eq!(config.collateral_assets[0].mcr, "1.5".parse().unwrap());
        assert_eq!(config.collateral_assets[1].mcr, "1.2".parse().unwrap());
        assert_eq!(config.collateral_assets[1].price, Decimal::from(3));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = ProtocolConfig::default();
        config.save(&path).unwrap();
        assert_eq!(ProtocolConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let result = ProtocolConfig::load(Path::new("/nonexistent/bonq.json"));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
