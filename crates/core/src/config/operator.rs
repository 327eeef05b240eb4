//! Operator configuration with profile support.
//!
//! Profiles tune execution thresholds only. Contract addresses always come
//! from a file or are injected by the embedding code.

use alloy::primitives::{Address, U256};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::asset_config::AssetConfig;

/// Main configuration structure for the operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Collaborator and operator addresses
    #[serde(default)]
    pub contracts: ContractsConfig,

    /// Execution thresholds
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Known assets, used to resolve symbols
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Addresses of the operator and the contracts it talks to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// The operator's own account
    pub operator: Address,
    pub lending_pool: Address,
    pub flash_lender: Address,
    /// Wrapped native token (base asset for settlement)
    pub wrapped_native: Address,
}

impl ContractsConfig {
    /// Every address must be set.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, address) in [
            ("operator", self.operator),
            ("lending_pool", self.lending_pool),
            ("flash_lender", self.flash_lender),
            ("wrapped_native", self.wrapped_native),
        ] {
            anyhow::ensure!(!address.is_zero(), "contracts.{name} is not configured");
        }
        Ok(())
    }
}

/// Execution parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Tolerated shortfall of the settlement swap versus its quote
    #[serde(default = "default_settlement_slippage")]
    pub settlement_slippage_bps: u16,

    /// Profit must be strictly greater than this (raw units of the profit asset)
    #[serde(default)]
    pub min_profit: U256,
}

fn default_settlement_slippage() -> u16 {
    50
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            settlement_slippage_bps: default_settlement_slippage(),
            min_profit: U256::ZERO,
        }
    }
}

impl OperatorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Loose thresholds for fork runs.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            execution: ExecutionConfig {
                settlement_slippage_bps: 500,
                min_profit: U256::ZERO,
            },
            ..Default::default()
        }
    }

    /// Tight slippage for live execution.
    pub fn production() -> Self {
        Self {
            profile: "production".to_string(),
            execution: ExecutionConfig {
                settlement_slippage_bps: 30,
                min_profit: U256::ZERO,
            },
            ..Default::default()
        }
    }

    /// `OPERATOR_CONFIG` (TOML path) if set, otherwise the profile named by
    /// `OPERATOR_PROFILE`.
    /// Supported profiles: testing, production
    pub fn from_env() -> anyhow::Result<Self> {
        if let Ok(path) = std::env::var("OPERATOR_CONFIG") {
            return Self::from_file(path);
        }
        let profile = std::env::var("OPERATOR_PROFILE").unwrap_or_else(|_| "default".to_string());
        Ok(Self::profile(&profile))
    }

    /// Profile by name; unknown names fall back to the default profile.
    pub fn profile(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "testing" | "test" => Self::testing(),
            "production" | "prod" => Self::production(),
            _ => Self {
                profile: default_profile_name(),
                ..Default::default()
            },
        }
    }

    /// Replace the contract addresses.
    pub fn with_contracts(mut self, contracts: ContractsConfig) -> Self {
        self.contracts = contracts;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.contracts.validate()?;
        anyhow::ensure!(
            self.execution.settlement_slippage_bps <= 10_000,
            "execution.settlement_slippage_bps above 10000"
        );
        for asset in &self.assets {
            asset
                .token_address()
                .with_context(|| format!("asset {}", asset.symbol))?;
        }
        Ok(())
    }

    /// Resolve a symbol (case-insensitive) or a hex address.
    pub fn resolve_asset(&self, symbol_or_address: &str) -> anyhow::Result<Address> {
        if let Some(asset) = self
            .assets
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol_or_address))
        {
            return asset.token_address();
        }
        symbol_or_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Unknown asset '{}': {}", symbol_or_address, e))
    }

    /// Registry entry for `address`, if known.
    pub fn asset_by_address(&self, address: Address) -> Option<&AssetConfig> {
        self.assets
            .iter()
            .find(|a| a.token_address().map(|t| t == address).unwrap_or(false))
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Operator configuration loaded");
        tracing::info!(
            operator = %self.contracts.operator,
            lending_pool = %self.contracts.lending_pool,
            flash_lender = %self.contracts.flash_lender,
            wrapped_native = %self.contracts.wrapped_native,
            "Contracts"
        );
        tracing::info!(
            settlement_slippage_bps = self.execution.settlement_slippage_bps,
            min_profit = %self.execution.min_profit,
            "Execution parameters"
        );
        tracing::info!(assets = self.assets.len(), "Asset registry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contracts() -> ContractsConfig {
        ContractsConfig {
            operator: Address::repeat_byte(1),
            lending_pool: Address::repeat_byte(2),
            flash_lender: Address::repeat_byte(3),
            wrapped_native: Address::repeat_byte(4),
        }
    }

    #[test]
    fn test_default_config() {
        let config = OperatorConfig::profile("default");
        assert_eq!(config.profile, "default");
        assert_eq!(config.execution.settlement_slippage_bps, 50);
        assert!(config.execution.min_profit.is_zero());
    }

    #[test]
    fn test_profiles() {
        assert_eq!(OperatorConfig::profile("test").profile, "testing");
        assert_eq!(OperatorConfig::profile("PROD").profile, "production");
        assert!(
            OperatorConfig::testing().execution.settlement_slippage_bps
                > OperatorConfig::production().execution.settlement_slippage_bps
        );
    }

    #[test]
    fn test_validate_requires_contracts() {
        assert!(OperatorConfig::testing().validate().is_err());
        assert!(OperatorConfig::testing().with_contracts(contracts()).validate().is_ok());
    }

    #[test]
    fn test_serialization() {
        let config = OperatorConfig::testing().with_contracts(contracts());
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("profile = \"testing\""));

        let parsed: OperatorConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.profile, "testing");
        assert_eq!(parsed.contracts, contracts());
        assert_eq!(parsed.execution, config.execution);
    }

    #[test]
    fn test_resolve_asset() {
        let toml_str = r#"
            profile = "testing"

            [[assets]]
            symbol = "USDT"
            token = "0xdac17f958d2ee523a2206206994597c13d831ec7"
            decimals = 6
        "#;
        let config: OperatorConfig = toml::from_str(toml_str).unwrap();

        let usdt = config.resolve_asset("usdt").unwrap();
        assert_eq!(config.asset_by_address(usdt).unwrap().decimals, 6);
        assert_eq!(
            config.resolve_asset("0x2260fac5e5542a773aa44fbcfedf7c193bc2c599").unwrap(),
            Address::from([
                0x22, 0x60, 0xfa, 0xc5, 0xe5, 0x54, 0x2a, 0x77, 0x3a, 0xa4, 0x4f, 0xbc, 0xfe,
                0xdf, 0x7c, 0x19, 0x3b, 0xc2, 0xc5, 0x99
            ])
        );
        assert!(config.resolve_asset("DOGE").is_err());
    }
}
