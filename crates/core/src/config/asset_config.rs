//! Asset registry entries loaded from TOML.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Individual asset configuration (TOML-loadable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Asset symbol (e.g., "WETH", "USDT")
    pub symbol: String,
    /// Token contract address (as hex string)
    pub token: String,
    /// Token decimals
    pub decimals: u8,
}

impl AssetConfig {
    /// Parse token address.
    pub fn token_address(&self) -> anyhow::Result<Address> {
        self.token
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid token address '{}': {}", self.token, e))
    }

    /// Render a raw amount with this asset's decimals, e.g. `22.31 WETH`.
    pub fn format_amount(&self, raw: U256) -> String {
        let scale = U256::from(10u64).pow(U256::from(self.decimals));
        let (whole, fraction) = raw.div_rem(scale);
        if fraction.is_zero() {
            return format!("{whole} {}", self.symbol);
        }
        let digits = format!("{:0>width$}", fraction.to_string(), width = self.decimals as usize);
        format!("{whole}.{} {}", digits.trim_end_matches('0'), self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdt() -> AssetConfig {
        AssetConfig {
            symbol: "USDT".to_string(),
            token: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
            decimals: 6,
        }
    }

    #[test]
    fn test_token_address() {
        assert!(usdt().token_address().is_ok());

        let mut bad = usdt();
        bad.token = "not-an-address".to_string();
        assert!(bad.token_address().is_err());
    }

    #[test]
    fn test_format_amount() {
        let asset = usdt();
        assert_eq!(asset.format_amount(U256::from(2_916_378_221_684u64)), "2916378.221684 USDT");
        assert_eq!(asset.format_amount(U256::from(50_000u64)), "0.05 USDT");
        assert_eq!(asset.format_amount(U256::from(3_000_000u64)), "3 USDT");
    }
}
