//! Fork state loaded from TOML.
//!
//! Amounts are raw token units written as decimal or `0x` hex strings.

use alloy::primitives::{Address, U256};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::lender::ForkFlashLender;
use crate::ledger::ForkedLedger;
use crate::pool::{ForkLendingPool, ReserveConfig, DEFAULT_CLOSE_FACTOR_BPS};
use crate::venue::ForkSwapVenue;
use crate::weth::ForkWrappedNative;
use crate::Fork;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkSnapshot {
    pub wrapped_native: Address,
    pub lending_pool: PoolSnapshot,
    pub flash_lender: LenderSnapshot,
    #[serde(default)]
    pub venue: VenueSnapshot,
    #[serde(default)]
    pub balances: Vec<BalanceEntry>,
    #[serde(default)]
    pub native_balances: Vec<NativeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub address: Address,
    #[serde(default = "default_close_factor")]
    pub close_factor_bps: u16,
    #[serde(default)]
    pub reserves: Vec<ReserveEntry>,
    #[serde(default)]
    pub positions: Vec<PositionEntry>,
}

fn default_close_factor() -> u16 {
    DEFAULT_CLOSE_FACTOR_BPS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveEntry {
    pub asset: Address,
    pub price: U256,
    pub decimals: u8,
    pub liquidation_threshold_bps: u16,
    pub liquidation_bonus_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionEntry {
    pub user: Address,
    #[serde(default)]
    pub collateral: Vec<AmountEntry>,
    #[serde(default)]
    pub debt: Vec<AmountEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountEntry {
    pub asset: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LenderSnapshot {
    pub address: Address,
    #[serde(default = "default_flash_fee")]
    pub fee_bps: u16,
    #[serde(default)]
    pub liquidity: Vec<AmountEntry>,
}

fn default_flash_fee() -> u16 {
    9
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueSnapshot {
    #[serde(default = "default_swap_fee")]
    pub fee_bps: u16,
    #[serde(default)]
    pub pairs: Vec<PairEntry>,
}

fn default_swap_fee() -> u16 {
    30
}

impl Default for VenueSnapshot {
    fn default() -> Self {
        Self {
            fee_bps: default_swap_fee(),
            pairs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairEntry {
    pub token_a: Address,
    pub token_b: Address,
    pub reserve_a: U256,
    pub reserve_b: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub asset: Address,
    pub account: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeEntry {
    pub account: Address,
    pub amount: U256,
}

fn pairs(entries: &[AmountEntry]) -> Vec<(Address, U256)> {
    entries.iter().map(|e| (e.asset, e.amount)).collect()
}

impl ForkSnapshot {
    /// Load a snapshot from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Materialize the snapshot on a fresh ledger.
    pub fn build(&self) -> anyhow::Result<Fork> {
        let ledger = ForkedLedger::new();

        let pool = ForkLendingPool::deploy(ledger.clone(), self.lending_pool.address, self.lending_pool.close_factor_bps);
        for reserve in &self.lending_pool.reserves {
            pool.set_reserve(
                reserve.asset,
                ReserveConfig {
                    price: reserve.price,
                    decimals: reserve.decimals,
                    liquidation_threshold_bps: reserve.liquidation_threshold_bps,
                    liquidation_bonus_bps: reserve.liquidation_bonus_bps,
                },
            );
        }
        for position in &self.lending_pool.positions {
            pool.open_position(position.user, &pairs(&position.collateral), &pairs(&position.debt));
        }

        let venue = ForkSwapVenue::new(ledger.clone(), self.venue.fee_bps);
        for pair in &self.venue.pairs {
            anyhow::ensure!(
                pair.token_a != pair.token_b,
                "pair with identical tokens {}",
                pair.token_a
            );
            venue.add_liquidity(pair.token_a, pair.token_b, pair.reserve_a, pair.reserve_b);
        }

        let lender = ForkFlashLender::new(ledger.clone(), self.flash_lender.address, self.flash_lender.fee_bps);
        for entry in &self.flash_lender.liquidity {
            lender.fund(entry.asset, entry.amount);
        }

        for entry in &self.balances {
            ledger.mint(entry.asset, entry.account, entry.amount);
        }
        for entry in &self.native_balances {
            ledger.fund_native(entry.account, entry.amount);
        }

        info!(
            positions = self.lending_pool.positions.len(),
            pairs = self.venue.pairs.len(),
            "Fork snapshot loaded"
        );

        Ok(Fork {
            wrapped_native: ForkWrappedNative::new(ledger.clone(), self.wrapped_native),
            ledger,
            pool,
            venue,
            lender,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashliq_core::u256_math::WAD;
    use flashliq_chain::{AssetLedger, SwapVenue};

    const SNAPSHOT: &str = r#"
        wrapped_native = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"

        [lending_pool]
        address = "0x7d2768de32b0b80b7a3454c06bdac94a69ddc7a9"

        [[lending_pool.reserves]]
        asset = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
        price = "1000000000000000000"
        decimals = 18
        liquidation_threshold_bps = 8250
        liquidation_bonus_bps = 10500

        [[lending_pool.reserves]]
        asset = "0xdac17f958d2ee523a2206206994597c13d831ec7"
        price = "370000000000000"
        decimals = 6
        liquidation_threshold_bps = 0
        liquidation_bonus_bps = 0

        [[lending_pool.positions]]
        user = "0x59ce4a2ac5bc3f5f225439b2993b86b42f6d3e9f"
        collateral = [{ asset = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", amount = "2000000000000000000000" }]
        debt = [{ asset = "0xdac17f958d2ee523a2206206994597c13d831ec7", amount = "5832756443368" }]

        [flash_lender]
        address = "0x1e0447b19bb6ecfdae1e4ae1694b0c3659614e4e"
        fee_bps = 30
        liquidity = [{ asset = "0xdac17f958d2ee523a2206206994597c13d831ec7", amount = "1000000000000000" }]

        [venue]
        fee_bps = 30

        [[venue.pairs]]
        token_a = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
        token_b = "0xdac17f958d2ee523a2206206994597c13d831ec7"
        reserve_a = "50000000000000000000000"
        reserve_b = "135000000000000"
    "#;

    #[test]
    fn test_build_snapshot() {
        let snapshot = ForkSnapshot::from_toml_str(SNAPSHOT).unwrap();
        assert_eq!(snapshot.lending_pool.close_factor_bps, DEFAULT_CLOSE_FACTOR_BPS);

        let fork = snapshot.build().unwrap();
        let borrower = snapshot.lending_pool.positions[0].user;
        assert!(fork.pool.health_factor(borrower).unwrap() < WAD);

        let usdt = snapshot.lending_pool.reserves[1].asset;
        assert!(fork.venue.pair_for(usdt, snapshot.wrapped_native).is_some());
        assert_eq!(
            fork.ledger.balance_of(usdt, snapshot.flash_lender.address),
            U256::from(1_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_missing_section_rejected() {
        assert!(ForkSnapshot::from_toml_str("wrapped_native = \"0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2\"").is_err());
    }
}
