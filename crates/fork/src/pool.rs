//! Aave-v2-style lending pool on the fork.
//!
//! Prices are denominated in the base currency (wei of the native asset per
//! whole token). A position is liquidatable while its health factor is below
//! one; at most `close_factor_bps` of one debt can be repaid per call, and the
//! seized collateral carries the collateral reserve's liquidation bonus.

use alloy::primitives::{Address, Log, U256};
use alloy::sol_types::SolEvent;
use flashliq_chain::{ILendingPool, LedgerError, LendingPool, LiquidationCallParams};
use flashliq_core::u256_math::{self, pow10, BPS_DENOMINATOR, WAD};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::debug;

use crate::ledger::ForkedLedger;

/// Default Aave v2 close factor (50%)
pub const DEFAULT_CLOSE_FACTOR_BPS: u16 = 5000;

/// Risk parameters and price of one reserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveConfig {
    /// Base-currency wei per whole token
    pub price: U256,
    pub decimals: u8,
    /// e.g. 8250 = 82.5%
    pub liquidation_threshold_bps: u16,
    /// e.g. 10500 = 5% bonus
    pub liquidation_bonus_bps: u16,
}

/// A borrower's balances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    pub collateral: SmallVec<[(Address, U256); 4]>,
    pub debt: SmallVec<[(Address, U256); 4]>,
}

fn amount_of(entries: &[(Address, U256)], asset: Address) -> U256 {
    entries
        .iter()
        .find(|(a, _)| *a == asset)
        .map(|(_, amount)| *amount)
        .unwrap_or_default()
}

fn reduce(entries: &mut SmallVec<[(Address, U256); 4]>, asset: Address, amount: U256) {
    if let Some((_, balance)) = entries.iter_mut().find(|(a, _)| *a == asset) {
        *balance = balance.saturating_sub(amount);
    }
}

impl Position {
    pub fn collateral_of(&self, asset: Address) -> U256 {
        amount_of(&self.collateral, asset)
    }

    pub fn debt_of(&self, asset: Address) -> U256 {
        amount_of(&self.debt, asset)
    }
}

/// Pool storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LendingState {
    pub close_factor_bps: u16,
    pub reserves: HashMap<Address, ReserveConfig>,
    pub positions: HashMap<Address, Position>,
}

fn math(err: u256_math::MathError) -> LedgerError {
    LedgerError::revert(format!("MATH_ERROR: {err}"))
}

impl LendingState {
    fn reserve(&self, asset: Address) -> Result<&ReserveConfig, LedgerError> {
        self.reserves
            .get(&asset)
            .ok_or_else(|| LedgerError::revert(format!("RESERVE_NOT_INITIALIZED: {asset}")))
    }

    /// Base-currency value of `amount` raw units.
    fn value(&self, asset: Address, amount: U256) -> Result<U256, LedgerError> {
        let reserve = self.reserve(asset)?;
        u256_math::mul_div(amount, reserve.price, pow10(reserve.decimals)).map_err(math)
    }

    /// Health factor in WAD; `U256::MAX` without debt.
    pub fn health_factor(&self, user: Address) -> Result<U256, LedgerError> {
        let Some(position) = self.positions.get(&user) else {
            return Ok(U256::MAX);
        };

        let mut adjusted_collateral = U256::ZERO;
        for (asset, amount) in &position.collateral {
            let threshold = U256::from(self.reserve(*asset)?.liquidation_threshold_bps);
            let value = self.value(*asset, *amount)?;
            adjusted_collateral += u256_math::mul_div(value, threshold, BPS_DENOMINATOR).map_err(math)?;
        }

        let mut total_debt = U256::ZERO;
        for (asset, amount) in &position.debt {
            total_debt += self.value(*asset, *amount)?;
        }

        if total_debt.is_zero() {
            return Ok(U256::MAX);
        }
        u256_math::mul_div(adjusted_collateral, WAD, total_debt).map_err(math)
    }

    /// `(debt repaid, collateral seized)` for a liquidation request.
    pub fn liquidation_amounts(
        &self,
        collateral_asset: Address,
        debt_asset: Address,
        user: Address,
        debt_to_cover: U256,
    ) -> Result<(U256, U256), LedgerError> {
        if self.health_factor(user)? >= WAD {
            return Err(LedgerError::revert("HEALTH_FACTOR_NOT_BELOW_THRESHOLD"));
        }
        let position = self
            .positions
            .get(&user)
            .ok_or_else(|| LedgerError::revert("HEALTH_FACTOR_NOT_BELOW_THRESHOLD"))?;

        let user_collateral = position.collateral_of(collateral_asset);
        if user_collateral.is_zero() {
            return Err(LedgerError::revert("COLLATERAL_CANNOT_BE_LIQUIDATED"));
        }
        let user_debt = position.debt_of(debt_asset);
        if user_debt.is_zero() {
            return Err(LedgerError::revert("SPECIFIED_CURRENCY_NOT_BORROWED_BY_USER"));
        }

        let max_liquidatable =
            u256_math::mul_div(user_debt, U256::from(self.close_factor_bps), BPS_DENOMINATOR).map_err(math)?;
        let mut debt_amount = debt_to_cover.min(max_liquidatable);

        let collateral = self.reserve(collateral_asset)?;
        let debt = self.reserve(debt_asset)?;
        let bonus = U256::from(collateral.liquidation_bonus_bps);

        // debt value converted to collateral units, plus bonus
        let debt_scaled = debt
            .price
            .checked_mul(debt_amount)
            .and_then(|v| v.checked_mul(pow10(collateral.decimals)))
            .ok_or_else(|| math(u256_math::MathError::Overflow))?;
        let collateral_scale = collateral
            .price
            .checked_mul(pow10(debt.decimals))
            .and_then(|v| v.checked_mul(BPS_DENOMINATOR))
            .ok_or_else(|| math(u256_math::MathError::Overflow))?;
        let max_collateral = u256_math::mul_div(debt_scaled, bonus, collateral_scale).map_err(math)?;

        let collateral_amount = if max_collateral > user_collateral {
            let collateral_value = collateral
                .price
                .checked_mul(user_collateral)
                .and_then(|v| v.checked_mul(pow10(debt.decimals)))
                .ok_or_else(|| math(u256_math::MathError::Overflow))?;
            let debt_scale = debt
                .price
                .checked_mul(pow10(collateral.decimals))
                .and_then(|v| v.checked_mul(bonus))
                .ok_or_else(|| math(u256_math::MathError::Overflow))?;
            debt_amount = u256_math::mul_div(collateral_value, BPS_DENOMINATOR, debt_scale).map_err(math)?;
            user_collateral
        } else {
            max_collateral
        };

        Ok((debt_amount, collateral_amount))
    }
}

/// Lending pool handle.
#[derive(Debug, Clone)]
pub struct ForkLendingPool {
    address: Address,
    ledger: ForkedLedger,
}

impl ForkLendingPool {
    /// Deploy an empty pool at `address`.
    pub fn deploy(ledger: ForkedLedger, address: Address, close_factor_bps: u16) -> Self {
        ledger.write(|s| {
            s.lending.insert(
                address,
                LendingState {
                    close_factor_bps,
                    reserves: HashMap::new(),
                    positions: HashMap::new(),
                },
            )
        });
        Self { address, ledger }
    }

    fn with_state<R>(&self, f: impl FnOnce(&LendingState) -> Result<R, LedgerError>) -> Result<R, LedgerError> {
        self.ledger.read(|s| {
            let state = s
                .lending
                .get(&self.address)
                .ok_or_else(|| LedgerError::revert(format!("no pool at {}", self.address)))?;
            f(state)
        })
    }

    fn with_state_mut<R>(&self, f: impl FnOnce(&mut LendingState) -> R) -> R {
        self.ledger.write(|s| f(s.lending.entry(self.address).or_insert_with(|| LendingState {
            close_factor_bps: DEFAULT_CLOSE_FACTOR_BPS,
            reserves: HashMap::new(),
            positions: HashMap::new(),
        })))
    }

    pub fn set_reserve(&self, asset: Address, config: ReserveConfig) {
        self.with_state_mut(|state| state.reserves.insert(asset, config));
    }

    /// Update an oracle price.
    pub fn set_price(&self, asset: Address, price: U256) -> Result<(), LedgerError> {
        self.with_state_mut(|state| match state.reserves.get_mut(&asset) {
            Some(reserve) => {
                reserve.price = price;
                Ok(())
            }
            None => Err(LedgerError::revert(format!("RESERVE_NOT_INITIALIZED: {asset}"))),
        })
    }

    /// Record a supplied-and-borrowed position. Supplied collateral is held by
    /// the pool; borrowed funds are paid out to `user`.
    pub fn open_position(&self, user: Address, collateral: &[(Address, U256)], debt: &[(Address, U256)]) {
        self.ledger.write(|s| {
            for (asset, amount) in collateral {
                s.mint(*asset, self.address, *amount);
            }
            for (asset, amount) in debt {
                s.mint(*asset, user, *amount);
            }
        });
        self.with_state_mut(|state| {
            let position = state.positions.entry(user).or_default();
            position.collateral.extend(collateral.iter().copied());
            position.debt.extend(debt.iter().copied());
        });
    }

    pub fn position(&self, user: Address) -> Option<Position> {
        self.with_state(|state| Ok(state.positions.get(&user).cloned())).ok().flatten()
    }

    pub fn health_factor(&self, user: Address) -> Result<U256, LedgerError> {
        self.with_state(|state| state.health_factor(user))
    }
}

impl LendingPool for ForkLendingPool {
    fn pool_address(&self) -> Address {
        self.address
    }

    fn max_debt_to_cover(
        &self,
        collateral_asset: Address,
        debt_asset: Address,
        user: Address,
    ) -> Result<U256, LedgerError> {
        self.with_state(|state| {
            state
                .liquidation_amounts(collateral_asset, debt_asset, user, U256::MAX)
                .map(|(debt, _)| debt)
        })
    }

    fn liquidation_call(&self, liquidator: Address, params: &LiquidationCallParams) -> Result<U256, LedgerError> {
        if params.receiveAToken {
            return Err(LedgerError::revert("ATOKEN_DELIVERY_UNSUPPORTED"));
        }

        let (debt_amount, collateral_amount) = self.with_state(|state| {
            state.liquidation_amounts(params.collateralAsset, params.debtAsset, params.user, params.debtToCover)
        })?;

        self.ledger
            .transfer_from(params.debtAsset, self.address, liquidator, self.address, debt_amount)?;
        self.ledger.write(|s| {
            s.move_tokens(params.collateralAsset, self.address, liquidator, collateral_amount)
        })?;

        self.with_state_mut(|state| {
            if let Some(position) = state.positions.get_mut(&params.user) {
                reduce(&mut position.debt, params.debtAsset, debt_amount);
                reduce(&mut position.collateral, params.collateralAsset, collateral_amount);
            }
        });

        let event = ILendingPool::LiquidationCall {
            collateralAsset: params.collateralAsset,
            debtAsset: params.debtAsset,
            user: params.user,
            debtToCover: debt_amount,
            liquidatedCollateralAmount: collateral_amount,
            liquidator,
            receiveAToken: false,
        };
        self.ledger.write(|s| {
            s.push_log(Log {
                address: self.address,
                data: event.encode_log_data(),
            })
        });

        debug!(
            user = %params.user,
            debt_repaid = %debt_amount,
            collateral_seized = %collateral_amount,
            "Liquidation executed"
        );
        Ok(collateral_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashliq_chain::AssetLedger;

    const POOL: Address = Address::repeat_byte(0xaa);
    const WETH: Address = Address::repeat_byte(0xee);
    const USDT: Address = Address::repeat_byte(0xdd);
    const USER: Address = Address::repeat_byte(0x59);

    fn units(whole: u64, decimals: u8) -> U256 {
        U256::from(whole) * pow10(decimals)
    }

    fn pool() -> (ForkedLedger, ForkLendingPool) {
        let ledger = ForkedLedger::new();
        let pool = ForkLendingPool::deploy(ledger.clone(), POOL, DEFAULT_CLOSE_FACTOR_BPS);
        pool.set_reserve(
            WETH,
            ReserveConfig {
                price: WAD,
                decimals: 18,
                liquidation_threshold_bps: 8000,
                liquidation_bonus_bps: 10500,
            },
        );
        pool.set_reserve(
            USDT,
            ReserveConfig {
                // 0.0005 ETH per USDT
                price: U256::from(500_000_000_000_000u64),
                decimals: 6,
                liquidation_threshold_bps: 0,
                liquidation_bonus_bps: 0,
            },
        );
        // 10 ETH collateral, 17_000 USDT = 8.5 ETH debt -> HF 0.94
        pool.open_position(USER, &[(WETH, units(10, 18))], &[(USDT, units(17_000, 6))]);
        (ledger, pool)
    }

    #[test]
    fn test_health_factor() {
        let (_, pool) = pool();
        let hf = pool.health_factor(USER).unwrap();
        assert!(hf < WAD);
        assert_eq!(pool.health_factor(Address::ZERO).unwrap(), U256::MAX);
    }

    #[test]
    fn test_close_factor_caps_debt() {
        let (_, pool) = pool();
        let max = pool.max_debt_to_cover(WETH, USDT, USER).unwrap();
        assert_eq!(max, units(8_500, 6));
    }

    #[test]
    fn test_liquidation_call() {
        let (ledger, pool) = pool();
        let liquidator = Address::repeat_byte(0x11);
        ledger.mint(USDT, liquidator, units(1_000, 6));
        ledger.approve(USDT, liquidator, POOL, units(1_000, 6)).unwrap();

        let params = LiquidationCallParams {
            collateralAsset: WETH,
            debtAsset: USDT,
            user: USER,
            debtToCover: units(1_000, 6),
            receiveAToken: false,
        };
        let seized = pool.liquidation_call(liquidator, &params).unwrap();

        // 1000 USDT = 0.5 ETH, plus 5% bonus
        assert_eq!(seized, U256::from(525_000_000_000_000_000u64));
        assert_eq!(ledger.balance_of(WETH, liquidator), seized);
        assert_eq!(ledger.balance_of(USDT, liquidator), U256::ZERO);
        assert_eq!(pool.position(USER).unwrap().debt_of(USDT), units(16_000, 6));
        assert_eq!(flashliq_chain::count_liquidations(&ledger.logs(), POOL), 1);
    }

    #[test]
    fn test_healthy_position_rejected() {
        let (_, pool) = pool();
        pool.set_price(USDT, U256::from(100_000_000_000_000u64)).unwrap();
        assert!(pool.health_factor(USER).unwrap() >= WAD);
        assert!(matches!(
            pool.max_debt_to_cover(WETH, USDT, USER),
            Err(LedgerError::Reverted(_))
        ));
    }

    #[test]
    fn test_collateral_cap() {
        let (_, pool) = pool();
        // Collateral crash: 10 WETH at 0.4 ETH no longer covers half the debt plus bonus
        pool.set_price(WETH, U256::from(400_000_000_000_000_000u64)).unwrap();
        let state_debt = pool.max_debt_to_cover(WETH, USDT, USER).unwrap();
        // 4 ETH / 1.05 bonus = 3.8095 ETH of debt = 7619.05 USDT
        assert!(state_debt < units(8_500, 6));
        assert_eq!(state_debt, U256::from(7_619_047_619u64));
    }
}
