//! Collaborator traits consumed by the operator.
//!
//! The operator never reaches into a collaborator's storage; it only calls
//! the public surface described here. All calls are synchronous: the flash
//! lender re-enters the borrower through a plain nested call, mirroring the
//! single-threaded execution of the ledger.
//!
//! # Architecture
//!
//! - [`AssetLedger`]: balances, transfers, approvals and event logs
//! - [`LendingPool`]: liquidation entry point and full-close sizing
//! - [`SwapVenue`]: constant-product pairs with live reserves
//! - [`FlashLender`] / [`FlashBorrower`]: fee-bearing flash liquidity and its
//!   callback
//! - [`WrappedNative`]: unwrapping the base asset into native balance
//!
//! Every state-changing method takes the acting account explicitly, the way a
//! contract call carries `msg.sender`.

mod events;

pub use events::{
    borrower_topic, count_liquidations, decode_liquidation, liquidations_of, LiquidationRecord,
};

use alloy::primitives::{Address, Bytes, Log, U256};

use crate::contracts::ILendingPool;
use crate::error::LedgerError;

/// Arguments of the pool's `liquidationCall`.
pub type LiquidationCallParams = ILendingPool::liquidationCallCall;

/// Fungible asset balances and the event log of the ledger.
pub trait AssetLedger {
    /// Token balance of `account`.
    fn balance_of(&self, asset: Address, account: Address) -> U256;

    /// Native balance of `account`.
    fn native_balance(&self, account: Address) -> U256;

    /// Move `amount` of `asset` from `from` to `to`.
    fn transfer(
        &self,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError>;

    /// Set `spender`'s allowance over `owner`'s `asset`.
    fn approve(
        &self,
        asset: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), LedgerError>;

    /// Move native balance from `from` to `to`.
    fn transfer_native(&self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError>;

    /// Append a log entry.
    fn emit(&self, log: Log);
}

/// Lending protocol liquidation surface.
pub trait LendingPool {
    /// Pool contract address (spender for the debt asset, emitter of
    /// `LiquidationCall`).
    fn pool_address(&self) -> Address;

    /// Maximum debt the protocol would accept in one liquidation of `user`
    /// for this collateral/debt pair.
    ///
    /// Fails when the position is not liquidatable.
    fn max_debt_to_cover(
        &self,
        collateral_asset: Address,
        debt_asset: Address,
        user: Address,
    ) -> Result<U256, LedgerError>;

    /// Execute `liquidationCall` on behalf of `liquidator`.
    ///
    /// Returns the collateral amount the protocol *claims* it sent. Callers
    /// must measure the balance delta instead of trusting this value.
    fn liquidation_call(
        &self,
        liquidator: Address,
        params: &LiquidationCallParams,
    ) -> Result<U256, LedgerError>;
}

/// Reserve snapshot of a constant-product pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairReserves {
    /// Pair contract address
    pub pair: Address,
    /// Lower-sorted token
    pub token0: Address,
    /// Higher-sorted token
    pub token1: Address,
    /// Reserve of token0
    pub reserve0: U256,
    /// Reserve of token1
    pub reserve1: U256,
}

impl PairReserves {
    /// Whether the pair trades `asset`.
    pub fn contains(&self, asset: Address) -> bool {
        self.token0 == asset || self.token1 == asset
    }

    /// Reserves ordered as `(reserve_in, reserve_out)` for a trade that sells
    /// `asset_in`.
    pub fn oriented(&self, asset_in: Address) -> Option<(U256, U256)> {
        if asset_in == self.token0 {
            Some((self.reserve0, self.reserve1))
        } else if asset_in == self.token1 {
            Some((self.reserve1, self.reserve0))
        } else {
            None
        }
    }

    /// The other token of the pair.
    pub fn counterpart(&self, asset: Address) -> Option<Address> {
        if asset == self.token0 {
            Some(self.token1)
        } else if asset == self.token1 {
            Some(self.token0)
        } else {
            None
        }
    }

    /// `(amount0_out, amount1_out)` for receiving `amount` of `asset_out`.
    pub fn amounts_out(&self, asset_out: Address, amount: U256) -> Option<(U256, U256)> {
        if asset_out == self.token0 {
            Some((amount, U256::ZERO))
        } else if asset_out == self.token1 {
            Some((U256::ZERO, amount))
        } else {
            None
        }
    }
}

/// Constant-product swap venue.
///
/// Swaps follow the pair convention: the input is transferred to the pair
/// first, then `swap` pays out and enforces the fee-adjusted invariant.
pub trait SwapVenue {
    /// Pair trading `token_a` against `token_b`, if one exists.
    fn pair_for(&self, token_a: Address, token_b: Address) -> Option<Address>;

    /// Current reserves of `pair`, read at call time.
    fn reserves(&self, pair: Address) -> Result<PairReserves, LedgerError>;

    /// Swap fee charged on the input leg, in basis points.
    fn fee_bps(&self) -> u16;

    /// Pay out `amount0_out`/`amount1_out` to `to`, after `caller` has
    /// transferred the input to the pair.
    fn swap(
        &self,
        caller: Address,
        pair: Address,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    ) -> Result<(), LedgerError>;
}

/// Receiver of flash liquidity.
pub trait FlashBorrower {
    /// Error the callback propagates back through the lender.
    type Error: From<LedgerError>;

    /// Account the principal is sent to and repaid from.
    fn borrower_address(&self) -> Address;

    /// Invoked by the lender after the principal has been transferred.
    ///
    /// `principal + fee` of `asset` must be back with the lender when this
    /// returns.
    fn on_flash_loan(
        &self,
        lender: Address,
        asset: Address,
        principal: U256,
        fee: U256,
        data: &[u8],
    ) -> Result<(), Self::Error>;
}

/// Source of fee-bearing flash liquidity.
pub trait FlashLender {
    /// Lender contract address.
    fn lender_address(&self) -> Address;

    /// Published fee rate, in basis points.
    fn flash_fee_bps(&self) -> u16;

    /// Lend `amount` of `asset` to `borrower`, re-enter its callback, and
    /// verify repayment of principal plus fee.
    ///
    /// Errors raised by the callback propagate unchanged.
    fn flash_loan<B: FlashBorrower + ?Sized>(
        &self,
        borrower: &B,
        asset: Address,
        amount: U256,
        data: Bytes,
    ) -> Result<(), B::Error>;
}

/// Wrapped native token.
pub trait WrappedNative {
    /// Token contract address.
    fn token_address(&self) -> Address;

    /// Burn `amount` of `owner`'s wrapped tokens and credit native balance.
    fn withdraw(&self, owner: Address, amount: U256) -> Result<(), LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserves() -> PairReserves {
        PairReserves {
            pair: Address::repeat_byte(9),
            token0: Address::repeat_byte(1),
            token1: Address::repeat_byte(2),
            reserve0: U256::from(1_000u64),
            reserve1: U256::from(5_000u64),
        }
    }

    #[test]
    fn test_oriented_reserves() {
        let r = reserves();
        assert_eq!(
            r.oriented(Address::repeat_byte(1)),
            Some((U256::from(1_000u64), U256::from(5_000u64)))
        );
        assert_eq!(
            r.oriented(Address::repeat_byte(2)),
            Some((U256::from(5_000u64), U256::from(1_000u64)))
        );
        assert_eq!(r.oriented(Address::repeat_byte(3)), None);
    }

    #[test]
    fn test_amounts_out() {
        let r = reserves();
        assert_eq!(
            r.amounts_out(Address::repeat_byte(2), U256::from(7u64)),
            Some((U256::ZERO, U256::from(7u64)))
        );
        assert_eq!(r.counterpart(Address::repeat_byte(1)), Some(Address::repeat_byte(2)));
        assert!(!r.contains(Address::ZERO));
    }
}
