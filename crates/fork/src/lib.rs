//! In-memory fork of the operator's collaborators.
//!
//! Every collaborator trait from `flashliq_chain` is implemented over one
//! shared [`ForkedLedger`]:
//! - [`ForkLendingPool`]: Aave-v2-style liquidation with close factor and bonus
//! - [`ForkSwapVenue`]: constant-product pairs with the fee-adjusted K check
//! - [`ForkFlashLender`]: fee-bearing flash loans with a reentrancy guard
//! - [`ForkWrappedNative`]: unwrapping to native balance
//!
//! [`ForkedLedger::transact`] gives whole-operation atomicity.

mod lender;
mod ledger;
mod pool;
mod snapshot;
mod venue;
mod weth;

pub use lender::ForkFlashLender;
pub use ledger::{ForkedLedger, LedgerState, Receipt};
pub use flashliq_core::u256_math::WAD;
pub use pool::{ForkLendingPool, LendingState, Position, ReserveConfig, DEFAULT_CLOSE_FACTOR_BPS};
pub use snapshot::{
    AmountEntry, BalanceEntry, ForkSnapshot, LenderSnapshot, NativeEntry, PairEntry, PoolSnapshot,
    PositionEntry, ReserveEntry, VenueSnapshot,
};
pub use venue::{pair_address, ForkSwapVenue, PairState};
pub use weth::ForkWrappedNative;

use alloy::primitives::Address;
use flashliq_chain::{FlashLender, LendingPool, WrappedNative};
use flashliq_core::{Collaborators, ContractsConfig, LiquidationOperator, OperatorConfig};
use std::sync::Arc;

/// All fork collaborators sharing one ledger.
#[derive(Debug, Clone)]
pub struct Fork {
    pub ledger: ForkedLedger,
    pub pool: ForkLendingPool,
    pub venue: ForkSwapVenue,
    pub lender: ForkFlashLender,
    pub wrapped_native: ForkWrappedNative,
}

impl Fork {
    /// Contract addresses of this fork, with `operator` as the operator account.
    pub fn contracts(&self, operator: Address) -> ContractsConfig {
        ContractsConfig {
            operator,
            lending_pool: self.pool.pool_address(),
            flash_lender: self.lender.lender_address(),
            wrapped_native: self.wrapped_native.token_address(),
        }
    }

    pub fn collaborators(&self) -> Collaborators<ForkFlashLender> {
        Collaborators {
            ledger: Arc::new(self.ledger.clone()),
            pool: Arc::new(self.pool.clone()),
            venue: Arc::new(self.venue.clone()),
            lender: self.lender.clone(),
            wrapped_native: Arc::new(self.wrapped_native.clone()),
        }
    }

    /// Operator wired to this fork.
    pub fn operator(&self, config: OperatorConfig) -> anyhow::Result<LiquidationOperator<ForkFlashLender>> {
        LiquidationOperator::new(config, self.collaborators())
    }
}
