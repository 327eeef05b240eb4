//! Collaborator layer for the flash liquidation operator.
//!
//! This crate provides:
//! - Contract bindings for the lending pool, constant-product pairs, ERC20
//!   tokens, wrapped native token and the operator itself
//! - The ABI codec for the flash-loan callback context
//! - Event signatures and log decoding for liquidation tracking
//! - Synchronous collaborator traits consumed by the engine
//!
//! Every collaborator is reached through a trait so the engine can run against
//! a live binding or an in-memory fork without change.

pub mod contracts;
mod error;
pub mod protocol;

pub use contracts::{
    decode_context, encode_context, ILendingPool, ILiquidationOperator, IUniswapV2Pair, IWETH,
    LiquidationContext, IERC20,
};
pub use error::LedgerError;
pub use protocol::{
    borrower_topic, count_liquidations, decode_liquidation, liquidations_of, AssetLedger,
    FlashBorrower, FlashLender, LendingPool, LiquidationCallParams, LiquidationRecord,
    PairReserves, SwapVenue, WrappedNative,
};
