//! Flash liquidation engine.
//!
//! This crate provides the operator that liquidates an undercollateralized
//! lending position with borrowed funds in one atomic operation:
//! - Amount and fee arithmetic in 256 bits
//! - Reserve-based swap quoting against constant-product pairs
//! - Liquidation invocation with balance-delta accounting
//! - The flash-loan callback state machine
//! - Orchestration and profit settlement
//!
//! Collaborators (ledger, lending pool, swap venue, flash lender, wrapped
//! native token) are injected through the traits in `flashliq_chain`.

mod callback;
pub mod config;
mod error;
mod liquidation;
mod operator;
mod quote;
mod request;
pub mod u256_math;

pub use callback::CallbackStage;
pub use config::{AssetConfig, ContractsConfig, ExecutionConfig, OperatorConfig};
pub use error::{OperatorError, Result};
pub use liquidation::liquidate;
pub use operator::{Collaborators, LiquidationOperator};
pub use quote::ReserveOracle;
pub use request::{
    CollateralReceipt, FlashLoan, OperationRequest, ProfitAsset, ProfitResult, SwapQuote,
    FULL_CLOSE,
};
