//! Operator failure taxonomy.
//!
//! Nothing is retried or recovered inside one operation. Every variant aborts
//! the enclosing transaction; the ledger rolls back all state, including the
//! flash lender's.

use alloy::primitives::{Address, U256};
use flashliq_chain::LedgerError;
use thiserror::Error;

use crate::u256_math::MathError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperatorError {
    /// Malformed request, rejected before any state change.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The lending protocol declined the liquidation.
    #[error("liquidation rejected: {0}")]
    LiquidationRejected(String),

    /// The swap venue cannot fill the required quote.
    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    /// Converting the seized collateral cannot cover what is owed.
    #[error("unprofitable: need {required} of {asset}, received {available}")]
    Unprofitable {
        asset: Address,
        required: U256,
        available: U256,
    },

    /// The flash lender's post-callback repayment check failed.
    #[error("flash loan repayment failed: {0}")]
    RepaymentFailed(String),

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// Callback payload could not be decoded or the call was unsolicited.
    #[error("invalid callback context: {0}")]
    InvalidContext(String),

    /// Transfer-level failure from a collaborator.
    #[error(transparent)]
    Ledger(LedgerError),
}

impl OperatorError {
    /// Short machine-friendly name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::LiquidationRejected(_) => "liquidation_rejected",
            Self::InsufficientLiquidity(_) => "insufficient_liquidity",
            Self::Unprofitable { .. } => "unprofitable",
            Self::RepaymentFailed(_) => "repayment_failed",
            Self::ArithmeticOverflow => "arithmetic_overflow",
            Self::InvalidContext(_) => "invalid_context",
            Self::Ledger(_) => "ledger",
        }
    }
}

impl From<LedgerError> for OperatorError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::FlashLoanNotRepaid { .. } => Self::RepaymentFailed(err.to_string()),
            other => Self::Ledger(other),
        }
    }
}

impl From<MathError> for OperatorError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::Overflow => Self::ArithmeticOverflow,
            MathError::InvalidFee(_) => Self::InvalidRequest(err.to_string()),
            // Engine divisors are reserves and fee denominators
            MathError::DivisionByZero
            | MathError::ZeroReserves
            | MathError::InsufficientLiquidity { .. } => {
                Self::InsufficientLiquidity(err.to_string())
            }
        }
    }
}

pub type Result<T, E = OperatorError> = std::result::Result<T, E>;
