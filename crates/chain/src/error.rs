//! Ledger-level failures reported by collaborators.

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Failure raised by a collaborator contract.
///
/// On a real ledger each of these is a revert; the enclosing transaction
/// unwinds with no state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient {asset} balance for {account}: have {available}, need {required}")]
    InsufficientBalance {
        asset: Address,
        account: Address,
        available: U256,
        required: U256,
    },

    #[error("insufficient {asset} allowance from {owner} to {spender}: have {available}, need {required}")]
    InsufficientAllowance {
        asset: Address,
        owner: Address,
        spender: Address,
        available: U256,
        required: U256,
    },

    #[error("insufficient native balance for {account}: have {available}, need {required}")]
    InsufficientNative {
        account: Address,
        available: U256,
        required: U256,
    },

    #[error("reverted: {0}")]
    Reverted(String),

    #[error("reentrant call into {0}")]
    Reentrancy(Address),

    #[error("flash loan of {asset} not repaid: expected {expected}, got {actual}")]
    FlashLoanNotRepaid {
        asset: Address,
        expected: U256,
        actual: U256,
    },

    #[error("no pair for {0} / {1}")]
    UnknownPair(Address, Address),
}

impl LedgerError {
    /// Shorthand for a revert with a reason string.
    pub fn revert(reason: impl Into<String>) -> Self {
        Self::Reverted(reason.into())
    }
}
