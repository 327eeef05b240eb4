//! Transient entities of one operation.
//!
//! Nothing here outlives a single `operate` call.

use alloy::primitives::{Address, Bytes, U256};
use flashliq_chain::{ILiquidationOperator, LiquidationContext};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{OperatorError, Result};
use crate::u256_math;

/// Sentinel the lending pool reads as "liquidate the maximum allowed".
pub const FULL_CLOSE: U256 = U256::MAX;

/// Caller-supplied liquidation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Collateral to seize
    pub collateral_asset: Address,
    /// Debt to repay (also the flash-loaned asset)
    pub debt_asset: Address,
    /// Debt to cover; zero means the protocol's full close amount
    pub debt_to_cover: U256,
    /// Undercollateralized account
    pub borrower: Address,
    /// Keep profit as collateral instead of converting to native
    pub receive_as_collateral: bool,
}

impl OperationRequest {
    /// Build a request.
    pub fn new(
        collateral_asset: Address,
        debt_asset: Address,
        debt_to_cover: U256,
        borrower: Address,
        receive_as_collateral: bool,
    ) -> Self {
        Self {
            collateral_asset,
            debt_asset,
            debt_to_cover,
            borrower,
            receive_as_collateral,
        }
    }

    /// Pre-flight shape check. Eligibility of the borrower is left to the
    /// lending pool.
    pub fn validate(&self) -> Result<()> {
        if self.collateral_asset == self.debt_asset {
            return Err(OperatorError::InvalidRequest(format!(
                "collateral and debt asset are both {}",
                self.collateral_asset
            )));
        }
        if self.collateral_asset.is_zero() || self.debt_asset.is_zero() {
            return Err(OperatorError::InvalidRequest(
                "asset address is zero".to_string(),
            ));
        }
        if self.borrower.is_zero() {
            return Err(OperatorError::InvalidRequest(
                "borrower address is zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the protocol should size the liquidation itself.
    pub fn is_full_close(&self) -> bool {
        self.debt_to_cover.is_zero()
    }

    /// `debtToCover` as passed to the pool.
    pub fn protocol_debt_to_cover(&self) -> U256 {
        if self.is_full_close() {
            FULL_CLOSE
        } else {
            self.debt_to_cover
        }
    }

    /// Callback payload fields for this request.
    pub fn context(&self) -> LiquidationContext {
        LiquidationContext {
            collateralAsset: self.collateral_asset,
            debtAsset: self.debt_asset,
            borrower: self.borrower,
            debtToCover: self.protocol_debt_to_cover(),
            receiveAsCollateral: self.receive_as_collateral,
        }
    }

    /// ABI call equivalent of this request.
    pub fn to_call(&self) -> ILiquidationOperator::operateCall {
        ILiquidationOperator::operateCall {
            collateralAsset: self.collateral_asset,
            debtAsset: self.debt_asset,
            debtToCover: self.debt_to_cover,
            borrower: self.borrower,
            receiveAsCollateral: self.receive_as_collateral,
        }
    }
}

impl From<ILiquidationOperator::operateCall> for OperationRequest {
    fn from(call: ILiquidationOperator::operateCall) -> Self {
        Self::new(
            call.collateralAsset,
            call.debtAsset,
            call.debtToCover,
            call.borrower,
            call.receiveAsCollateral,
        )
    }
}

/// Flash loan requested by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashLoan {
    pub asset: Address,
    pub principal: U256,
    /// Lender's published fee rate
    pub fee_bps: u16,
    /// Encoded `LiquidationContext`
    pub context: Bytes,
}

impl FlashLoan {
    /// Principal plus fee, rounded up.
    pub fn repayment_due(&self) -> Result<U256> {
        Ok(u256_math::loan_repayment_due(self.principal, self.fee_bps)?)
    }
}

/// Outcome of the liquidation call, measured from balance deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralReceipt {
    pub asset: Address,
    /// Collateral balance delta observed on the operator
    pub amount: U256,
    /// Debt asset spent by the protocol
    pub debt_repaid: U256,
    /// What the protocol claimed to send (informational only)
    pub reported: U256,
}

/// Quote derived from live reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    pub pair: Address,
    pub asset_in: Address,
    pub asset_out: Address,
    pub reserve_in: U256,
    pub reserve_out: U256,
    pub amount_in: U256,
    pub amount_out: U256,
}

/// Asset the caller's profit is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfitAsset {
    /// Native balance
    Native,
    /// Fungible token
    Token(Address),
}

impl ProfitAsset {
    /// Address used in events; native is the zero address.
    pub fn address(&self) -> Address {
        match self {
            Self::Native => Address::ZERO,
            Self::Token(asset) => *asset,
        }
    }
}

impl fmt::Display for ProfitAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Token(asset) => write!(f, "{asset}"),
        }
    }
}

/// Final result handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitResult {
    pub asset: ProfitAsset,
    /// Amount delivered to the caller in `asset`
    pub amount: U256,
    pub borrower: Address,
    pub collateral_seized: U256,
    pub debt_repaid: U256,
    pub flash_principal: U256,
    pub flash_fee: U256,
    /// Collateral sold to repay the flash loan
    pub swap_input: U256,
    /// Unspent debt asset forwarded to the caller as a token
    pub debt_surplus: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OperationRequest {
        OperationRequest::new(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            U256::ZERO,
            Address::repeat_byte(3),
            false,
        )
    }

    #[test]
    fn test_validate() {
        assert!(request().validate().is_ok());

        let mut same = request();
        same.debt_asset = same.collateral_asset;
        assert!(matches!(same.validate(), Err(OperatorError::InvalidRequest(_))));

        let mut no_borrower = request();
        no_borrower.borrower = Address::ZERO;
        assert!(matches!(no_borrower.validate(), Err(OperatorError::InvalidRequest(_))));
    }

    #[test]
    fn test_full_close_sentinel() {
        let full = request();
        assert!(full.is_full_close());
        assert_eq!(full.context().debtToCover, FULL_CLOSE);

        let mut partial = request();
        partial.debt_to_cover = U256::from(50_000u64);
        assert!(!partial.is_full_close());
        assert_eq!(partial.context().debtToCover, U256::from(50_000u64));
    }

    #[test]
    fn test_call_conversion() {
        let original = request();
        let back = OperationRequest::from(original.to_call());
        assert_eq!(back, original);
    }

    #[test]
    fn test_flash_loan_repayment() {
        let loan = FlashLoan {
            asset: Address::repeat_byte(2),
            principal: U256::from(50_000u64),
            fee_bps: 30,
            context: Bytes::new(),
        };
        assert_eq!(loan.repayment_due().unwrap(), U256::from(50_150u64));
    }
}
