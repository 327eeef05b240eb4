//! Flash-loan callback handler.
//!
//! Runs inside the lender's `flash_loan` call, in order:
//! `Entered -> Liquidating -> RepaySizing -> Swapping -> Repaying -> Returned`.
//! Any failure aborts the whole operation.

use alloy::primitives::{Address, U256};
use flashliq_chain::{decode_context, FlashBorrower, FlashLender};
use std::fmt;
use tracing::{debug, warn};

use crate::error::{OperatorError, Result};
use crate::liquidation::liquidate;
use crate::operator::LiquidationOperator;
use crate::quote::ReserveOracle;
use crate::request::{CollateralReceipt, OperationRequest};
use crate::u256_math;

/// Callback progress, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStage {
    Entered,
    Liquidating,
    RepaySizing,
    Swapping,
    Repaying,
    Returned,
}

impl CallbackStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entered => "entered",
            Self::Liquidating => "liquidating",
            Self::RepaySizing => "repay_sizing",
            Self::Swapping => "swapping",
            Self::Repaying => "repaying",
            Self::Returned => "returned",
        }
    }
}

impl fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation currently waiting on its callback.
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    pub request: OperationRequest,
    /// Operator's debt-asset balance before the loan; never spent
    pub debt_baseline: U256,
    pub outcome: Option<CallbackOutcome>,
}

/// What the callback did, handed back to the orchestrator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallbackOutcome {
    pub receipt: CollateralReceipt,
    pub owed: U256,
    /// Collateral sold to cover the shortfall
    pub swap_input: U256,
}

impl<F: FlashLender> LiquidationOperator<F> {
    fn advance(stage: &mut CallbackStage, next: CallbackStage) {
        debug!(from = %stage, to = %next, "Callback stage");
        *stage = next;
    }

    fn handle_flash_loan(
        &self,
        stage: &mut CallbackStage,
        lender: Address,
        asset: Address,
        principal: U256,
        fee: U256,
        data: &[u8],
    ) -> Result<CallbackOutcome> {
        let me = self.address();

        if lender != self.lender.lender_address() {
            return Err(OperatorError::InvalidContext(format!(
                "callback from unexpected lender {lender}"
            )));
        }
        let (request, debt_baseline) = self
            .in_flight
            .lock()
            .as_ref()
            .filter(|pending| pending.outcome.is_none())
            .map(|pending| (pending.request.clone(), pending.debt_baseline))
            .ok_or_else(|| OperatorError::InvalidContext("no operation in progress".to_string()))?;

        let context = decode_context(data).map_err(|e| OperatorError::InvalidContext(e.to_string()))?;
        if context != request.context() || asset != context.debtAsset {
            return Err(OperatorError::InvalidContext(
                "callback context does not match the pending operation".to_string(),
            ));
        }

        Self::advance(stage, CallbackStage::Liquidating);
        let receipt = liquidate(
            self.ledger.as_ref(),
            self.pool.as_ref(),
            me,
            context.collateralAsset,
            context.debtAsset,
            context.borrower,
            context.debtToCover,
            principal,
        )?;

        Self::advance(stage, CallbackStage::RepaySizing);
        let lender_quote = principal.checked_add(fee).ok_or(OperatorError::ArithmeticOverflow)?;
        let owed = u256_math::loan_repayment_due(principal, self.lender.flash_fee_bps())?.max(lender_quote);
        // Only what is left of the loan counts toward repayment
        let on_hand = self.ledger.balance_of(asset, me).saturating_sub(debt_baseline);
        let shortfall = owed.saturating_sub(on_hand);
        debug!(owed = %owed, on_hand = %on_hand, shortfall = %shortfall, "Repayment sized");

        Self::advance(stage, CallbackStage::Swapping);
        let swap_input = if shortfall.is_zero() {
            U256::ZERO
        } else if receipt.asset == asset {
            return Err(OperatorError::Unprofitable {
                asset,
                required: owed,
                available: on_hand,
            });
        } else {
            let oracle = ReserveOracle::new(self.venue.as_ref());
            let pair = oracle.pair(receipt.asset, asset)?;
            let quote = oracle.quote_exact_output(pair, asset, shortfall)?;

            // The seized collateral must strictly exceed what the swap consumes
            if quote.amount_in >= receipt.amount {
                return Err(OperatorError::Unprofitable {
                    asset: receipt.asset,
                    required: quote.amount_in,
                    available: receipt.amount,
                });
            }

            let received = oracle.execute(self.ledger.as_ref(), me, &quote, me)?;
            if received < shortfall {
                return Err(OperatorError::InsufficientLiquidity(format!(
                    "swap delivered {received}, needed {shortfall}"
                )));
            }
            quote.amount_in
        };

        Self::advance(stage, CallbackStage::Repaying);
        self.ledger.transfer(asset, me, lender, owed)?;

        Self::advance(stage, CallbackStage::Returned);
        Ok(CallbackOutcome {
            receipt,
            owed,
            swap_input,
        })
    }
}

impl<F: FlashLender> FlashBorrower for LiquidationOperator<F> {
    type Error = OperatorError;

    fn borrower_address(&self) -> Address {
        self.address()
    }

    fn on_flash_loan(
        &self,
        lender: Address,
        asset: Address,
        principal: U256,
        fee: U256,
        data: &[u8],
    ) -> Result<()> {
        let mut stage = CallbackStage::Entered;
        debug!(lender = %lender, asset = %asset, principal = %principal, fee = %fee, "Flash callback entered");

        match self.handle_flash_loan(&mut stage, lender, asset, principal, fee, data) {
            Ok(outcome) => {
                if let Some(pending) = self.in_flight.lock().as_mut() {
                    pending.outcome = Some(outcome);
                }
                Ok(())
            }
            Err(err) => {
                warn!(stage = %stage, kind = err.kind(), error = %err, "Flash callback failed");
                Err(err)
            }
        }
    }
}
