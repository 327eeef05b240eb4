//! Flash liquidation orchestrator.
//!
//! `operate` borrows the debt asset, lets the callback liquidate and repay,
//! then settles whatever is left to the caller. It must run inside one
//! ledger transaction: on any error the caller reverts every state change.

use alloy::primitives::{Address, Log, U256};
use alloy::sol_types::SolEvent;
use flashliq_chain::{
    encode_context, AssetLedger, FlashLender, ILiquidationOperator, LendingPool, SwapVenue,
    WrappedNative,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::callback::InFlight;
use crate::config::OperatorConfig;
use crate::error::{OperatorError, Result};
use crate::quote::ReserveOracle;
use crate::request::{FlashLoan, OperationRequest, ProfitAsset, ProfitResult, SwapQuote};
use crate::u256_math;

/// Everything the operator talks to.
pub struct Collaborators<F> {
    pub ledger: Arc<dyn AssetLedger>,
    pub pool: Arc<dyn LendingPool>,
    pub venue: Arc<dyn SwapVenue>,
    pub lender: F,
    pub wrapped_native: Arc<dyn WrappedNative>,
}

/// Flash liquidation operator.
pub struct LiquidationOperator<F: FlashLender> {
    pub(crate) config: OperatorConfig,
    pub(crate) ledger: Arc<dyn AssetLedger>,
    pub(crate) pool: Arc<dyn LendingPool>,
    pub(crate) venue: Arc<dyn SwapVenue>,
    pub(crate) lender: F,
    pub(crate) wrapped_native: Arc<dyn WrappedNative>,
    /// Set for the duration of one `operate` call
    pub(crate) in_flight: Mutex<Option<InFlight>>,
}

impl<F: FlashLender> LiquidationOperator<F> {
    /// Create an operator. Collaborator addresses must match the configuration.
    pub fn new(config: OperatorConfig, collaborators: Collaborators<F>) -> anyhow::Result<Self> {
        config.validate()?;

        let contracts = &config.contracts;
        anyhow::ensure!(
            collaborators.pool.pool_address() == contracts.lending_pool,
            "lending pool at {} but configured {}",
            collaborators.pool.pool_address(),
            contracts.lending_pool
        );
        anyhow::ensure!(
            collaborators.lender.lender_address() == contracts.flash_lender,
            "flash lender at {} but configured {}",
            collaborators.lender.lender_address(),
            contracts.flash_lender
        );
        anyhow::ensure!(
            collaborators.wrapped_native.token_address() == contracts.wrapped_native,
            "wrapped native at {} but configured {}",
            collaborators.wrapped_native.token_address(),
            contracts.wrapped_native
        );

        Ok(Self {
            config,
            ledger: collaborators.ledger,
            pool: collaborators.pool,
            venue: collaborators.venue,
            lender: collaborators.lender,
            wrapped_native: collaborators.wrapped_native,
            in_flight: Mutex::new(None),
        })
    }

    /// The operator's own account.
    pub fn address(&self) -> Address {
        self.config.contracts.operator
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// Liquidate `request.borrower` with borrowed funds and pay the profit
    /// to `caller`.
    #[instrument(skip(self, caller, request), fields(borrower = %request.borrower, caller = %caller))]
    pub fn operate(&self, caller: Address, request: OperationRequest) -> Result<ProfitResult> {
        request.validate()?;
        let me = self.address();

        let loan = FlashLoan {
            asset: request.debt_asset,
            principal: self.size_principal(&request)?,
            fee_bps: self.lender.flash_fee_bps(),
            context: encode_context(&request.context()),
        };
        let repayment_due = loan.repayment_due()?;
        info!(
            collateral = %request.collateral_asset,
            debt = %request.debt_asset,
            principal = %loan.principal,
            repayment_due = %repayment_due,
            full_close = request.is_full_close(),
            "Requesting flash loan"
        );

        let collateral_before = self.ledger.balance_of(request.collateral_asset, me);
        let debt_before = self.ledger.balance_of(request.debt_asset, me);

        {
            let mut slot = self.in_flight.lock();
            if slot.is_some() {
                return Err(OperatorError::InvalidRequest(
                    "an operation is already in progress".to_string(),
                ));
            }
            *slot = Some(InFlight {
                request: request.clone(),
                debt_baseline: debt_before,
                outcome: None,
            });
        }

        let loan_result = self
            .lender
            .flash_loan(self, loan.asset, loan.principal, loan.context.clone());
        let pending = self.in_flight.lock().take();
        loan_result?;

        let outcome = pending.and_then(|p| p.outcome).ok_or_else(|| {
            OperatorError::InvalidContext("flash loan returned without running the callback".to_string())
        })?;

        let collateral_residual = self.residual(request.collateral_asset, collateral_before)?;
        let debt_surplus = self.residual(request.debt_asset, debt_before)?;

        let (asset, amount, debt_forwarded) = if request.receive_as_collateral {
            self.settle_collateral(&request, caller, collateral_residual, debt_surplus)?
        } else {
            self.settle_native(&request, caller, collateral_residual, debt_surplus)?
        };

        if amount <= self.config.execution.min_profit {
            return Err(OperatorError::Unprofitable {
                asset: asset.address(),
                required: self.config.execution.min_profit,
                available: amount,
            });
        }

        let event = ILiquidationOperator::LiquidationCompleted {
            borrower: request.borrower,
            collateralAsset: request.collateral_asset,
            debtAsset: request.debt_asset,
            profitAsset: asset.address(),
            profit: amount,
        };
        self.ledger.emit(Log {
            address: me,
            data: event.encode_log_data(),
        });

        info!(
            profit_asset = %asset,
            profit = %amount,
            collateral_seized = %outcome.receipt.amount,
            debt_repaid = %outcome.receipt.debt_repaid,
            swap_input = %outcome.swap_input,
            "Liquidation completed"
        );

        Ok(ProfitResult {
            asset,
            amount,
            borrower: request.borrower,
            collateral_seized: outcome.receipt.amount,
            debt_repaid: outcome.receipt.debt_repaid,
            flash_principal: loan.principal,
            flash_fee: outcome.owed.saturating_sub(loan.principal),
            swap_input: outcome.swap_input,
            debt_surplus: debt_forwarded,
        })
    }

    /// Flash loan principal: the requested amount, or the pool's full close
    /// amount for the sentinel.
    fn size_principal(&self, request: &OperationRequest) -> Result<U256> {
        let principal = if request.is_full_close() {
            self.pool
                .max_debt_to_cover(request.collateral_asset, request.debt_asset, request.borrower)
                .map_err(|e| OperatorError::LiquidationRejected(e.to_string()))?
        } else {
            request.debt_to_cover
        };
        if principal.is_zero() {
            return Err(OperatorError::LiquidationRejected(format!(
                "no {} debt to cover for {}",
                request.debt_asset, request.borrower
            )));
        }
        Ok(principal)
    }

    /// Increase of the operator's `asset` balance over `before`.
    ///
    /// Funds the operator held before the operation are never spent.
    fn residual(&self, asset: Address, before: U256) -> Result<U256> {
        let after = self.ledger.balance_of(asset, self.address());
        after.checked_sub(before).ok_or(OperatorError::Unprofitable {
            asset,
            required: before,
            available: after,
        })
    }

    /// Hand residual collateral (and any unspent debt asset) to the caller.
    fn settle_collateral(
        &self,
        request: &OperationRequest,
        caller: Address,
        collateral_residual: U256,
        debt_surplus: U256,
    ) -> Result<(ProfitAsset, U256, U256)> {
        let me = self.address();
        if !collateral_residual.is_zero() {
            self.ledger
                .transfer(request.collateral_asset, me, caller, collateral_residual)?;
        }
        if !debt_surplus.is_zero() {
            self.ledger.transfer(request.debt_asset, me, caller, debt_surplus)?;
        }
        Ok((
            ProfitAsset::Token(request.collateral_asset),
            collateral_residual,
            debt_surplus,
        ))
    }

    /// Convert residual collateral to native and send it to the caller.
    ///
    /// Unspent debt asset is converted too when the venue can price it;
    /// otherwise it is forwarded as a token.
    fn settle_native(
        &self,
        request: &OperationRequest,
        caller: Address,
        collateral_residual: U256,
        debt_surplus: U256,
    ) -> Result<(ProfitAsset, U256, U256)> {
        let me = self.address();
        let native_before = self.ledger.native_balance(me);

        let wrapped = self.wrapped_native.token_address();
        let oracle = ReserveOracle::new(self.venue.as_ref());

        let from_collateral = if request.collateral_asset == wrapped {
            collateral_residual
        } else if collateral_residual.is_zero() {
            U256::ZERO
        } else {
            let pair = oracle.pair(request.collateral_asset, wrapped)?;
            match self.settlement_quote(&oracle, pair, request.collateral_asset, collateral_residual)? {
                Some(quote) => self.swap_to_wrapped(&oracle, &quote)?,
                None => U256::ZERO,
            }
        };
        if !from_collateral.is_zero() {
            self.wrapped_native.withdraw(me, from_collateral)?;
        }

        let mut debt_forwarded = U256::ZERO;
        if !debt_surplus.is_zero() {
            // No pair or dust: forwarded untouched
            let quote = match self.venue.pair_for(request.debt_asset, wrapped) {
                Some(pair) => self.settlement_quote(&oracle, pair, request.debt_asset, debt_surplus)?,
                None => None,
            };
            match quote {
                Some(quote) => {
                    let received = self.swap_to_wrapped(&oracle, &quote)?;
                    self.wrapped_native.withdraw(me, received)?;
                }
                None => {
                    debug!(amount = %debt_surplus, "Forwarding unconvertible debt surplus");
                    self.ledger.transfer(request.debt_asset, me, caller, debt_surplus)?;
                    debt_forwarded = debt_surplus;
                }
            }
        }

        let native = self.ledger.native_balance(me).saturating_sub(native_before);
        self.ledger.transfer_native(me, caller, native)?;
        Ok((ProfitAsset::Native, native, debt_forwarded))
    }

    /// Quote selling `amount` of `asset` through `pair`.
    ///
    /// `None` when the amount is too small to produce any output.
    fn settlement_quote(
        &self,
        oracle: &ReserveOracle<'_>,
        pair: Address,
        asset: Address,
        amount: U256,
    ) -> Result<Option<SwapQuote>> {
        let quote = oracle.quote_exact_input(pair, asset, amount)?;
        Ok((!quote.amount_out.is_zero()).then_some(quote))
    }

    /// Execute a settlement swap into the wrapped native token, bounded by the
    /// configured slippage.
    fn swap_to_wrapped(&self, oracle: &ReserveOracle<'_>, quote: &SwapQuote) -> Result<U256> {
        let me = self.address();
        let min_out =
            u256_math::apply_basis_points(quote.amount_out, self.config.execution.settlement_slippage_bps);
        let received = oracle.execute(self.ledger.as_ref(), me, quote, me)?;
        if received < min_out {
            warn!(received = %received, min_out = %min_out, "Settlement swap below tolerance");
            return Err(OperatorError::InsufficientLiquidity(format!(
                "settlement swap returned {received}, expected at least {min_out}"
            )));
        }
        Ok(received)
    }
}
