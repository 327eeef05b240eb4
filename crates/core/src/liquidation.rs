//! Liquidation invocation against the lending pool.

use alloy::primitives::{Address, U256};
use flashliq_chain::{AssetLedger, LendingPool, LiquidationCallParams};
use tracing::{debug, warn};

use crate::error::{OperatorError, Result};
use crate::request::CollateralReceipt;

/// Repay `debt_to_cover` of `borrower`'s `debt_asset` debt and seize
/// `collateral_asset`, acting as `liquidator`.
///
/// The pool is approved for at most `spend_limit` of the debt asset and the
/// allowance is reset to zero afterwards. The returned amount is the measured
/// collateral balance delta; the pool's own report is only cross-checked.
#[allow(clippy::too_many_arguments)]
pub fn liquidate(
    ledger: &dyn AssetLedger,
    pool: &dyn LendingPool,
    liquidator: Address,
    collateral_asset: Address,
    debt_asset: Address,
    borrower: Address,
    debt_to_cover: U256,
    spend_limit: U256,
) -> Result<CollateralReceipt> {
    let spender = pool.pool_address();
    let collateral_before = ledger.balance_of(collateral_asset, liquidator);
    let debt_before = ledger.balance_of(debt_asset, liquidator);

    let allowance = debt_to_cover.min(spend_limit).min(debt_before);
    ledger.approve(debt_asset, liquidator, spender, allowance)?;

    let params = LiquidationCallParams {
        collateralAsset: collateral_asset,
        debtAsset: debt_asset,
        user: borrower,
        debtToCover: debt_to_cover,
        receiveAToken: false,
    };
    let reported = pool.liquidation_call(liquidator, &params).map_err(|e| {
        warn!(borrower = %borrower, error = %e, "Lending pool rejected liquidation");
        OperatorError::LiquidationRejected(e.to_string())
    })?;

    ledger.approve(debt_asset, liquidator, spender, U256::ZERO)?;

    let collateral_after = ledger.balance_of(collateral_asset, liquidator);
    let debt_after = ledger.balance_of(debt_asset, liquidator);

    let amount = collateral_after
        .checked_sub(collateral_before)
        .filter(|delta| !delta.is_zero())
        .ok_or_else(|| {
            OperatorError::LiquidationRejected(format!(
                "no {collateral_asset} received from liquidation of {borrower}"
            ))
        })?;
    let debt_repaid = debt_before.saturating_sub(debt_after);

    if reported != amount {
        warn!(
            reported = %reported,
            measured = %amount,
            "Pool-reported collateral differs from measured balance change"
        );
    }

    debug!(
        borrower = %borrower,
        collateral = %amount,
        debt_repaid = %debt_repaid,
        "Liquidation call settled"
    );

    Ok(CollateralReceipt {
        asset: collateral_asset,
        amount,
        debt_repaid,
        reported,
    })
}
