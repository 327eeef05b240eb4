//! U256 fixed-point arithmetic for flash liquidation.
//!
//! All amounts are raw token units. Every intermediate product is computed
//! in 256 bits with checked operations; an overflow is reported, never
//! truncated. Rounding always favours the counterparty that is owed:
//! the flash lender on fees, the swap venue on quotes.

use alloy::primitives::U256;
use thiserror::Error;

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10000u64, 0, 0, 0]);

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// 10^exp for token decimals. Exponents up to 38 fit in a `u128`.
#[inline]
pub fn pow10(exp: u8) -> U256 {
    match 10u128.checked_pow(u32::from(exp)) {
        Some(value) => U256::from(value),
        None => U256::from(10u64).pow(U256::from(exp)),
    }
}

/// Arithmetic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("fee of {0} bps exceeds 100%")]
    InvalidFee(u16),

    #[error("pair has an empty reserve")]
    ZeroReserves,

    #[error("requested {requested} but reserve holds {reserve}")]
    InsufficientLiquidity { requested: U256, reserve: U256 },
}

fn bps(fee_bps: u16) -> Result<U256, MathError> {
    if fee_bps > 10000 {
        return Err(MathError::InvalidFee(fee_bps));
    }
    Ok(U256::from(fee_bps))
}

/// `a * b / d`, rounded down.
#[inline]
pub fn mul_div(a: U256, b: U256, d: U256) -> Result<U256, MathError> {
    if d.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    Ok(a.checked_mul(b).ok_or(MathError::Overflow)? / d)
}

/// `a * b / d`, rounded up.
#[inline]
pub fn mul_div_up(a: U256, b: U256, d: U256) -> Result<U256, MathError> {
    if d.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(MathError::Overflow)?;
    let (quotient, remainder) = product.div_rem(d);
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        // d > 1 here, so quotient + 1 cannot wrap
        Ok(quotient + U256::from(1u8))
    }
}

/// Flash-loan fee on `principal`: `ceil(principal * fee_bps / 10000)`.
#[inline]
pub fn flash_fee(principal: U256, fee_bps: u16) -> Result<U256, MathError> {
    mul_div_up(principal, bps(fee_bps)?, BPS_DENOMINATOR)
}

/// Amount owed back to the flash lender: principal plus rounded-up fee.
///
/// Example: loan_repayment_due(10000, 9) = 10009
#[inline]
pub fn loan_repayment_due(principal: U256, fee_bps: u16) -> Result<U256, MathError> {
    principal
        .checked_add(flash_fee(principal, fee_bps)?)
        .ok_or(MathError::Overflow)
}

/// Constant-product output for an exact input, fee taken from the input leg.
///
/// Formula: (in * (10000 - fee) * reserve_out) / (reserve_in * 10000 + in * (10000 - fee))
/// Rounded down, matching the venue.
pub fn swap_output_given_input(
    reserve_in: U256,
    reserve_out: U256,
    amount_in: U256,
    fee_bps: u16,
) -> Result<U256, MathError> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(MathError::ZeroReserves);
    }
    let fee_factor = BPS_DENOMINATOR - bps(fee_bps)?;

    let amount_in_with_fee = amount_in.checked_mul(fee_factor).ok_or(MathError::Overflow)?;
    let numerator = amount_in_with_fee
        .checked_mul(reserve_out)
        .ok_or(MathError::Overflow)?;
    let denominator = reserve_in
        .checked_mul(BPS_DENOMINATOR)
        .and_then(|d| d.checked_add(amount_in_with_fee))
        .ok_or(MathError::Overflow)?;

    Ok(numerator / denominator)
}

/// Constant-product input required for an exact output.
///
/// Formula: ceil((reserve_in * out * 10000) / ((reserve_out - out) * (10000 - fee)))
/// Rounded up, so the venue's invariant check always passes.
pub fn swap_input_given_output(
    reserve_in: U256,
    reserve_out: U256,
    amount_out: U256,
    fee_bps: u16,
) -> Result<U256, MathError> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(MathError::ZeroReserves);
    }
    if amount_out >= reserve_out {
        return Err(MathError::InsufficientLiquidity {
            requested: amount_out,
            reserve: reserve_out,
        });
    }
    let fee_factor = BPS_DENOMINATOR - bps(fee_bps)?;
    if fee_factor.is_zero() {
        return Err(MathError::InvalidFee(fee_bps));
    }

    let numerator = reserve_in
        .checked_mul(amount_out)
        .ok_or(MathError::Overflow)?;
    let denominator = (reserve_out - amount_out)
        .checked_mul(fee_factor)
        .ok_or(MathError::Overflow)?;

    mul_div_up(numerator, BPS_DENOMINATOR, denominator)
}

/// Apply basis points reduction (e.g., for slippage).
/// Returns: value * (10000 - basis_points) / 10000
///
/// Example: apply_basis_points(1000, 100) = 990 (1% reduction)
#[inline(always)]
pub fn apply_basis_points(value: U256, basis_points: u16) -> U256 {
    let factor = U256::from(10000u16.saturating_sub(basis_points));
    value.saturating_mul(factor) / BPS_DENOMINATOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u128) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_apply_basis_points() {
        // 1% reduction (100 bps)
        let value = U256::from(1000u64);
        assert_eq!(apply_basis_points(value, 100), U256::from(990u64));

        // 10% reduction (1000 bps)
        assert_eq!(apply_basis_points(value, 1000), U256::from(900u64));

        // 0% reduction
        assert_eq!(apply_basis_points(value, 0), U256::from(1000u64));
    }

    #[test]
    fn test_loan_repayment_due_rounds_up() {
        assert_eq!(loan_repayment_due(u(10_000), 9).unwrap(), u(10_009));
        // 1 * 9 / 10000 rounds up to a full unit
        assert_eq!(loan_repayment_due(u(1), 9).unwrap(), u(2));
        // exact division adds nothing extra
        assert_eq!(loan_repayment_due(u(20_000), 30).unwrap(), u(20_060));
    }

    #[test]
    fn test_loan_repayment_due_zero_fee() {
        for p in [0u128, 1, 7, 2_916_378_221_684, 10u128.pow(18), 10u128.pow(30)] {
            assert_eq!(loan_repayment_due(u(p), 0).unwrap(), u(p));
        }
    }

    #[test]
    fn test_loan_repayment_due_monotonic() {
        let mut previous = U256::ZERO;
        for p in (0u128..5_000).chain([10u128.pow(18), 10u128.pow(18) + 1]) {
            let due = loan_repayment_due(u(p), 30).unwrap();
            assert!(due >= previous, "repayment decreased at principal {p}");
            assert!(due >= u(p));
            previous = due;
        }
    }

    #[test]
    fn test_loan_repayment_due_overflow() {
        assert_eq!(loan_repayment_due(U256::MAX, 30), Err(MathError::Overflow));
        assert_eq!(loan_repayment_due(u(1), 10_001), Err(MathError::InvalidFee(10_001)));
    }

    #[test]
    fn test_swap_output_given_input() {
        // 100 in against 1000/1000 at 0.3%: floor(90.66)
        assert_eq!(swap_output_given_input(u(1000), u(1000), u(100), 30).unwrap(), u(90));
        assert_eq!(swap_output_given_input(u(1000), u(1000), U256::ZERO, 30).unwrap(), U256::ZERO);
        assert_eq!(
            swap_output_given_input(U256::ZERO, u(1000), u(1), 30),
            Err(MathError::ZeroReserves)
        );
    }

    #[test]
    fn test_swap_input_given_output() {
        // 90 out of 1000/1000 at 0.3%: ceil(99.198)
        assert_eq!(swap_input_given_output(u(1000), u(1000), u(90), 30).unwrap(), u(100));
        assert!(matches!(
            swap_input_given_output(u(1000), u(1000), u(1000), 30),
            Err(MathError::InsufficientLiquidity { .. })
        ));
    }

    #[test]
    fn test_swap_quotes_favour_venue() {
        let reserves = [
            (u(1000), u(1000)),
            (u(5_000_000_000), u(3_000 * 10u128.pow(18))),
            (u(2_500 * 10u128.pow(18)), u(7_000_000 * 10u128.pow(6))),
        ];
        let inputs = [1u128, 3, 999, 12_345_678, 10u128.pow(15), 10u128.pow(18)];

        for (r_in, r_out) in reserves {
            for x in inputs {
                let out = swap_output_given_input(r_in, r_out, u(x), 30).unwrap();
                if out.is_zero() {
                    continue;
                }
                let back = swap_input_given_output(r_in, r_out, out, 30).unwrap();
                assert!(back <= u(x), "input {x} quoted back as {back}");
            }
        }
    }

    #[test]
    fn test_swap_overflow_is_reported() {
        assert_eq!(
            swap_output_given_input(u(1000), u(1000), U256::MAX, 30),
            Err(MathError::Overflow)
        );
    }

    #[test]
    fn test_pow10() {
        assert_eq!(pow10(0), u(1));
        assert_eq!(pow10(6), u(1_000_000));
        assert_eq!(pow10(18), WAD);
        assert_eq!(pow10(40), U256::from(10u64).pow(U256::from(40u64)));
    }

    #[test]
    fn test_mul_div_up() {
        assert_eq!(mul_div_up(u(7), u(3), u(2)).unwrap(), u(11));
        assert_eq!(mul_div_up(u(8), u(3), u(2)).unwrap(), u(12));
        assert_eq!(mul_div(u(7), u(3), u(2)).unwrap(), u(10));
        assert_eq!(mul_div(u(7), u(3), U256::ZERO), Err(MathError::DivisionByZero));
        assert_eq!(mul_div_up(u(7), u(3), U256::ZERO), Err(MathError::DivisionByZero));
    }
}
