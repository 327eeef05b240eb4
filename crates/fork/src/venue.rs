//! Constant-product pairs on the fork.
//!
//! Pair semantics follow Uniswap V2: the trader transfers the input to the
//! pair, then `swap` pays out the requested amounts and checks the
//! fee-adjusted invariant against the pair's actual balances.

use alloy::primitives::{keccak256, Address, Log, U256};
use alloy::sol_types::SolEvent;
use flashliq_chain::{IUniswapV2Pair, LedgerError, PairReserves, SwapVenue};
use flashliq_core::u256_math::BPS_DENOMINATOR;
use tracing::debug;

use crate::ledger::ForkedLedger;

/// Reserves recorded by a pair at its last sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairState {
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
}

fn sort_tokens(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}

/// Deterministic pair address for a token pair, independent of order.
pub fn pair_address(token_a: Address, token_b: Address) -> Address {
    let (token0, token1) = sort_tokens(token_a, token_b);
    let mut packed = [0u8; 40];
    packed[..20].copy_from_slice(token0.as_slice());
    packed[20..].copy_from_slice(token1.as_slice());
    Address::from_word(keccak256(packed))
}

/// Factory and router surface over all fork pairs.
#[derive(Debug, Clone)]
pub struct ForkSwapVenue {
    ledger: ForkedLedger,
    fee_bps: u16,
}

impl ForkSwapVenue {
    pub fn new(ledger: ForkedLedger, fee_bps: u16) -> Self {
        Self { ledger, fee_bps }
    }

    /// Create (or top up) the pair for `token_a`/`token_b` with the given
    /// liquidity and sync its reserves.
    pub fn add_liquidity(&self, token_a: Address, token_b: Address, amount_a: U256, amount_b: U256) -> Address {
        let pair = pair_address(token_a, token_b);
        let (token0, token1) = sort_tokens(token_a, token_b);

        self.ledger.write(|s| {
            s.mint(token_a, pair, amount_a);
            s.mint(token_b, pair, amount_b);
            let state = PairState {
                token0,
                token1,
                reserve0: s.balance(token0, pair),
                reserve1: s.balance(token1, pair),
            };
            s.pairs.insert(pair, state);
        });
        pair
    }
}

impl SwapVenue for ForkSwapVenue {
    fn pair_for(&self, token_a: Address, token_b: Address) -> Option<Address> {
        let pair = pair_address(token_a, token_b);
        self.ledger.read(|s| s.pairs.contains_key(&pair)).then_some(pair)
    }

    fn reserves(&self, pair: Address) -> Result<PairReserves, LedgerError> {
        self.ledger.read(|s| {
            let state = s
                .pairs
                .get(&pair)
                .ok_or_else(|| LedgerError::revert(format!("no pair at {pair}")))?;
            Ok(PairReserves {
                pair,
                token0: state.token0,
                token1: state.token1,
                reserve0: state.reserve0,
                reserve1: state.reserve1,
            })
        })
    }

    fn fee_bps(&self) -> u16 {
        self.fee_bps
    }

    fn swap(
        &self,
        caller: Address,
        pair: Address,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    ) -> Result<(), LedgerError> {
        let fee = U256::from(self.fee_bps);

        self.ledger.write(|s| {
            let state = s
                .pairs
                .get(&pair)
                .cloned()
                .ok_or_else(|| LedgerError::revert(format!("no pair at {pair}")))?;

            if amount0_out.is_zero() && amount1_out.is_zero() {
                return Err(LedgerError::revert("UniswapV2: INSUFFICIENT_OUTPUT_AMOUNT"));
            }
            if amount0_out >= state.reserve0 || amount1_out >= state.reserve1 {
                return Err(LedgerError::revert("UniswapV2: INSUFFICIENT_LIQUIDITY"));
            }
            if to == state.token0 || to == state.token1 {
                return Err(LedgerError::revert("UniswapV2: INVALID_TO"));
            }

            // Balances after paying out, before touching state
            let balance0 = s.balance(state.token0, pair).saturating_sub(amount0_out);
            let balance1 = s.balance(state.token1, pair).saturating_sub(amount1_out);

            let kept0 = state.reserve0 - amount0_out;
            let kept1 = state.reserve1 - amount1_out;
            let amount0_in = balance0.saturating_sub(kept0);
            let amount1_in = balance1.saturating_sub(kept1);
            if amount0_in.is_zero() && amount1_in.is_zero() {
                return Err(LedgerError::revert("UniswapV2: INSUFFICIENT_INPUT_AMOUNT"));
            }

            let overflow = || LedgerError::revert("UniswapV2: OVERFLOW");
            let adjusted0 = balance0
                .checked_mul(BPS_DENOMINATOR)
                .and_then(|b| b.checked_sub(amount0_in * fee))
                .ok_or_else(overflow)?;
            let adjusted1 = balance1
                .checked_mul(BPS_DENOMINATOR)
                .and_then(|b| b.checked_sub(amount1_in * fee))
                .ok_or_else(overflow)?;
            let k_after = adjusted0.checked_mul(adjusted1).ok_or_else(overflow)?;
            let k_before = state
                .reserve0
                .checked_mul(state.reserve1)
                .and_then(|k| k.checked_mul(BPS_DENOMINATOR * BPS_DENOMINATOR))
                .ok_or_else(overflow)?;
            if k_after < k_before {
                return Err(LedgerError::revert("UniswapV2: K"));
            }

            if !amount0_out.is_zero() {
                s.move_tokens(state.token0, pair, to, amount0_out)?;
            }
            if !amount1_out.is_zero() {
                s.move_tokens(state.token1, pair, to, amount1_out)?;
            }
            s.pairs.insert(
                pair,
                PairState {
                    reserve0: balance0,
                    reserve1: balance1,
                    ..state
                },
            );
            s.push_log(Log {
                address: pair,
                data: IUniswapV2Pair::Swap {
                    sender: caller,
                    amount0In: amount0_in,
                    amount1In: amount1_in,
                    amount0Out: amount0_out,
                    amount1Out: amount1_out,
                    to,
                }
                .encode_log_data(),
            });

            debug!(
                pair = %pair,
                amount0_in = %amount0_in,
                amount1_in = %amount1_in,
                amount0_out = %amount0_out,
                amount1_out = %amount1_out,
                "Pair swap"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashliq_chain::AssetLedger;
    use flashliq_core::u256_math;

    const TOKEN_A: Address = Address::repeat_byte(0x0a);
    const TOKEN_B: Address = Address::repeat_byte(0x0b);
    const TRADER: Address = Address::repeat_byte(0x77);

    fn venue() -> (ForkedLedger, ForkSwapVenue, Address) {
        let ledger = ForkedLedger::new();
        let venue = ForkSwapVenue::new(ledger.clone(), 30);
        let pair = venue.add_liquidity(TOKEN_A, TOKEN_B, U256::from(1_000_000u64), U256::from(2_000_000u64));
        (ledger, venue, pair)
    }

    #[test]
    fn test_pair_lookup_is_order_independent() {
        let (_, venue, pair) = venue();
        assert_eq!(venue.pair_for(TOKEN_B, TOKEN_A), Some(pair));
        assert_eq!(venue.pair_for(TOKEN_A, Address::ZERO), None);
    }

    #[test]
    fn test_exact_quote_passes_k_check() {
        let (ledger, venue, pair) = venue();
        let reserves = venue.reserves(pair).unwrap();
        let (r_in, r_out) = reserves.oriented(TOKEN_A).unwrap();

        let out = U256::from(10_000u64);
        let amount_in = u256_math::swap_input_given_output(r_in, r_out, out, 30).unwrap();
        ledger.mint(TOKEN_A, TRADER, amount_in);
        ledger.transfer(TOKEN_A, TRADER, pair, amount_in).unwrap();

        let (a0, a1) = reserves.amounts_out(TOKEN_B, out).unwrap();
        venue.swap(TRADER, pair, a0, a1, TRADER).unwrap();
        assert_eq!(ledger.balance_of(TOKEN_B, TRADER), out);
    }

    #[test]
    fn test_underpaid_swap_fails_k_check() {
        let (ledger, venue, pair) = venue();
        let reserves = venue.reserves(pair).unwrap();
        let (r_in, r_out) = reserves.oriented(TOKEN_A).unwrap();

        let out = U256::from(10_000u64);
        let amount_in = u256_math::swap_input_given_output(r_in, r_out, out, 30).unwrap() - U256::from(1u8);
        ledger.mint(TOKEN_A, TRADER, amount_in);
        ledger.transfer(TOKEN_A, TRADER, pair, amount_in).unwrap();

        let (a0, a1) = reserves.amounts_out(TOKEN_B, out).unwrap();
        let before = ledger.snapshot();
        assert_eq!(
            venue.swap(TRADER, pair, a0, a1, TRADER),
            Err(LedgerError::revert("UniswapV2: K"))
        );
        assert_eq!(ledger.snapshot(), before);
    }

    #[test]
    fn test_swap_without_input() {
        let (_, venue, pair) = venue();
        assert!(venue.swap(TRADER, pair, U256::from(1u8), U256::ZERO, TRADER).is_err());
    }
}
