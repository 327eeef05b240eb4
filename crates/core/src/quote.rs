//! Reserve adapter for constant-product pairs.
//!
//! Quotes are always derived from reserves read at call time, never cached.

use alloy::primitives::{Address, U256};
use flashliq_chain::{AssetLedger, PairReserves, SwapVenue};
use tracing::debug;

use crate::error::{OperatorError, Result};
use crate::request::SwapQuote;
use crate::u256_math;

fn not_traded(pair: Address, asset: Address) -> OperatorError {
    OperatorError::InsufficientLiquidity(format!("pair {pair} does not trade {asset}"))
}

/// Quotes trades against a [`SwapVenue`]'s live reserves.
pub struct ReserveOracle<'a> {
    venue: &'a dyn SwapVenue,
}

impl<'a> ReserveOracle<'a> {
    pub fn new(venue: &'a dyn SwapVenue) -> Self {
        Self { venue }
    }

    /// Pair trading `token_a` against `token_b`.
    pub fn pair(&self, token_a: Address, token_b: Address) -> Result<Address> {
        self.venue.pair_for(token_a, token_b).ok_or_else(|| {
            OperatorError::InsufficientLiquidity(format!("no pair for {token_a}/{token_b}"))
        })
    }

    fn reserves(&self, pair: Address, asset: Address) -> Result<(PairReserves, Address)> {
        let reserves = self.venue.reserves(pair)?;
        let other = reserves
            .counterpart(asset)
            .ok_or_else(|| not_traded(pair, asset))?;
        Ok((reserves, other))
    }

    /// Input needed to receive exactly `desired_out` of `asset_out`.
    pub fn quote_exact_output(
        &self,
        pair: Address,
        asset_out: Address,
        desired_out: U256,
    ) -> Result<SwapQuote> {
        let (reserves, asset_in) = self.reserves(pair, asset_out)?;
        let (reserve_in, reserve_out) = reserves
            .oriented(asset_in)
            .ok_or_else(|| not_traded(pair, asset_in))?;

        let amount_in = u256_math::swap_input_given_output(
            reserve_in,
            reserve_out,
            desired_out,
            self.venue.fee_bps(),
        )?;

        Ok(SwapQuote {
            pair,
            asset_in,
            asset_out,
            reserve_in,
            reserve_out,
            amount_in,
            amount_out: desired_out,
        })
    }

    /// Output received for selling exactly `amount_in` of `asset_in`.
    pub fn quote_exact_input(
        &self,
        pair: Address,
        asset_in: Address,
        amount_in: U256,
    ) -> Result<SwapQuote> {
        let (reserves, asset_out) = self.reserves(pair, asset_in)?;
        let (reserve_in, reserve_out) = reserves
            .oriented(asset_in)
            .ok_or_else(|| not_traded(pair, asset_in))?;

        let amount_out = u256_math::swap_output_given_input(
            reserve_in,
            reserve_out,
            amount_in,
            self.venue.fee_bps(),
        )?;

        Ok(SwapQuote {
            pair,
            asset_in,
            asset_out,
            reserve_in,
            reserve_out,
            amount_in,
            amount_out,
        })
    }

    /// Execute `quote` for `trader`, paying out to `recipient`.
    ///
    /// Returns the measured increase of `recipient`'s `asset_out` balance.
    pub fn execute(
        &self,
        ledger: &dyn AssetLedger,
        trader: Address,
        quote: &SwapQuote,
        recipient: Address,
    ) -> Result<U256> {
        let reserves = self.venue.reserves(quote.pair)?;
        let (amount0_out, amount1_out) = reserves
            .amounts_out(quote.asset_out, quote.amount_out)
            .ok_or_else(|| not_traded(quote.pair, quote.asset_out))?;

        let before = ledger.balance_of(quote.asset_out, recipient);

        ledger.transfer(quote.asset_in, trader, quote.pair, quote.amount_in)?;
        self.venue
            .swap(trader, quote.pair, amount0_out, amount1_out, recipient)
            .map_err(|e| OperatorError::InsufficientLiquidity(e.to_string()))?;

        let received = ledger
            .balance_of(quote.asset_out, recipient)
            .saturating_sub(before);

        debug!(
            pair = %quote.pair,
            amount_in = %quote.amount_in,
            quoted_out = %quote.amount_out,
            received = %received,
            "Swap executed"
        );

        Ok(received)
    }
}
