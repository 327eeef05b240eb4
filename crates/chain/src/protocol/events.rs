//! Liquidation event decoding.
//!
//! The pool emits `LiquidationCall` with the borrower as its third indexed
//! topic. Consumers confirm which borrower was liquidated by filtering logs on
//! the pool address, the event signature and that topic.

use alloy::primitives::{Address, Log, B256, U256};
use alloy::sol_types::SolEvent;

use crate::contracts::ILendingPool::LiquidationCall;

/// Decoded `LiquidationCall` log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationRecord {
    /// Emitting pool
    pub pool: Address,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    /// Liquidated borrower
    pub user: Address,
    pub debt_to_cover: U256,
    pub liquidated_collateral: U256,
    pub liquidator: Address,
    pub receive_a_token: bool,
}

/// Topic encoding of a borrower address (left-padded to 32 bytes).
pub fn borrower_topic(borrower: Address) -> B256 {
    borrower.into_word()
}

/// Decode a `LiquidationCall` log, or `None` for any other log.
pub fn decode_liquidation(log: &Log) -> Option<LiquidationRecord> {
    let topics = log.data.topics();
    if topics.len() < 4 || topics[0] != LiquidationCall::SIGNATURE_HASH {
        return None;
    }

    let event = LiquidationCall::decode_log_data(&log.data, true).ok()?;
    Some(LiquidationRecord {
        pool: log.address,
        collateral_asset: event.collateralAsset,
        debt_asset: event.debtAsset,
        user: event.user,
        debt_to_cover: event.debtToCover,
        liquidated_collateral: event.liquidatedCollateralAmount,
        liquidator: event.liquidator,
        receive_a_token: event.receiveAToken,
    })
}

/// Number of `LiquidationCall` logs emitted by `pool`.
pub fn count_liquidations(logs: &[Log], pool: Address) -> usize {
    logs.iter()
        .filter(|log| log.address == pool)
        .filter_map(decode_liquidation)
        .count()
}

/// `LiquidationCall` logs emitted by `pool` that target `borrower`.
pub fn liquidations_of(logs: &[Log], pool: Address, borrower: Address) -> Vec<LiquidationRecord> {
    let topic = borrower_topic(borrower);
    logs.iter()
        .filter(|log| log.address == pool && log.data.topics().get(3) == Some(&topic))
        .filter_map(decode_liquidation)
        .collect()
}
