//! In-memory ledger with snapshot/revert.
//!
//! All fork state (token balances, allowances, native balances, logs, pool
//! positions and pair reserves) lives in one [`LedgerState`] behind a shared
//! lock, so a whole transaction can be rolled back by restoring a clone.
//!
//! The lock is only ever held for a single state access. It is never held
//! across a call into another collaborator.

use alloy::primitives::{Address, Log, U256};
use alloy::sol_types::SolEvent;
use flashliq_chain::{AssetLedger, LedgerError, IERC20};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::pool::LendingState;
use crate::venue::PairState;

/// Complete fork state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    /// (asset, account) -> balance
    balances: HashMap<(Address, Address), U256>,
    /// (asset, owner, spender) -> allowance
    allowances: HashMap<(Address, Address, Address), U256>,
    native: HashMap<Address, U256>,
    logs: Vec<Log>,
    /// Lending pools by address
    pub(crate) lending: HashMap<Address, LendingState>,
    /// Constant-product pairs by address
    pub(crate) pairs: HashMap<Address, PairState>,
}

impl LedgerState {
    pub fn balance(&self, asset: Address, account: Address) -> U256 {
        self.balances.get(&(asset, account)).copied().unwrap_or_default()
    }

    pub fn native_balance(&self, account: Address) -> U256 {
        self.native.get(&account).copied().unwrap_or_default()
    }

    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    pub(crate) fn push_log(&mut self, log: Log) {
        self.logs.push(log);
    }

    pub(crate) fn mint(&mut self, asset: Address, to: Address, amount: U256) {
        let balance = self.balances.entry((asset, to)).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub(crate) fn burn(&mut self, asset: Address, from: Address, amount: U256) -> Result<(), LedgerError> {
        let available = self.balance(asset, from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset,
                account: from,
                available,
                required: amount,
            });
        }
        self.balances.insert((asset, from), available - amount);
        Ok(())
    }

    /// Move tokens and log an ERC20 `Transfer`.
    pub(crate) fn move_tokens(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        self.burn(asset, from, amount)?;
        self.mint(asset, to, amount);
        self.push_log(Log {
            address: asset,
            data: IERC20::Transfer {
                from,
                to,
                value: amount,
            }
            .encode_log_data(),
        });
        Ok(())
    }

    pub(crate) fn credit_native(&mut self, account: Address, amount: U256) {
        let balance = self.native.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub(crate) fn debit_native(&mut self, account: Address, amount: U256) -> Result<(), LedgerError> {
        let available = self.native_balance(account);
        if available < amount {
            return Err(LedgerError::InsufficientNative {
                account,
                available,
                required: amount,
            });
        }
        self.native.insert(account, available - amount);
        Ok(())
    }

    pub fn allowance(&self, asset: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(asset, owner, spender))
            .copied()
            .unwrap_or_default()
    }
}

/// Result of a committed transaction.
#[derive(Debug, Clone)]
pub struct Receipt<T> {
    pub output: T,
    /// Logs emitted during the transaction
    pub logs: Vec<Log>,
}

/// Shared handle to the fork state.
#[derive(Debug, Clone, Default)]
pub struct ForkedLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl ForkedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> R {
        f(&self.state.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut LedgerState) -> R) -> R {
        f(&mut self.state.write())
    }

    /// Copy of the full state.
    pub fn snapshot(&self) -> LedgerState {
        self.state.read().clone()
    }

    /// Replace the full state.
    pub fn restore(&self, snapshot: LedgerState) {
        *self.state.write() = snapshot;
    }

    /// Run `f` atomically: every state change it made is reverted when it
    /// returns an error.
    pub fn transact<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<Receipt<T>, E> {
        let snapshot = self.snapshot();
        let first_log = snapshot.logs.len();

        match f() {
            Ok(output) => {
                let logs = self.read(|s| s.logs.get(first_log..).unwrap_or_default().to_vec());
                Ok(Receipt { output, logs })
            }
            Err(err) => {
                self.restore(snapshot);
                debug!("Transaction reverted");
                Err(err)
            }
        }
    }

    /// Create `amount` of `asset` for `to`.
    pub fn mint(&self, asset: Address, to: Address, amount: U256) {
        self.write(|s| s.mint(asset, to, amount));
    }

    /// Credit native balance.
    pub fn fund_native(&self, account: Address, amount: U256) {
        self.write(|s| s.credit_native(account, amount));
    }

    pub fn allowance(&self, asset: Address, owner: Address, spender: Address) -> U256 {
        self.read(|s| s.allowance(asset, owner, spender))
    }

    /// Spend `spender`'s allowance to move `owner`'s tokens.
    pub fn transfer_from(
        &self,
        asset: Address,
        spender: Address,
        owner: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        self.write(|s| {
            let available = s.allowance(asset, owner, spender);
            if available < amount {
                return Err(LedgerError::InsufficientAllowance {
                    asset,
                    owner,
                    spender,
                    available,
                    required: amount,
                });
            }
            s.move_tokens(asset, owner, to, amount)?;
            if available != U256::MAX {
                s.allowances.insert((asset, owner, spender), available - amount);
            }
            Ok(())
        })
    }

    /// All logs emitted so far.
    pub fn logs(&self) -> Vec<Log> {
        self.read(|s| s.logs.clone())
    }
}

impl AssetLedger for ForkedLedger {
    fn balance_of(&self, asset: Address, account: Address) -> U256 {
        self.read(|s| s.balance(asset, account))
    }

    fn native_balance(&self, account: Address) -> U256 {
        self.read(|s| s.native_balance(account))
    }

    fn transfer(&self, asset: Address, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        self.write(|s| s.move_tokens(asset, from, to, amount))
    }

    fn approve(
        &self,
        asset: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        self.write(|s| {
            s.allowances.insert((asset, owner, spender), amount);
            s.push_log(Log {
                address: asset,
                data: IERC20::Approval {
                    owner,
                    spender,
                    value: amount,
                }
                .encode_log_data(),
            });
        });
        Ok(())
    }

    fn transfer_native(&self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        self.write(|s| {
            s.debit_native(from, amount)?;
            s.credit_native(to, amount);
            Ok(())
        })
    }

    fn emit(&self, log: Log) {
        self.write(|s| s.push_log(log));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address::repeat_byte(0x70);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    #[test]
    fn test_transfer() {
        let ledger = ForkedLedger::new();
        ledger.mint(TOKEN, ALICE, U256::from(100u64));

        ledger.transfer(TOKEN, ALICE, BOB, U256::from(40u64)).unwrap();
        assert_eq!(ledger.balance_of(TOKEN, ALICE), U256::from(60u64));
        assert_eq!(ledger.balance_of(TOKEN, BOB), U256::from(40u64));

        let err = ledger.transfer(TOKEN, BOB, ALICE, U256::from(41u64)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.logs().len(), 1);
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let ledger = ForkedLedger::new();
        ledger.mint(TOKEN, ALICE, U256::from(100u64));
        ledger.approve(TOKEN, ALICE, BOB, U256::from(30u64)).unwrap();

        assert!(matches!(
            ledger.transfer_from(TOKEN, BOB, ALICE, BOB, U256::from(31u64)),
            Err(LedgerError::InsufficientAllowance { .. })
        ));
        ledger.transfer_from(TOKEN, BOB, ALICE, BOB, U256::from(30u64)).unwrap();
        assert_eq!(ledger.allowance(TOKEN, ALICE, BOB), U256::ZERO);
        assert_eq!(ledger.balance_of(TOKEN, BOB), U256::from(30u64));
    }

    #[test]
    fn test_transact_reverts_on_error() {
        let ledger = ForkedLedger::new();
        ledger.mint(TOKEN, ALICE, U256::from(100u64));
        let before = ledger.snapshot();

        let result: Result<Receipt<()>, LedgerError> = ledger.transact(|| {
            ledger.transfer(TOKEN, ALICE, BOB, U256::from(50u64))?;
            ledger.fund_native(BOB, U256::from(1u64));
            Err(LedgerError::revert("boom"))
        });

        assert!(result.is_err());
        assert_eq!(ledger.snapshot(), before);
    }

    #[test]
    fn test_transact_collects_logs() {
        let ledger = ForkedLedger::new();
        ledger.mint(TOKEN, ALICE, U256::from(100u64));
        ledger.transfer(TOKEN, ALICE, BOB, U256::from(1u64)).unwrap();

        let receipt = ledger
            .transact(|| ledger.transfer(TOKEN, ALICE, BOB, U256::from(2u64)))
            .unwrap();
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(ledger.logs().len(), 2);
    }

    #[test]
    fn test_native_transfer() {
        let ledger = ForkedLedger::new();
        ledger.fund_native(ALICE, U256::from(5u64));
        assert!(ledger.transfer_native(ALICE, BOB, U256::from(6u64)).is_err());
        ledger.transfer_native(ALICE, BOB, U256::from(5u64)).unwrap();
        assert_eq!(ledger.native_balance(BOB), U256::from(5u64));
    }
}
