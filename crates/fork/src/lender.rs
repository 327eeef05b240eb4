//! Fee-bearing flash lender on the fork.

use alloy::primitives::{Address, Bytes, U256};
use flashliq_chain::{AssetLedger, FlashBorrower, FlashLender, LedgerError};
use flashliq_core::u256_math;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::ledger::ForkedLedger;

/// Lends its own balance of any asset for one nested call.
#[derive(Debug, Clone)]
pub struct ForkFlashLender {
    address: Address,
    ledger: ForkedLedger,
    fee_bps: u16,
    entered: Arc<AtomicBool>,
}

/// Clears the reentrancy flag on every exit path.
struct EntryGuard<'a>(&'a AtomicBool);

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ForkFlashLender {
    pub fn new(ledger: ForkedLedger, address: Address, fee_bps: u16) -> Self {
        Self {
            address,
            ledger,
            fee_bps,
            entered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Seed lendable liquidity.
    pub fn fund(&self, asset: Address, amount: U256) {
        self.ledger.mint(asset, self.address, amount);
    }
}

impl FlashLender for ForkFlashLender {
    fn lender_address(&self) -> Address {
        self.address
    }

    fn flash_fee_bps(&self) -> u16 {
        self.fee_bps
    }

    fn flash_loan<B: FlashBorrower + ?Sized>(
        &self,
        borrower: &B,
        asset: Address,
        amount: U256,
        data: Bytes,
    ) -> Result<(), B::Error> {
        if self.entered.swap(true, Ordering::SeqCst) {
            return Err(LedgerError::Reentrancy(self.address).into());
        }
        let _guard = EntryGuard(&self.entered);

        let fee = u256_math::flash_fee(amount, self.fee_bps)
            .map_err(|e| LedgerError::revert(e.to_string()))?;
        let receiver = borrower.borrower_address();
        let before = self.ledger.balance_of(asset, self.address);

        self.ledger.transfer(asset, self.address, receiver, amount)?;
        borrower.on_flash_loan(self.address, asset, amount, fee, &data)?;

        let expected = before
            .checked_add(fee)
            .ok_or_else(|| LedgerError::revert("fee overflow"))?;
        let actual = self.ledger.balance_of(asset, self.address);
        if actual < expected {
            return Err(LedgerError::FlashLoanNotRepaid {
                asset,
                expected,
                actual,
            }
            .into());
        }

        debug!(asset = %asset, amount = %amount, fee = %fee, "Flash loan repaid");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LENDER: Address = Address::repeat_byte(0x1e);
    const ASSET: Address = Address::repeat_byte(0xdd);

    /// Borrower that repays `repay` and optionally re-enters the lender.
    struct TestBorrower {
        address: Address,
        ledger: ForkedLedger,
        lender: ForkFlashLender,
        repay: U256,
        reenter: bool,
    }

    impl FlashBorrower for TestBorrower {
        type Error = LedgerError;

        fn borrower_address(&self) -> Address {
            self.address
        }

        fn on_flash_loan(
            &self,
            lender: Address,
            asset: Address,
            _principal: U256,
            _fee: U256,
            _data: &[u8],
        ) -> Result<(), LedgerError> {
            if self.reenter {
                self.lender.flash_loan(self, asset, U256::from(1u8), Bytes::new())?;
            }
            self.ledger.transfer(asset, self.address, lender, self.repay)
        }
    }

    fn setup(repay: u64, reenter: bool) -> (ForkedLedger, ForkFlashLender, TestBorrower) {
        let ledger = ForkedLedger::new();
        let lender = ForkFlashLender::new(ledger.clone(), LENDER, 30);
        lender.fund(ASSET, U256::from(1_000_000u64));
        let borrower_address = Address::repeat_byte(0xb0);
        // Borrower pre-funded to cover the fee
        ledger.mint(ASSET, borrower_address, U256::from(1_000u64));
        let borrower = TestBorrower {
            address: borrower_address,
            ledger: ledger.clone(),
            lender: lender.clone(),
            repay: U256::from(repay),
            reenter,
        };
        (ledger, lender, borrower)
    }

    #[test]
    fn test_repaid_loan() {
        let (ledger, lender, borrower) = setup(10_030, false);
        lender
            .flash_loan(&borrower, ASSET, U256::from(10_000u64), Bytes::new())
            .unwrap();
        assert_eq!(ledger.balance_of(ASSET, LENDER), U256::from(1_000_030u64));
    }

    #[test]
    fn test_short_repayment() {
        let (_, lender, borrower) = setup(10_029, false);
        let err = lender
            .flash_loan(&borrower, ASSET, U256::from(10_000u64), Bytes::new())
            .unwrap_err();
        assert!(matches!(err, LedgerError::FlashLoanNotRepaid { .. }));
    }

    #[test]
    fn test_reentrancy_rejected() {
        let (_, lender, borrower) = setup(10_030, true);
        let err = lender
            .flash_loan(&borrower, ASSET, U256::from(10_000u64), Bytes::new())
            .unwrap_err();
        assert_eq!(err, LedgerError::Reentrancy(LENDER));

        // Guard released after the failed call
        let plain = TestBorrower {
            address: borrower.address,
            ledger: borrower.ledger.clone(),
            lender: lender.clone(),
            repay: U256::from(10_030u64),
            reenter: false,
        };
        assert!(lender.flash_loan(&plain, ASSET, U256::from(10_000u64), Bytes::new()).is_ok());
    }
}
