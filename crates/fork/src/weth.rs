//! Wrapped native token on the fork.
//!
//! Native supply on the fork is unbounded: withdrawing credits native balance
//! without debiting a backing reserve.

use alloy::primitives::{Address, Log, U256};
use alloy::sol_types::SolEvent;
use flashliq_chain::{LedgerError, WrappedNative, IWETH};

use crate::ledger::ForkedLedger;

#[derive(Debug, Clone)]
pub struct ForkWrappedNative {
    address: Address,
    ledger: ForkedLedger,
}

impl ForkWrappedNative {
    pub fn new(ledger: ForkedLedger, address: Address) -> Self {
        Self { address, ledger }
    }
}

impl WrappedNative for ForkWrappedNative {
    fn token_address(&self) -> Address {
        self.address
    }

    fn withdraw(&self, owner: Address, amount: U256) -> Result<(), LedgerError> {
        self.ledger.write(|s| {
            s.burn(self.address, owner, amount)?;
            s.credit_native(owner, amount);
            s.push_log(Log {
                address: self.address,
                data: IWETH::Withdrawal { src: owner, wad: amount }.encode_log_data(),
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashliq_chain::AssetLedger;

    #[test]
    fn test_withdraw() {
        let ledger = ForkedLedger::new();
        let weth = ForkWrappedNative::new(ledger.clone(), Address::repeat_byte(0xee));
        let owner = Address::repeat_byte(0x01);
        ledger.mint(weth.token_address(), owner, U256::from(5u64));

        weth.withdraw(owner, U256::from(3u64)).unwrap();
        assert_eq!(ledger.balance_of(weth.token_address(), owner), U256::from(2u64));
        assert_eq!(ledger.native_balance(owner), U256::from(3u64));
        assert!(weth.withdraw(owner, U256::from(3u64)).is_err());
    }
}
