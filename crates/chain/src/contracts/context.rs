//! Flash-loan callback context.
//!
//! The operator hands the lender an opaque `bytes` payload when it requests
//! liquidity; the lender passes it back untouched when it re-enters the
//! operator's callback. The payload is `abi.encode(LiquidationContext)`.

use alloy::primitives::Bytes;
use alloy::sol;
use alloy::sol_types::SolType;

sol! {
    /// Request fields the callback needs to finish the liquidation.
    #[derive(Debug, PartialEq, Eq)]
    struct LiquidationContext {
        address collateralAsset;
        address debtAsset;
        address borrower;
        uint256 debtToCover;
        bool receiveAsCollateral;
    }
}

/// Encode a context into callback payload bytes.
pub fn encode_context(context: &LiquidationContext) -> Bytes {
    Bytes::from(LiquidationContext::abi_encode(context))
}

/// Decode callback payload bytes back into a context.
///
/// Strict decoding: trailing or malformed data is rejected.
pub fn decode_context(data: &[u8]) -> Result<LiquidationContext, alloy::sol_types::Error> {
    LiquidationContext::abi_decode(data, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};

    #[test]
    fn test_context_codec() {
        let context = LiquidationContext {
            collateralAsset: Address::repeat_byte(1),
            debtAsset: Address::repeat_byte(2),
            borrower: Address::repeat_byte(3),
            debtToCover: U256::MAX,
            receiveAsCollateral: true,
        };

        let encoded = encode_context(&context);
        // Five static words
        assert_eq!(encoded.len(), 5 * 32);
        assert_eq!(decode_context(&encoded).unwrap(), context);
    }

    #[test]
    fn test_truncated_context_rejected() {
        let context = LiquidationContext {
            collateralAsset: Address::repeat_byte(1),
            debtAsset: Address::repeat_byte(2),
            borrower: Address::repeat_byte(3),
            debtToCover: U256::from(50_000u64),
            receiveAsCollateral: false,
        };

        let encoded = encode_context(&context);
        assert!(decode_context(&encoded[..64]).is_err());
        assert!(decode_context(&[]).is_err());
    }
}
