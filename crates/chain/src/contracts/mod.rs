//! Contract bindings for the operator's collaborators.
//!
//! This module provides the ABI surface shared by every collaborator:
//! - `ILendingPool`: Aave-style pool exposing `liquidationCall`
//! - `IUniswapV2Pair`: constant-product pair (swap events)
//! - `IERC20` / `IWETH`: fungible token and wrapped native token
//! - `ILiquidationOperator`: the operator's own entry point and event
//!
//! The [`context`] module encodes the opaque payload the flash lender hands
//! back to the operator's callback.

mod context;

pub use context::{decode_context, encode_context, LiquidationContext};

use alloy::sol;

// Lending pool interface
sol! {
    /// Aave-style lending pool (subset needed for liquidation)
    interface ILendingPool {
        event LiquidationCall(
            address indexed collateralAsset,
            address indexed debtAsset,
            address indexed user,
            uint256 debtToCover,
            uint256 liquidatedCollateralAmount,
            address liquidator,
            bool receiveAToken
        );

        /// Repay `debtToCover` of `user`'s debt and seize discounted collateral.
        /// `type(uint256).max` requests the protocol's full close amount.
        function liquidationCall(
            address collateralAsset,
            address debtAsset,
            address user,
            uint256 debtToCover,
            bool receiveAToken
        ) external;
    }
}

// Constant-product pair interface
sol! {
    interface IUniswapV2Pair {
        event Swap(
            address indexed sender,
            uint256 amount0In,
            uint256 amount1In,
            uint256 amount0Out,
            uint256 amount1Out,
            address indexed to
        );

        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function swap(uint256 amount0Out, uint256 amount1Out, address to, bytes calldata data) external;
    }
}

// Token interfaces
sol! {
    /// Standard ERC20 interface (subset for liquidation needs)
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);

        function balanceOf(address account) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    /// Wrapped native token
    interface IWETH {
        event Withdrawal(address indexed src, uint256 wad);

        function withdraw(uint256 wad) external;
    }
}

// Operator interface
sol! {
    /// The flash liquidation operator's public surface.
    interface ILiquidationOperator {
        event LiquidationCompleted(
            address indexed borrower,
            address indexed collateralAsset,
            address indexed debtAsset,
            address profitAsset,
            uint256 profit
        );

        function operate(
            address collateralAsset,
            address debtAsset,
            uint256 debtToCover,
            address borrower,
            bool receiveAsCollateral
        ) external;
    }
}
