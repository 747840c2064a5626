//! Centralized Contract Definitions
//!
//! All Solidity interfaces the engine talks to, defined with alloy's `sol!`
//! macro. Each interface carries `#[sol(rpc)]` so a contract instance can
//! issue calls through any alloy Provider.
//!
//! Author: AI-Generated
//! Created: 2026-08-03

use alloy::sol;

// ── Venue routers (Uniswap V2 compatible) ────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV2Router02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
    }
}

// ── ArbExecutor (deployed atomic arbitrage contract) ─────────────────

sol! {
    #[sol(rpc)]
    interface IArbExecutor {
        function executeArbitrage(address asset, uint256 amount, address venueA, address venueB, bytes calldata params) external;

        event ArbitrageExecuted(address indexed asset, uint256 amount, int256 profit, address venueA, address venueB);
    }
}
