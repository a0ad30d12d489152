//! Centralized Contract Definitions
//!
//! Solidity interfaces the engine reads from or calls into, defined with
//! alloy's `sol!` macro and annotated `#[sol(rpc)]` so each generates a
//! contract instance usable against any alloy `Provider`.
//!
//! Kept from the source's contract set: the read-only interfaces the Price
//! Monitor's concrete `PoolReader` implementation calls (`IUniswapV2Pair`,
//! `UniswapV3Pool`, `AlgebraPool`). Added `ILbPair` for the binned-liquidity
//! venue, which the source never modeled. Replaced the narrower
//! `IArbExecutor::executeArb(...)` single-pair call with `IFlashArbExecutor`,
//! matching the wire contract in SPEC_FULL.md §6:
//! `(flashLoanProvider, flashLoanToken, flashLoanAmount, steps[])`.

use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}

// ── Uniswap V2 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

// ── Uniswap V3 / concentrated liquidity ───────────────────────────────

sol! {
    #[sol(rpc)]
    interface UniswapV3Pool {
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
        function liquidity() external view returns (uint128);
        function fee() external view returns (uint24);
        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

// ── Algebra (QuickSwap V3-style dynamic fee) ──────────────────────────

sol! {
    #[sol(rpc)]
    interface AlgebraPool {
        function globalState() external view returns (uint160 price, int24 tick, uint16 fee, uint16 timepointIndex, uint8 communityFeeToken0, uint8 communityFeeToken1, bool unlocked);
        function liquidity() external view returns (uint128);
        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

// ── Binned liquidity (Trader Joe Liquidity Book-style) ────────────────

sol! {
    #[sol(rpc)]
    interface ILbPair {
        function getActiveId() external view returns (uint24 activeId);
        function getBinStep() external view returns (uint16 binStep);
        function tokenX() external view returns (address);
        function tokenY() external view returns (address);
    }
}

// ── Flash-loan arbitrage executor (atomic on-chain counterpart) ───────

sol! {
    #[sol(rpc)]
    interface IFlashArbExecutor {
        struct SwapStep {
            address adapter;
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            bytes extraData;
        }

        function executeArbitrage(
            address flashLoanProvider,
            address flashLoanToken,
            uint256 flashLoanAmount,
            SwapStep[] calldata steps
        ) external returns (uint256 profit);
    }
}
