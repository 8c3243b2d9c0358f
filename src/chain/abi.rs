//! 池子、Manager、Quoter 与 ERC20 的 ABI 绑定。

use alloy_primitives::aliases::I24;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue, sol};

use crate::provider::ProviderError;

sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface IManager {
        function mint(
            address poolAddress,
            int24 lowerTick,
            int24 upperTick,
            uint128 liquidity,
            bytes calldata data
        ) external returns (uint256, uint256);

        function swap(
            address poolAddress,
            bool zeroForOne,
            uint256 amountSpecified,
            bytes calldata data
        ) external returns (int256, int256);
    }

    interface IQuoter {
        struct QuoteParams {
            address pool;
            uint256 amountIn;
            bool zeroForOne;
        }

        function quote(QuoteParams memory params)
            external
            returns (uint256 amountOut, uint160 sqrtPriceX96After, int24 tickAfter);
    }

    interface IPool {
        event Mint(
            address sender,
            address indexed owner,
            int24 indexed tickLower,
            int24 indexed tickUpper,
            uint128 amount,
            uint256 amount0,
            uint256 amount1
        );

        event Swap(
            address indexed sender,
            address indexed recipient,
            int256 amount0,
            int256 amount1,
            uint160 sqrtPriceX96,
            uint128 liquidity,
            int24 tick
        );
    }
}

pub fn balance_of_calldata(owner: Address) -> Vec<u8> {
    IERC20::balanceOfCall { account: owner }.abi_encode()
}

pub fn allowance_calldata(owner: Address, spender: Address) -> Vec<u8> {
    IERC20::allowanceCall { owner, spender }.abi_encode()
}

pub fn approve_calldata(spender: Address, amount: U256) -> Vec<u8> {
    IERC20::approveCall { spender, amount }.abi_encode()
}

/// Manager 回调所需的附加数据：`abi.encode(token0, token1, payer)`。
pub fn callback_data(token0: Address, token1: Address, payer: Address) -> Bytes {
    Bytes::from((token0, token1, payer).abi_encode_params())
}

pub fn mint_calldata(
    pool: Address,
    lower_tick: i32,
    upper_tick: i32,
    liquidity: u128,
    data: Bytes,
) -> Result<Vec<u8>, ProviderError> {
    Ok(IManager::mintCall {
        poolAddress: pool,
        lowerTick: to_tick(lower_tick)?,
        upperTick: to_tick(upper_tick)?,
        liquidity,
        data,
    }
    .abi_encode())
}

pub fn swap_calldata(pool: Address, zero_for_one: bool, amount_in: U256, data: Bytes) -> Vec<u8> {
    IManager::swapCall {
        poolAddress: pool,
        zeroForOne: zero_for_one,
        amountSpecified: amount_in,
        data,
    }
    .abi_encode()
}

pub fn quote_calldata(pool: Address, amount_in: U256, zero_for_one: bool) -> Vec<u8> {
    IQuoter::quoteCall {
        params: IQuoter::QuoteParams {
            pool,
            amountIn: amount_in,
            zeroForOne: zero_for_one,
        },
    }
    .abi_encode()
}

pub fn decode_quote_output(data: &[u8]) -> Result<U256, ProviderError> {
    let decoded = IQuoter::quoteCall::abi_decode_returns(data)
        .map_err(|err| ProviderError::Decode(format!("quote 返回值解析失败: {err}")))?;
    Ok(decoded.amountOut)
}

/// 解析单个 `uint256` 返回值。
pub fn decode_word(data: &[u8]) -> Result<U256, ProviderError> {
    if data.len() < 32 {
        return Err(ProviderError::Decode(format!(
            "返回值长度 {} 不足 32 字节",
            data.len()
        )));
    }
    Ok(U256::from_be_slice(&data[..32]))
}

fn to_tick(value: i32) -> Result<I24, ProviderError> {
    I24::try_from(value).map_err(|_| ProviderError::Decode(format!("tick 超出 int24 范围: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_data_is_three_words() {
        let data = callback_data(Address::repeat_byte(1), Address::repeat_byte(2), Address::ZERO);
        assert_eq!(data.len(), 96);
        assert_eq!(&data[12..32], Address::repeat_byte(1).as_slice());
    }

    #[test]
    fn decode_word_rejects_short_payloads() {
        assert!(decode_word(&[0u8; 31]).is_err());
        let mut word = [0u8; 32];
        word[31] = 150;
        assert_eq!(decode_word(&word).unwrap(), U256::from(150u64));
    }

    #[test]
    fn mint_rejects_out_of_range_ticks() {
        let result = mint_calldata(Address::ZERO, 84222, 1 << 24, 1, Bytes::new());
        assert!(result.is_err());
        assert!(mint_calldata(Address::ZERO, 84222, 86129, 1, Bytes::new()).is_ok());
    }
}
