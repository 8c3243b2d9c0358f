use alloy_primitives::Address;
use rust_decimal::Decimal;

use super::{ActionKind, TokenSpend, TransactionRequest};
use crate::chain::units::to_base_units;
use crate::chain::{ContractCall, abi};
use crate::config::{ContractsConfig, LiquidityConfig, TokenConfig};
use crate::error::{ClientError, ClientResult};
use crate::quote::QuoteDirection;

fn spend(token: &TokenConfig, amount: Decimal) -> ClientResult<TokenSpend> {
    Ok(TokenSpend {
        token: token.address,
        symbol: token.symbol.clone(),
        decimals: token.decimals,
        amount: to_base_units(amount, token.decimals)?,
    })
}

impl TransactionRequest {
    /// 按预设区间添加流动性：两种代币都需要授权给 manager。
    pub fn provide_liquidity(
        contracts: &ContractsConfig,
        params: &LiquidityConfig,
        payer: Address,
    ) -> ClientResult<Self> {
        let liquidity = params
            .liquidity_value()
            .map_err(|err| ClientError::InvalidAmount(err.to_string()))?;
        let spends = vec![
            spend(&contracts.token0, params.amount0)?,
            spend(&contracts.token1, params.amount1)?,
        ];
        let data = abi::callback_data(
            contracts.token0.address,
            contracts.token1.address,
            payer,
        );
        let calldata = abi::mint_calldata(
            contracts.pool,
            params.lower_tick,
            params.upper_tick,
            liquidity,
            data,
        )
        .map_err(|err| ClientError::InvalidAmount(err.to_string()))?;

        Ok(Self::new(
            ActionKind::ProvideLiquidity,
            spends,
            ContractCall::new(contracts.manager, calldata),
        ))
    }

    /// 兑换只花费输入侧代币。
    pub fn swap(
        contracts: &ContractsConfig,
        direction: QuoteDirection,
        amount_in: Decimal,
        payer: Address,
    ) -> ClientResult<Self> {
        if amount_in <= Decimal::ZERO {
            return Err(ClientError::InvalidAmount(format!(
                "兑换数量必须大于 0: {amount_in}"
            )));
        }
        let input = match direction {
            QuoteDirection::Forward => &contracts.token0,
            QuoteDirection::Reverse => &contracts.token1,
        };
        let input_spend = spend(input, amount_in)?;
        let data = abi::callback_data(
            contracts.token0.address,
            contracts.token1.address,
            payer,
        );
        let calldata = abi::swap_calldata(
            contracts.pool,
            direction.zero_for_one(),
            input_spend.amount,
            data,
        );

        Ok(Self::new(
            ActionKind::Swap,
            vec![input_spend],
            ContractCall::new(contracts.manager, calldata),
        ))
    }
}
