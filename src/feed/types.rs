use std::fmt;

use alloy_primitives::aliases::I24;
use alloy_primitives::{Address, B256, I256, U256};
use alloy_sol_types::SolEvent;

use crate::chain::RawLog;
use crate::chain::abi::IPool;
use crate::chain::units::{format_base_units, format_signed_units};
use crate::provider::ProviderError;

/// 池子事件金额统一按 18 位小数展示。
const DISPLAY_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Mint,
    Swap,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Mint => "mint",
            EventKind::Swap => "swap",
        }
    }

    pub fn signature_hash(&self) -> B256 {
        match self {
            EventKind::Mint => IPool::Mint::SIGNATURE_HASH,
            EventKind::Swap => IPool::Swap::SIGNATURE_HASH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintFields {
    pub sender: Address,
    pub owner: Address,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub amount0: U256,
    pub amount1: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapFields {
    pub sender: Address,
    pub recipient: Address,
    pub amount0: I256,
    pub amount1: I256,
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub tick: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Mint(MintFields),
    Swap(SwapFields),
}

/// 一条已解码的池子事件，按 (区块号, 日志序号) 定位。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvent {
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: B256,
    pub payload: EventPayload,
}

impl ChainEvent {
    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Mint(_) => EventKind::Mint,
            EventPayload::Swap(_) => EventKind::Swap,
        }
    }

    /// 去重键。
    pub fn key(&self) -> (B256, u64) {
        (self.transaction_hash, self.log_index)
    }

    /// 排序键，越大越新。
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }

    pub fn decode(log: &RawLog) -> Result<Self, ProviderError> {
        let topic0 = log
            .topics
            .first()
            .copied()
            .ok_or_else(|| ProviderError::Decode("日志缺少 topic0".to_string()))?;

        let payload = if topic0 == IPool::Mint::SIGNATURE_HASH {
            let event = IPool::Mint::decode_raw_log(log.topics.iter().copied(), &log.data)
                .map_err(|err| ProviderError::Decode(format!("Mint 事件解析失败: {err}")))?;
            EventPayload::Mint(MintFields {
                sender: event.sender,
                owner: event.owner,
                tick_lower: tick(event.tickLower)?,
                tick_upper: tick(event.tickUpper)?,
                liquidity: event.amount,
                amount0: event.amount0,
                amount1: event.amount1,
            })
        } else if topic0 == IPool::Swap::SIGNATURE_HASH {
            let event = IPool::Swap::decode_raw_log(log.topics.iter().copied(), &log.data)
                .map_err(|err| ProviderError::Decode(format!("Swap 事件解析失败: {err}")))?;
            EventPayload::Swap(SwapFields {
                sender: event.sender,
                recipient: event.recipient,
                amount0: event.amount0,
                amount1: event.amount1,
                sqrt_price_x96: U256::from_be_slice(&event.sqrtPriceX96.to_be_bytes_vec()),
                liquidity: event.liquidity,
                tick: tick(event.tick)?,
            })
        } else {
            return Err(ProviderError::Decode(format!("未知事件签名 {topic0}")));
        };

        Ok(Self {
            block_number: log.block_number,
            log_index: log.log_index,
            transaction_hash: log.transaction_hash,
            payload,
        })
    }
}

fn tick(value: I24) -> Result<i32, ProviderError> {
    i32::try_from(value).map_err(|err| ProviderError::Decode(format!("tick 超出范围: {err}")))
}

/// `0x1234...abcd`
pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

pub fn short_hash(hash: &B256) -> String {
    let full = hash.to_string();
    format!("{}...{}", &full[..10], &full[full.len() - 8..])
}

impl fmt::Display for ChainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:<8} {:<4} ",
            self.block_number,
            self.kind().as_str()
        )?;
        match &self.payload {
            EventPayload::Mint(mint) => write!(
                f,
                "owner {} range [{}, {}] amount0 {} amount1 {}",
                short_address(&mint.owner),
                mint.tick_lower,
                mint.tick_upper,
                format_base_units(mint.amount0, DISPLAY_DECIMALS),
                format_base_units(mint.amount1, DISPLAY_DECIMALS),
            )?,
            EventPayload::Swap(swap) => write!(
                f,
                "sender {} amount0 {} amount1 {} tick {}",
                short_address(&swap.sender),
                format_signed_units(swap.amount0, DISPLAY_DECIMALS),
                format_signed_units(swap.amount1, DISPLAY_DECIMALS),
                swap.tick,
            )?,
        }
        write!(f, " tx {}", short_hash(&self.transaction_hash))
    }
}
