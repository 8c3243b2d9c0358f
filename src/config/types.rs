use alloy_primitives::Address;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub liquidity: LiquidityConfig,
    #[serde(default)]
    pub quote: QuoteSettingsConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "super::default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "super::default_chain_name")]
    pub chain_name: String,
    #[serde(default = "super::default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "super::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub native_currency: NativeCurrencyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NativeCurrencyConfig {
    #[serde(default = "super::default_currency_name")]
    pub name: String,
    #[serde(default = "super::default_currency_symbol")]
    pub symbol: String,
    #[serde(default = "super::default_decimals")]
    pub decimals: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: Address,
    #[serde(default = "super::default_decimals")]
    pub decimals: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    #[serde(default = "super::default_token0")]
    pub token0: TokenConfig,
    #[serde(default = "super::default_token1")]
    pub token1: TokenConfig,
    #[serde(default = "super::default_pool")]
    pub pool: Address,
    /// 代币授权的 spender，同时也是 mint / swap 的入口合约。
    #[serde(default = "super::default_manager")]
    pub manager: Address,
    #[serde(default)]
    pub quoter: Option<Address>,
}

impl ContractsConfig {
    /// 未配置或为零地址时视为报价不可用。
    pub fn quoter(&self) -> Option<Address> {
        self.quoter.filter(|address| !address.is_zero())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiquidityConfig {
    #[serde(default = "super::default_liquidity_amount0")]
    pub amount0: Decimal,
    #[serde(default = "super::default_liquidity_amount1")]
    pub amount1: Decimal,
    #[serde(default = "super::default_lower_tick")]
    pub lower_tick: i32,
    #[serde(default = "super::default_upper_tick")]
    pub upper_tick: i32,
    /// 十进制整数字符串，超出 TOML 整数范围所以不用数字类型。
    #[serde(default = "super::default_liquidity")]
    pub liquidity: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteSettingsConfig {
    #[serde(default = "super::default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "super::default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "super::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "super::default_desync_marker")]
    pub desync_marker: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LiveOrdering {
    /// 按 (区块, 日志序号) 插入到正确位置并丢弃重复键。
    #[default]
    Sorted,
    /// 直接插到队首，不与历史重新排序。
    Prepend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "super::default_lookback_blocks")]
    pub lookback_blocks: u64,
    #[serde(default = "super::default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "super::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub live_ordering: LiveOrdering,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "super::default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "super::default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus_listen: Option<String>,
}
