use alloy_primitives::{Address, address};
use rust_decimal::Decimal;

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use self::types as cfg;

/// `poolside init` 写出的模版。
pub const CONFIG_TEMPLATE: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/poolside.toml"));

pub(crate) fn default_chain_id() -> u64 {
    31_337
}

pub(crate) fn default_chain_name() -> String {
    "Anvil Local".to_string()
}

pub(crate) fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

pub(crate) fn default_request_timeout_ms() -> u64 {
    10_000
}

pub(crate) fn default_currency_name() -> String {
    "Ether".to_string()
}

pub(crate) fn default_currency_symbol() -> String {
    "ETH".to_string()
}

pub(crate) fn default_decimals() -> u8 {
    18
}

pub(crate) fn default_token0() -> cfg::TokenConfig {
    cfg::TokenConfig {
        symbol: "WETH".to_string(),
        address: address!("c3e53F4d16Ae77Db1c982e75a937B9f60FE63690"),
        decimals: 18,
    }
}

pub(crate) fn default_token1() -> cfg::TokenConfig {
    cfg::TokenConfig {
        symbol: "USDC".to_string(),
        address: address!("84eA74d481Ee0A5332c457a4d796187F6Ba67fEB"),
        decimals: 18,
    }
}

pub(crate) fn default_pool() -> Address {
    address!("9E545E3C0baAB3E08CdfD552C960A1050f373042")
}

pub(crate) fn default_manager() -> Address {
    address!("a82fF9aFd8f496c3d6ac40E2a0F282E47488CFc9")
}

pub(crate) fn default_liquidity_amount0() -> Decimal {
    Decimal::from_i128_with_scale(998_976_618_347_425_280, 18)
}

pub(crate) fn default_liquidity_amount1() -> Decimal {
    Decimal::from(5_000u32)
}

pub(crate) fn default_lower_tick() -> i32 {
    84_222
}

pub(crate) fn default_upper_tick() -> i32 {
    86_129
}

pub(crate) fn default_liquidity() -> String {
    "1517882343751509868544".to_string()
}

pub(crate) fn default_debounce_ms() -> u64 {
    300
}

pub(crate) fn default_retry_base_ms() -> u64 {
    1_000
}

pub(crate) fn default_max_retries() -> u32 {
    3
}

pub(crate) fn default_desync_marker() -> String {
    "BlockOutOfRange".to_string()
}

pub(crate) fn default_lookback_blocks() -> u64 {
    1_000
}

pub(crate) fn default_max_entries() -> usize {
    50
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    1_000
}

pub(crate) fn default_receipt_poll_ms() -> u64 {
    500
}

pub(crate) fn default_receipt_timeout_secs() -> u64 {
    120
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for cfg::NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            chain_name: default_chain_name(),
            rpc_url: default_rpc_url(),
            request_timeout_ms: default_request_timeout_ms(),
            native_currency: cfg::NativeCurrencyConfig::default(),
        }
    }
}

impl Default for cfg::NativeCurrencyConfig {
    fn default() -> Self {
        Self {
            name: default_currency_name(),
            symbol: default_currency_symbol(),
            decimals: default_decimals(),
        }
    }
}

impl Default for cfg::ContractsConfig {
    fn default() -> Self {
        Self {
            token0: default_token0(),
            token1: default_token1(),
            pool: default_pool(),
            manager: default_manager(),
            quoter: None,
        }
    }
}

impl Default for cfg::LiquidityConfig {
    fn default() -> Self {
        Self {
            amount0: default_liquidity_amount0(),
            amount1: default_liquidity_amount1(),
            lower_tick: default_lower_tick(),
            upper_tick: default_upper_tick(),
            liquidity: default_liquidity(),
        }
    }
}

impl Default for cfg::QuoteSettingsConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            retry_base_ms: default_retry_base_ms(),
            max_retries: default_max_retries(),
            desync_marker: default_desync_marker(),
        }
    }
}

impl Default for cfg::FeedConfig {
    fn default() -> Self {
        Self {
            lookback_blocks: default_lookback_blocks(),
            max_entries: default_max_entries(),
            poll_interval_ms: default_poll_interval_ms(),
            live_ordering: cfg::LiveOrdering::default(),
        }
    }
}

impl Default for cfg::PipelineConfig {
    fn default() -> Self {
        Self {
            receipt_poll_ms: default_receipt_poll_ms(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
        }
    }
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
        }
    }
}

impl cfg::LiquidityConfig {
    pub fn liquidity_value(&self) -> Result<u128, ConfigError> {
        self.liquidity.trim().parse::<u128>().map_err(|err| {
            ConfigError::Invalid(format!("liquidity `{}` 不是合法整数: {err}", self.liquidity))
        })
    }
}

impl cfg::AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.network.rpc_url).map_err(|err| {
            ConfigError::Invalid(format!("rpc_url `{}` 无效: {err}", self.network.rpc_url))
        })?;
        if self.liquidity.lower_tick >= self.liquidity.upper_tick {
            return Err(ConfigError::Invalid(format!(
                "tick 区间非法: lower {} >= upper {}",
                self.liquidity.lower_tick, self.liquidity.upper_tick
            )));
        }
        self.liquidity.liquidity_value()?;
        if self.feed.max_entries == 0 {
            return Err(ConfigError::Invalid("feed.max_entries 必须大于 0".to_string()));
        }
        if self.contracts.token0.address == self.contracts.token1.address {
            return Err(ConfigError::Invalid(
                "token0 与 token1 不能是同一个地址".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_local_deployment() {
        let config = AppConfig::default();
        assert_eq!(config.network.chain_id, 31_337);
        assert_eq!(config.feed.max_entries, 50);
        assert_eq!(config.quote.debounce_ms, 300);
        assert_eq!(config.liquidity.liquidity_value().unwrap(), 1_517_882_343_751_509_868_544);
        assert!(config.contracts.quoter().is_none());
        config.validate().expect("defaults validate");
    }

    #[test]
    fn template_parses_and_validates() {
        let config: AppConfig = toml::from_str(CONFIG_TEMPLATE).expect("parse template");
        config.validate().expect("template validates");
        assert_eq!(config.contracts.token0.symbol, "WETH");
    }

    #[test]
    fn zero_quoter_is_treated_as_missing() {
        let toml = r#"
            [contracts]
            quoter = "0x0000000000000000000000000000000000000000"
        "#;
        let config: AppConfig = toml::from_str(toml).expect("parse");
        assert!(config.contracts.quoter().is_none());
    }

    #[test]
    fn inverted_ticks_are_rejected() {
        let toml = r#"
            [liquidity]
            lower_tick = 90000
            upper_tick = 80000
        "#;
        let config: AppConfig = toml::from_str(toml).expect("parse");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn live_ordering_parses_snake_case() {
        let config: AppConfig = toml::from_str("[feed]\nlive_ordering = \"prepend\"\n").unwrap();
        assert_eq!(config.feed.live_ordering, LiveOrdering::Prepend);
    }
}
