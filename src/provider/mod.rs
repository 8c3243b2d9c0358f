//! 钱包扩展 API（EIP-1193 风格）抽象。

pub mod http;

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

pub use http::HttpProvider;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("RPC 错误 {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("请求发送失败: {0}")]
    Transport(String),
    #[error("响应解析失败: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        ProviderError::Rpc {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            ProviderError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Decode(err.to_string())
    }
}

/// 钱包主动推送的通知。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

#[async_trait]
pub trait Eip1193: Send + Sync + 'static {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    fn events(&self) -> broadcast::Receiver<ProviderEvent>;
}

pub async fn request_as<T: DeserializeOwned>(
    provider: &dyn Eip1193,
    method: &str,
    params: Value,
) -> Result<T, ProviderError> {
    let value = provider.request(method, params).await?;
    serde_json::from_value(value).map_err(ProviderError::from)
}

/// 解析 `0x` 前缀的十六进制数量（如 `eth_chainId` 返回的 `0x7a69`）。
pub fn parse_quantity(raw: &str) -> Result<u64, ProviderError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| ProviderError::Decode(format!("数量缺少 0x 前缀: {raw}")))?;
    if digits.is_empty() {
        return Err(ProviderError::Decode(format!("数量为空: {raw}")));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|err| ProviderError::Decode(format!("数量解析失败 {raw}: {err}")))
}

pub fn format_quantity(value: u64) -> String {
    format!("{value:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_chain_ids() {
        assert_eq!(parse_quantity("0x7a69").unwrap(), 31337);
        assert_eq!(parse_quantity("0x1").unwrap(), 1);
        assert!(parse_quantity("31337").is_err());
        assert!(parse_quantity("0x").is_err());
    }

    #[test]
    fn formats_chain_id_as_wallet_expects() {
        assert_eq!(format_quantity(31337), "0x7a69");
    }
}
