use alloy_primitives::Address;
use thiserror::Error;

use crate::provider::ProviderError;

/// 钱包拒绝请求（EIP-1193 userRejectedRequest）。
pub const CODE_USER_REJECTED: i64 = 4001;
/// 钱包不认识目标链（wallet_switchEthereumChain 专用）。
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;

const INSUFFICIENT_FUNDS_MARKERS: &[&str] = &["insufficient funds", "INSUFFICIENT_FUNDS"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("未检测到钱包扩展")]
    WalletUnavailable,
    #[error("用户拒绝了请求")]
    UserRejected,
    #[error("尚未连接钱包")]
    NotConnected,
    #[error("网络不匹配: 期望 Chain ID {expected}, 当前 {actual:?}")]
    NetworkMismatch { expected: u64, actual: Option<u64> },
    #[error("余额不足: {0}")]
    InsufficientFunds(String),
    #[error("授权额度不足: token {token}")]
    InsufficientAllowance { token: Address },
    #[error("节点视图与链头不同步: {0}")]
    ViewDesynchronization(String),
    #[error("操作失败: {0}")]
    ActionFailed(String),
    #[error("事件订阅中断: {0}")]
    SubscriptionLost(String),
    #[error("金额非法: {0}")]
    InvalidAmount(String),
    #[error("未配置 Quoter 合约")]
    QuoterUnavailable,
}

impl ClientError {
    /// 将钱包 / 节点返回的错误归入统一分类。
    pub fn classify(err: &ProviderError, desync_marker: Option<&str>) -> Self {
        if err.code() == Some(CODE_USER_REJECTED) {
            return ClientError::UserRejected;
        }
        let message = err.to_string();
        if let Some(marker) = desync_marker {
            if !marker.is_empty() && message.contains(marker) {
                return ClientError::ViewDesynchronization(message);
            }
        }
        if INSUFFICIENT_FUNDS_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
        {
            return ClientError::InsufficientFunds(message);
        }
        ClientError::ActionFailed(message)
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::ViewDesynchronization(_) | ClientError::InsufficientAllowance { .. }
        )
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        ClientError::classify(&err, None)
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
