//! 钱包会话状态与连接管理。

pub mod manager;


use alloy_primitives::Address;
use tokio::sync::watch;

use crate::error::{ClientError, ClientResult};

pub use manager::{ConnectOutcome, ConnectionManager, NetworkOffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    NotInstalled,
    NotConnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::NotInstalled => "not_installed",
            ConnectionState::NotConnected => "not_connected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub state: ConnectionState,
    pub last_error: Option<ClientError>,
    /// 每次断开或切链自增，依赖链状态的缓存据此失效。
    pub epoch: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            account: None,
            chain_id: None,
            state: ConnectionState::Uninitialized,
            last_error: None,
            epoch: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_correct_network(&self, target_chain: u64) -> bool {
        self.chain_id == Some(target_chain)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// 已通过连接与网络校验的会话快照。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadySession {
    pub account: Address,
    pub chain_id: u64,
    pub epoch: u64,
}

/// 会话的只读视图，由 [`ConnectionManager`] 分发给其它组件。
#[derive(Debug, Clone)]
pub struct SessionView {
    receiver: watch::Receiver<Session>,
    target_chain: u64,
}

impl SessionView {
    pub(crate) fn new(receiver: watch::Receiver<Session>, target_chain: u64) -> Self {
        Self {
            receiver,
            target_chain,
        }
    }

    pub fn snapshot(&self) -> Session {
        self.receiver.borrow().clone()
    }

    pub fn target_chain(&self) -> u64 {
        self.target_chain
    }

    pub fn is_connected(&self) -> bool {
        self.receiver.borrow().is_connected()
    }

    pub fn is_correct_network(&self) -> bool {
        self.receiver.borrow().is_correct_network(self.target_chain)
    }

    /// 每个操作开始前调用：未连接或网络不对时拒绝执行。
    pub fn require_ready(&self) -> ClientResult<ReadySession> {
        let session = self.receiver.borrow();
        let account = match (session.is_connected(), session.account) {
            (true, Some(account)) => account,
            _ => return Err(ClientError::NotConnected),
        };
        match session.chain_id {
            Some(chain_id) if chain_id == self.target_chain => Ok(ReadySession {
                account,
                chain_id,
                epoch: session.epoch,
            }),
            actual => Err(ClientError::NetworkMismatch {
                expected: self.target_chain,
                actual,
            }),
        }
    }

    /// 等待下一次会话变更；管理器被销毁时返回 `false`。
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}
