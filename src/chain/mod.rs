//! 节点 / 合约调用层：读状态、发交易、模拟调用、日志查询与订阅。

pub mod abi;
pub mod rpc;
pub mod units;

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::provider::ProviderError;

pub use rpc::{RpcGateway, RpcGatewaySettings};

/// 结构化的合约调用（目标合约 + calldata），对上层不透明。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
}

impl ContractCall {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    pub success: bool,
    pub logs: Vec<RawLog>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    /// topic0 的候选集合，任意一个匹配即可。
    pub event_signatures: Vec<B256>,
    pub from_block: u64,
    /// `None` 表示 `latest`。
    pub to_block: Option<u64>,
}

pub type LogItem = Result<RawLog, ProviderError>;

/// 实时日志订阅句柄。
///
/// 持有后台轮询任务，drop 时任务随之终止，不会遗留监听器。
pub struct LogSubscription {
    receiver: mpsc::Receiver<LogItem>,
    task: Option<JoinHandle<()>>,
}

impl LogSubscription {
    pub fn new(receiver: mpsc::Receiver<LogItem>, task: JoinHandle<()>) -> Self {
        Self {
            receiver,
            task: Some(task),
        }
    }

    /// 无后台任务的订阅，推送端由调用方持有。
    #[cfg(test)]
    pub fn from_channel(receiver: mpsc::Receiver<LogItem>) -> Self {
        Self {
            receiver,
            task: None,
        }
    }

    /// 下一条日志；`None` 表示推送端已关闭。
    pub async fn next(&mut self) -> Option<LogItem> {
        self.receiver.recv().await
    }

    pub fn cancel(&mut self) {
        self.receiver.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[async_trait]
pub trait ChainGateway: Send + Sync + 'static {
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ProviderError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ProviderError>;

    /// 由钱包签名并广播，返回交易哈希。
    async fn send_transaction(
        &self,
        from: Address,
        call: &ContractCall,
    ) -> Result<B256, ProviderError>;

    /// 等待交易上链并返回回执（包含失败回执）。
    async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceipt, ProviderError>;

    async fn simulate(&self, call: &ContractCall) -> Result<Bytes, ProviderError>;

    async fn block_number(&self) -> Result<u64, ProviderError>;

    async fn query_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, ProviderError>;

    /// 从 `filter.from_block` 起持续推送新日志。
    async fn subscribe_logs(&self, filter: LogFilter) -> Result<LogSubscription, ProviderError>;
}
