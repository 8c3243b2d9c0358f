use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, U64, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use super::abi;
use super::{ChainGateway, ContractCall, LogFilter, LogSubscription, RawLog, TxReceipt};
use crate::provider::{Eip1193, ProviderError, format_quantity, request_as};

const LOG_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct RpcGatewaySettings {
    pub receipt_poll: Duration,
    pub receipt_timeout: Duration,
    pub log_poll: Duration,
}

impl Default for RpcGatewaySettings {
    fn default() -> Self {
        Self {
            receipt_poll: Duration::from_millis(500),
            receipt_timeout: Duration::from_secs(120),
            log_poll: Duration::from_millis(1_000),
        }
    }
}

/// 所有节点访问都经由钱包 provider 完成：读状态用 `eth_call`，交易由钱包签名。
#[derive(Clone)]
pub struct RpcGateway {
    provider: Arc<dyn Eip1193>,
    settings: RpcGatewaySettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
    block_number: Option<U64>,
    log_index: Option<U64>,
    transaction_hash: Option<B256>,
    #[serde(default)]
    removed: bool,
}

impl RpcLog {
    fn into_raw(self) -> Option<RawLog> {
        if self.removed {
            return None;
        }
        Some(RawLog {
            address: self.address,
            topics: self.topics,
            data: self.data,
            block_number: self.block_number?.to::<u64>(),
            log_index: self.log_index?.to::<u64>(),
            transaction_hash: self.transaction_hash?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: U64,
    gas_used: U64,
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

impl RpcGateway {
    pub fn new(provider: Arc<dyn Eip1193>, settings: RpcGatewaySettings) -> Self {
        Self { provider, settings }
    }

    async fn eth_call(&self, call: &ContractCall) -> Result<Bytes, ProviderError> {
        let params = json!([{ "to": call.to, "data": call.data }, "latest"]);
        request_as::<Bytes>(self.provider.as_ref(), "eth_call", params).await
    }

    async fn fetch_receipt(&self, hash: B256) -> Result<Option<TxReceipt>, ProviderError> {
        let value = self
            .provider
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        let receipt: RpcReceipt = serde_json::from_value(value)?;
        Ok(Some(TxReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.to::<u64>(),
            gas_used: receipt.gas_used.to::<u64>(),
            success: receipt.status.map(|status| !status.is_zero()).unwrap_or(true),
            logs: receipt
                .logs
                .into_iter()
                .filter_map(RpcLog::into_raw)
                .collect(),
        }))
    }
}

fn filter_params(filter: &LogFilter) -> Value {
    let to_block = filter
        .to_block
        .map(format_quantity)
        .unwrap_or_else(|| "latest".to_string());
    json!([{
        "address": filter.address,
        "topics": [filter.event_signatures],
        "fromBlock": format_quantity(filter.from_block),
        "toBlock": to_block,
    }])
}

#[async_trait]
impl ChainGateway for RpcGateway {
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ProviderError> {
        let call = ContractCall::new(token, abi::balance_of_calldata(owner));
        let data = self.eth_call(&call).await?;
        abi::decode_word(&data)
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ProviderError> {
        let call = ContractCall::new(token, abi::allowance_calldata(owner, spender));
        let data = self.eth_call(&call).await?;
        abi::decode_word(&data)
    }

    async fn send_transaction(
        &self,
        from: Address,
        call: &ContractCall,
    ) -> Result<B256, ProviderError> {
        let params = json!([{ "from": from, "to": call.to, "data": call.data }]);
        request_as::<B256>(self.provider.as_ref(), "eth_sendTransaction", params).await
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceipt, ProviderError> {
        let deadline = Instant::now() + self.settings.receipt_timeout;
        loop {
            if let Some(receipt) = self.fetch_receipt(hash).await? {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(ProviderError::Transport(format!(
                    "等待交易 {hash} 回执超时（{}s）",
                    self.settings.receipt_timeout.as_secs()
                )));
            }
            trace!(target: "chain::rpc", tx = %hash, "receipt not yet available");
            tokio::time::sleep(self.settings.receipt_poll).await;
        }
    }

    async fn simulate(&self, call: &ContractCall) -> Result<Bytes, ProviderError> {
        self.eth_call(call).await
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        let head = request_as::<U64>(self.provider.as_ref(), "eth_blockNumber", json!([])).await?;
        Ok(head.to::<u64>())
    }

    async fn query_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, ProviderError> {
        let logs: Vec<RpcLog> =
            request_as(self.provider.as_ref(), "eth_getLogs", filter_params(filter)).await?;
        Ok(logs.into_iter().filter_map(RpcLog::into_raw).collect())
    }

    async fn subscribe_logs(&self, filter: LogFilter) -> Result<LogSubscription, ProviderError> {
        let (sender, receiver) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        let gateway = self.clone();
        let period = self.settings.log_poll;
        let task = tokio::spawn(async move {
            let mut next_block = filter.from_block;
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let head = match gateway.block_number().await {
                    Ok(head) => head,
                    Err(err) => {
                        warn!(target: "chain::rpc", error = %err, "日志轮询获取区块高度失败");
                        let _ = sender.send(Err(err)).await;
                        return;
                    }
                };
                if head < next_block {
                    continue;
                }
                let window = LogFilter {
                    from_block: next_block,
                    to_block: Some(head),
                    ..filter.clone()
                };
                match gateway.query_logs(&window).await {
                    Ok(logs) => {
                        debug!(
                            target: "chain::rpc",
                            from = next_block,
                            to = head,
                            count = logs.len(),
                            "polled logs"
                        );
                        for log in logs {
                            if sender.send(Ok(log)).await.is_err() {
                                return;
                            }
                        }
                        next_block = head + 1;
                    }
                    Err(err) => {
                        warn!(target: "chain::rpc", error = %err, "日志轮询失败");
                        let _ = sender.send(Err(err)).await;
                        return;
                    }
                }
            }
        });
        Ok(LogSubscription::new(receiver, task))
    }
}
