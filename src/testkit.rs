//! 测试用的脚本化钱包与节点。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};

use crate::chain::abi::IERC20;
use crate::chain::{
    ChainGateway, ContractCall, LogFilter, LogItem, LogSubscription, RawLog, TxReceipt,
};
use crate::config::NetworkConfig;
use crate::provider::{Eip1193, ProviderError, ProviderEvent};
use crate::session::{ConnectionManager, SessionView};

pub fn account() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn spender() -> Address {
    Address::repeat_byte(0x5e)
}

pub fn token(tag: u8) -> Address {
    Address::repeat_byte(tag)
}

#[derive(Default)]
struct WalletScript {
    queued: HashMap<String, VecDeque<Result<Value, ProviderError>>>,
    fallback: HashMap<String, Result<Value, ProviderError>>,
    calls: Vec<(String, Value)>,
}

pub struct MockWallet {
    script: Mutex<WalletScript>,
    events: broadcast::Sender<ProviderEvent>,
}

impl MockWallet {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            script: Mutex::new(WalletScript::default()),
            events,
        })
    }

    /// 已授权账户、处于给定链的钱包。
    pub fn connected(chain_hex: &str) -> Arc<Self> {
        let wallet = Self::new();
        let accounts = json!([account()]);
        wallet.respond_always("eth_accounts", Ok(accounts.clone()));
        wallet.respond_always("eth_requestAccounts", Ok(accounts));
        wallet.respond_always("eth_chainId", Ok(json!(chain_hex)));
        wallet
    }

    pub fn respond(&self, method: &str, response: Result<Value, ProviderError>) {
        self.script
            .lock()
            .queued
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn respond_always(&self, method: &str, response: Result<Value, ProviderError>) {
        self.script
            .lock()
            .fallback
            .insert(method.to_string(), response);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.script.lock().calls.clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(method, _)| method).collect()
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Eip1193 for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let mut script = self.script.lock();
        script.calls.push((method.to_string(), params));
        if let Some(response) = script
            .queued
            .get_mut(method)
            .and_then(|queue| queue.pop_front())
        {
            return response;
        }
        script
            .fallback
            .get(method)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::rpc(-32601, format!("{method} not found"))))
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

/// 已连接到 31337 的会话管理器。
pub async fn ready_manager() -> (Arc<ConnectionManager>, SessionView) {
    let wallet = MockWallet::connected("0x7a69");
    let manager = Arc::new(ConnectionManager::new(
        Some(wallet as Arc<dyn Eip1193>),
        NetworkConfig::default(),
    ));
    manager.connect().await.expect("mock wallet connects");
    let view = manager.view();
    (manager, view)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOp {
    Balance(Address),
    Allowance(Address),
    Approve { token: Address, amount: U256 },
    Action(Address),
    Receipt(B256),
    Simulate,
}

#[derive(Default)]
struct GatewayState {
    balances: HashMap<Address, U256>,
    allowances: HashMap<Address, U256>,
    ops: Vec<GatewayOp>,
    send_errors: VecDeque<Option<ProviderError>>,
    simulate_results: VecDeque<Result<Bytes, ProviderError>>,
    simulated: Vec<ContractCall>,
    logs: Vec<RawLog>,
    log_error: Option<ProviderError>,
    log_queries: Vec<LogFilter>,
    live_sender: Option<mpsc::Sender<LogItem>>,
    live_filters: Vec<LogFilter>,
    reverted: bool,
}

pub struct MockGateway {
    state: Mutex<GatewayState>,
    head: AtomicU64,
    next_hash: AtomicU64,
    subscriptions: AtomicUsize,
    simulate_delay: Mutex<Option<Duration>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GatewayState::default()),
            head: AtomicU64::new(0),
            next_hash: AtomicU64::new(1),
            subscriptions: AtomicUsize::new(0),
            simulate_delay: Mutex::new(None),
        })
    }

    pub fn set_balance(&self, token: Address, amount: u64) {
        self.state.lock().balances.insert(token, U256::from(amount));
    }

    pub fn set_allowance(&self, token: Address, amount: u64) {
        self.state.lock().allowances.insert(token, U256::from(amount));
    }

    /// 下一次 `send_transaction` 的结果，`None` 表示成功。
    pub fn push_send_result(&self, error: Option<ProviderError>) {
        self.state.lock().send_errors.push_back(error);
    }

    pub fn revert_receipts(&self) {
        self.state.lock().reverted = true;
    }

    pub fn push_simulation(&self, result: Result<Bytes, ProviderError>) {
        self.state.lock().simulate_results.push_back(result);
    }

    pub fn set_simulate_delay(&self, delay: Duration) {
        *self.simulate_delay.lock() = Some(delay);
    }

    pub fn simulated(&self) -> Vec<ContractCall> {
        self.state.lock().simulated.clone()
    }

    pub fn ops(&self) -> Vec<GatewayOp> {
        self.state.lock().ops.clone()
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn add_logs(&self, logs: impl IntoIterator<Item = RawLog>) {
        self.state.lock().logs.extend(logs);
    }

    pub fn fail_log_queries(&self, error: Option<ProviderError>) {
        self.state.lock().log_error = error;
    }

    pub fn log_queries(&self) -> Vec<LogFilter> {
        self.state.lock().log_queries.clone()
    }

    pub fn live_filters(&self) -> Vec<LogFilter> {
        self.state.lock().live_filters.clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn live_sender(&self) -> Option<mpsc::Sender<LogItem>> {
        self.state.lock().live_sender.clone()
    }

    /// 最近一次订阅的接收端是否已被释放。
    pub fn live_closed(&self) -> bool {
        self.state
            .lock()
            .live_sender
            .as_ref()
            .map(|sender| sender.is_closed())
            .unwrap_or(true)
    }

    fn hash(&self) -> B256 {
        let n = self.next_hash.fetch_add(1, Ordering::SeqCst);
        B256::left_padding_from(&n.to_be_bytes())
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    async fn balance_of(&self, token: Address, _owner: Address) -> Result<U256, ProviderError> {
        let mut state = self.state.lock();
        state.ops.push(GatewayOp::Balance(token));
        Ok(state.balances.get(&token).copied().unwrap_or(U256::MAX))
    }

    async fn allowance(
        &self,
        token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256, ProviderError> {
        let mut state = self.state.lock();
        state.ops.push(GatewayOp::Allowance(token));
        Ok(state.allowances.get(&token).copied().unwrap_or(U256::ZERO))
    }

    async fn send_transaction(
        &self,
        _from: Address,
        call: &ContractCall,
    ) -> Result<B256, ProviderError> {
        let mut state = self.state.lock();
        if let Some(Some(err)) = state.send_errors.pop_front() {
            return Err(err);
        }
        match IERC20::approveCall::abi_decode(&call.data) {
            Ok(approve) => {
                state.ops.push(GatewayOp::Approve {
                    token: call.to,
                    amount: approve.amount,
                });
                state.allowances.insert(call.to, approve.amount);
            }
            Err(_) => state.ops.push(GatewayOp::Action(call.to)),
        }
        drop(state);
        Ok(self.hash())
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceipt, ProviderError> {
        let mut state = self.state.lock();
        state.ops.push(GatewayOp::Receipt(hash));
        Ok(TxReceipt {
            transaction_hash: hash,
            block_number: self.head.load(Ordering::SeqCst),
            gas_used: 21_000,
            success: !state.reverted,
            logs: Vec::new(),
        })
    }

    async fn simulate(&self, call: &ContractCall) -> Result<Bytes, ProviderError> {
        let delay = *self.simulate_delay.lock();
        let result = {
            let mut state = self.state.lock();
            state.ops.push(GatewayOp::Simulate);
            state.simulated.push(call.clone());
            state
                .simulate_results
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::rpc(-32000, "no scripted simulation")))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn query_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, ProviderError> {
        let mut state = self.state.lock();
        state.log_queries.push(filter.clone());
        if let Some(err) = state.log_error.clone() {
            return Err(err);
        }
        let to_block = filter.to_block.unwrap_or(u64::MAX);
        Ok(state
            .logs
            .iter()
            .filter(|log| {
                log.block_number >= filter.from_block
                    && log.block_number <= to_block
                    && log
                        .topics
                        .first()
                        .map(|topic| filter.event_signatures.contains(topic))
                        .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn subscribe_logs(&self, filter: LogFilter) -> Result<LogSubscription, ProviderError> {
        let (sender, receiver) = mpsc::channel(64);
        let mut state = self.state.lock();
        state.live_sender = Some(sender);
        state.live_filters.push(filter);
        drop(state);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(LogSubscription::from_channel(receiver))
    }
}
