use std::sync::Arc;

use alloy_primitives::Address;
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ConnectionState, Session, SessionView};
use crate::config::NetworkConfig;
use crate::error::{CODE_UNRECOGNIZED_CHAIN, ClientError, ClientResult};
use crate::monitoring::events;
use crate::provider::{Eip1193, ProviderEvent, format_quantity, parse_quantity, request_as};

/// 连接成功但处于错误网络时给出的切换建议，是否接受由调用方决定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkOffer {
    pub current_chain: u64,
    pub target_chain: u64,
    pub chain_name: String,
    pub rpc_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub account: Address,
    pub chain_id: u64,
    pub network_offer: Option<NetworkOffer>,
}

/// 会话唯一的写入方。
pub struct ConnectionManager {
    wallet: Option<Arc<dyn Eip1193>>,
    network: NetworkConfig,
    session: Arc<watch::Sender<Session>>,
}

impl ConnectionManager {
    pub fn new(wallet: Option<Arc<dyn Eip1193>>, network: NetworkConfig) -> Self {
        let (session, _) = watch::channel(Session::new());
        Self {
            wallet,
            network,
            session: Arc::new(session),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView::new(self.session.subscribe(), self.network.chain_id)
    }

    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.session.borrow().is_connected()
    }

    pub fn is_correct_network(&self) -> bool {
        self.session
            .borrow()
            .is_correct_network(self.network.chain_id)
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// 启动时探测：没有钱包则 `not_installed`，已授权过则自动连接。
    pub async fn initialize(&self) -> ClientResult<Option<ConnectOutcome>> {
        let Some(wallet) = self.wallet.clone() else {
            self.set_state(ConnectionState::NotInstalled);
            return Ok(None);
        };

        match request_as::<Vec<Address>>(wallet.as_ref(), "eth_accounts", json!([])).await {
            Ok(accounts) if !accounts.is_empty() => self.connect().await.map(Some),
            Ok(_) => {
                self.set_state(ConnectionState::NotConnected);
                Ok(None)
            }
            Err(err) => {
                warn!(target: "session", error = %err, "检查已授权账户失败");
                self.set_state(ConnectionState::NotConnected);
                Ok(None)
            }
        }
    }

    pub async fn connect(&self) -> ClientResult<ConnectOutcome> {
        let Some(wallet) = self.wallet.clone() else {
            self.set_state(ConnectionState::NotInstalled);
            return Err(ClientError::WalletUnavailable);
        };

        self.update(|session| {
            session.state = ConnectionState::Connecting;
            session.last_error = None;
        });

        let requested = tokio::try_join!(
            request_as::<Vec<Address>>(wallet.as_ref(), "eth_requestAccounts", json!([])),
            request_as::<String>(wallet.as_ref(), "eth_chainId", json!([])),
        );

        let outcome = requested
            .map_err(ClientError::from)
            .and_then(|(accounts, raw_chain)| {
                let account = accounts.first().copied().ok_or_else(|| {
                    ClientError::ActionFailed("钱包未返回任何账户".to_string())
                })?;
                let chain_id = parse_quantity(&raw_chain)?;
                Ok((account, chain_id))
            });

        let (account, chain_id) = match outcome {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "session", error = %err, "连接钱包失败");
                self.update(|session| {
                    session.state = ConnectionState::Error;
                    session.last_error = Some(err.clone());
                });
                return Err(err);
            }
        };

        self.update(|session| {
            session.account = Some(account);
            session.chain_id = Some(chain_id);
            session.state = ConnectionState::Connected;
        });

        let correct_network = chain_id == self.network.chain_id;
        events::session_connected(&account, chain_id, correct_network);

        let network_offer = (!correct_network).then(|| NetworkOffer {
            current_chain: chain_id,
            target_chain: self.network.chain_id,
            chain_name: self.network.chain_name.clone(),
            rpc_url: self.network.rpc_url.clone(),
        });

        Ok(ConnectOutcome {
            account,
            chain_id,
            network_offer,
        })
    }

    /// 请求钱包切到目标链；钱包不认识该链时先添加链定义。失败不重试。
    pub async fn switch_network(&self) -> ClientResult<()> {
        let Some(wallet) = self.wallet.clone() else {
            return Err(ClientError::WalletUnavailable);
        };
        let target_hex = format_quantity(self.network.chain_id);

        let switched = wallet
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": target_hex }]),
            )
            .await;

        match switched {
            Ok(_) => {
                let raw = request_as::<String>(wallet.as_ref(), "eth_chainId", json!([]))
                    .await
                    .map_err(ClientError::from)?;
                let chain_id = parse_quantity(&raw)?;
                self.update(|session| session.chain_id = Some(chain_id));
                events::network_switch(self.network.chain_id, "switched");
                Ok(())
            }
            Err(err) if err.code() == Some(CODE_UNRECOGNIZED_CHAIN) => {
                info!(
                    target: "session",
                    chain = %target_hex,
                    "钱包未知目标链，尝试添加链定义"
                );
                let currency = &self.network.native_currency;
                let added = wallet
                    .request(
                        "wallet_addEthereumChain",
                        json!([{
                            "chainId": target_hex,
                            "chainName": self.network.chain_name,
                            "rpcUrls": [self.network.rpc_url],
                            "nativeCurrency": {
                                "name": currency.name,
                                "symbol": currency.symbol,
                                "decimals": currency.decimals,
                            },
                        }]),
                    )
                    .await;
                match added {
                    Ok(_) => {
                        let target = self.network.chain_id;
                        self.update(|session| session.chain_id = Some(target));
                        events::network_switch(target, "added");
                        Ok(())
                    }
                    Err(err) => {
                        warn!(target: "session", error = %err, "添加网络失败");
                        events::network_switch(self.network.chain_id, "add_failed");
                        Err(ClientError::from(err))
                    }
                }
            }
            Err(err) => {
                warn!(target: "session", error = %err, "切换网络失败");
                events::network_switch(self.network.chain_id, "switch_failed");
                Err(ClientError::from(err))
            }
        }
    }

    pub fn disconnect(&self) {
        self.update(|session| {
            session.account = None;
            session.chain_id = None;
            session.state = ConnectionState::NotConnected;
            session.last_error = None;
            session.epoch += 1;
        });
    }

    /// 处理钱包推送的账户 / 网络变更。
    pub fn handle_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
                None => {
                    info!(target: "session", "钱包已无可用账户，断开会话");
                    self.disconnect();
                }
                Some(account) => {
                    let account = *account;
                    info!(target: "session", account = %account, "钱包账户已切换");
                    self.update(|session| session.account = Some(account));
                }
            },
            ProviderEvent::ChainChanged(chain_id) => {
                info!(target: "session", chain_id, "钱包网络已变化，重新同步");
                self.update(|session| {
                    session.chain_id = Some(chain_id);
                    session.epoch += 1;
                });
            }
        }
    }

    /// 订阅钱包通知，返回的句柄 drop 时停止监听。
    pub fn listen(self: &Arc<Self>) -> Option<WalletListener> {
        let wallet = self.wallet.as_ref()?;
        let mut receiver = wallet.events();
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => manager.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "session", skipped, "钱包通知积压，部分通知被丢弃");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(target: "session", "钱包通知通道已关闭");
                        return;
                    }
                }
            }
        });
        Some(WalletListener { task })
    }

    fn set_state(&self, state: ConnectionState) {
        self.update(|session| session.state = state);
    }

    fn update(&self, apply: impl FnOnce(&mut Session)) {
        let mut transition = None;
        self.session.send_modify(|session| {
            let before = session.state;
            apply(session);
            if before != session.state {
                transition = Some((before, session.state));
            }
        });
        if let Some((from, to)) = transition {
            events::session_transition(from, to);
        }
    }
}

/// 钱包通知监听任务的所有权句柄。
pub struct WalletListener {
    task: JoinHandle<()>,
}

impl Drop for WalletListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}
