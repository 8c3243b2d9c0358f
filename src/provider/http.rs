use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::{Eip1193, ProviderError, ProviderEvent};

const METHOD_NOT_FOUND: i64 = -32601;
const EVENT_CAPACITY: usize = 16;

/// 基于 HTTP JSON-RPC 的 provider，适用于解锁了开发账户的本地节点（如 Anvil）。
///
/// 节点不会推送账户 / 网络变更，`events()` 返回的接收端不会收到消息。
pub struct HttpProvider {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
    events: broadcast::Sender<ProviderEvent>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
            events,
        })
    }

    async fn send(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(target: "provider", id, method, "sending json-rpc request");

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() && text.trim().is_empty() {
            return Err(ProviderError::Transport(format!(
                "{method} 返回 HTTP 状态 {status}"
            )));
        }

        let parsed: JsonRpcResponse = serde_json::from_str(&text)?;
        if let Some(error) = parsed.error {
            return Err(ProviderError::rpc(error.code, error.message));
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Eip1193 for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match self.send(method, params).await {
            Err(err) if method == "eth_requestAccounts" && err.code() == Some(METHOD_NOT_FOUND) => {
                debug!(
                    target: "provider",
                    "节点不支持 eth_requestAccounts，回退到 eth_accounts"
                );
                self.send("eth_accounts", json!([])).await
            }
            other => other,
        }
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
