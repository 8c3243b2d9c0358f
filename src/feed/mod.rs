//! 池子事件流：有界历史回填 + 实时订阅，合并为一份按时间倒序的活动列表。

pub mod buffer;
pub mod types;


use std::sync::Arc;

use alloy_primitives::Address;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chain::{ChainGateway, LogFilter, LogSubscription, RawLog};
use crate::config::{FeedConfig, LiveOrdering};
use crate::error::{ClientError, ClientResult};
use crate::monitoring::events;
use crate::session::SessionView;

pub use buffer::FeedBuffer;
pub use types::{ChainEvent, EventKind, EventPayload};

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub lookback_blocks: u64,
    pub max_entries: usize,
    pub ordering: LiveOrdering,
}

impl FeedSettings {
    pub fn from_config(config: &FeedConfig) -> Self {
        Self {
            lookback_blocks: config.lookback_blocks,
            max_entries: config.max_entries,
            ordering: config.live_ordering,
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self::from_config(&FeedConfig::default())
    }
}

/// 展示层读取的事件流状态。
#[derive(Debug, Clone)]
pub struct FeedState {
    pub buffer: FeedBuffer,
    pub loading: bool,
    pub live: bool,
    /// 最近一次历史查询覆盖到的区块，实时订阅从其下一块开始。
    pub synced_to: Option<u64>,
    /// 列表与 `synced_to` 所属的会话纪元；切链后即失效。
    pub epoch: Option<u64>,
    pub error: Option<ClientError>,
}

struct HistoryPage {
    from_block: u64,
    to_block: u64,
    mints: Vec<RawLog>,
    swaps: Vec<RawLog>,
}

pub struct EventFeed {
    gateway: Arc<dyn ChainGateway>,
    session: SessionView,
    pool: Address,
    settings: FeedSettings,
    state: watch::Sender<FeedState>,
}

impl EventFeed {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        session: SessionView,
        pool: Address,
        settings: FeedSettings,
    ) -> Self {
        let (state, _) = watch::channel(FeedState {
            buffer: FeedBuffer::new(settings.max_entries, settings.ordering),
            loading: false,
            live: false,
            synced_to: None,
            epoch: None,
            error: None,
        });
        Self {
            gateway,
            session,
            pool,
            settings,
            state,
        }
    }

    pub fn snapshot(&self) -> FeedState {
        self.state.borrow().clone()
    }

    pub fn entries(&self) -> Vec<ChainEvent> {
        self.state.borrow().buffer.entries().to_vec()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    fn filter(&self, kinds: &[EventKind], from_block: u64, to_block: Option<u64>) -> LogFilter {
        LogFilter {
            address: self.pool,
            event_signatures: kinds.iter().map(EventKind::signature_hash).collect(),
            from_block,
            to_block,
        }
    }

    /// 拉取最近 `lookback_blocks` 个区块内的 Mint / Swap 事件并整体替换列表。
    ///
    /// 失败时保留上一次成功的内容，仅记录错误；可再次调用以手动刷新。
    pub async fn load_history(&self) -> ClientResult<usize> {
        let ready = self.session.require_ready()?;
        self.state.send_modify(|state| state.loading = true);

        let page = match self.fetch_history().await {
            Ok(page) => page,
            Err(err) => {
                events::feed_history_failed(&err.to_string());
                let reported = err.clone();
                self.state.send_modify(move |state| {
                    state.loading = false;
                    state.error = Some(reported);
                });
                return Err(err);
            }
        };

        if self.session.require_ready().map(|now| now.epoch) != Ok(ready.epoch) {
            debug!(target: "feed", "加载期间会话已变化，丢弃历史结果");
            self.state.send_modify(|state| state.loading = false);
            return Ok(self.state.borrow().buffer.len());
        }

        let (mint_count, swap_count) = (page.mints.len(), page.swaps.len());
        let decoded: Vec<ChainEvent> = page
            .mints
            .iter()
            .chain(page.swaps.iter())
            .filter_map(|log| match ChainEvent::decode(log) {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!(
                        target: "feed",
                        block = log.block_number,
                        log_index = log.log_index,
                        error = %err,
                        "跳过无法解析的日志"
                    );
                    None
                }
            })
            .collect();

        let mut retained = 0;
        self.state.send_modify(|state| {
            state.buffer.replace(decoded);
            state.loading = false;
            state.synced_to = Some(page.to_block);
            state.epoch = Some(ready.epoch);
            state.error = None;
            retained = state.buffer.len();
        });
        events::feed_history_loaded(page.from_block, page.to_block, mint_count, swap_count);
        Ok(retained)
    }

    async fn fetch_history(&self) -> ClientResult<HistoryPage> {
        let head = self.gateway.block_number().await?;
        let from_block = head.saturating_sub(self.settings.lookback_blocks);
        let mint_filter = self.filter(&[EventKind::Mint], from_block, Some(head));
        let swap_filter = self.filter(&[EventKind::Swap], from_block, Some(head));

        let (mints, swaps) = tokio::try_join!(
            self.gateway.query_logs(&mint_filter),
            self.gateway.query_logs(&swap_filter)
        )?;
        Ok(HistoryPage {
            from_block,
            to_block: head,
            mints,
            swaps,
        })
    }

    /// 开始实时订阅。返回的句柄被 drop 时订阅随之释放；会话断开或切链时订阅自行结束。
    pub async fn start(self: &Arc<Self>) -> ClientResult<FeedSubscription> {
        let ready = self.session.require_ready()?;
        let stale = self
            .state
            .borrow()
            .epoch
            .is_some_and(|epoch| epoch != ready.epoch);
        if stale {
            info!(target: "feed", epoch = ready.epoch, "网络已切换，丢弃旧事件并重新加载历史");
            self.state.send_modify(|state| {
                state.buffer.replace(Vec::new());
                state.synced_to = None;
                state.epoch = None;
            });
            self.load_history().await?;
        }
        let synced_to = self.state.borrow().synced_to;
        let from_block = match synced_to {
            Some(block) => block + 1,
            None => self.gateway.block_number().await? + 1,
        };

        let filter = self.filter(&[EventKind::Mint, EventKind::Swap], from_block, None);
        let subscription = self.gateway.subscribe_logs(filter).await?;
        self.state.send_modify(|state| {
            state.live = true;
            state.error = None;
        });
        info!(target: "feed", from_block, "实时事件订阅已建立");

        let feed = Arc::clone(self);
        let task = tokio::spawn(async move { feed.follow(subscription, ready.epoch).await });
        Ok(FeedSubscription {
            feed: Arc::clone(self),
            task,
        })
    }

    async fn follow(self: Arc<Self>, mut subscription: LogSubscription, epoch: u64) {
        let mut session = self.session.clone();
        loop {
            tokio::select! {
                item = subscription.next() => match item {
                    Some(Ok(log)) => self.on_live_log(&log),
                    Some(Err(err)) => {
                        self.on_lost(ClientError::SubscriptionLost(err.to_string()));
                        break;
                    }
                    None => {
                        self.on_lost(ClientError::SubscriptionLost("事件流已关闭".to_string()));
                        break;
                    }
                },
                alive = session.changed() => {
                    let still_valid = alive
                        && matches!(session.require_ready(), Ok(now) if now.epoch == epoch);
                    if !still_valid {
                        debug!(target: "feed", "会话已断开或切换网络，停止实时订阅");
                        break;
                    }
                }
            }
        }
        subscription.cancel();
        self.state.send_modify(|state| state.live = false);
    }

    fn on_live_log(&self, log: &RawLog) {
        let event = match ChainEvent::decode(log) {
            Ok(event) => event,
            Err(err) => {
                warn!(target: "feed", block = log.block_number, error = %err, "跳过无法解析的实时日志");
                return;
            }
        };
        let (kind, block) = (event.kind(), event.block_number);
        let mut inserted = false;
        self.state.send_modify(|state| {
            inserted = state.buffer.insert(event);
        });
        events::feed_live_event(kind, block, inserted);
    }

    fn on_lost(&self, err: ClientError) {
        events::feed_subscription_lost(&err.to_string());
        self.state.send_modify(move |state| {
            state.live = false;
            state.error = Some(err);
        });
    }
}

/// 实时订阅的持有句柄；drop 即释放底层订阅。
pub struct FeedSubscription {
    feed: Arc<EventFeed>,
    task: JoinHandle<()>,
}

impl FeedSubscription {
    /// 等待订阅自行结束（会话断开、切链或事件流中断）。
    pub async fn closed(&mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.task.abort();
        self.feed.state.send_modify(|state| state.live = false);
    }
}
