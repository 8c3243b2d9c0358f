//! 防抖报价：只有最近一次请求的结果会写回显示状态。

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::Address;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::chain::units::{from_base_units, to_base_units};
use crate::chain::{ChainGateway, ContractCall, abi};
use crate::config::{ContractsConfig, QuoteSettingsConfig};
use crate::error::{ClientError, ClientResult};
use crate::monitoring::events;
use crate::session::SessionView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteDirection {
    /// token0 → token1
    Forward,
    /// token1 → token0
    Reverse,
}

impl QuoteDirection {
    pub fn zero_for_one(&self) -> bool {
        matches!(self, QuoteDirection::Forward)
    }

    pub fn toggled(&self) -> Self {
        match self {
            QuoteDirection::Forward => QuoteDirection::Reverse,
            QuoteDirection::Reverse => QuoteDirection::Forward,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteDirection::Forward => "forward",
            QuoteDirection::Reverse => "reverse",
        }
    }
}

/// 展示层读取的报价状态，按输入侧 / 输出侧而非代币存放。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteDisplay {
    pub direction: QuoteDirection,
    pub input: Decimal,
    pub output: Decimal,
    pub busy: bool,
    pub error: Option<ClientError>,
}

impl QuoteDisplay {
    fn new() -> Self {
        Self {
            direction: QuoteDirection::Forward,
            input: Decimal::ZERO,
            output: Decimal::ZERO,
            busy: false,
            error: None,
        }
    }

    pub fn amount0(&self) -> Decimal {
        match self.direction {
            QuoteDirection::Forward => self.input,
            QuoteDirection::Reverse => self.output,
        }
    }

    pub fn amount1(&self) -> Decimal {
        match self.direction {
            QuoteDirection::Forward => self.output,
            QuoteDirection::Reverse => self.input,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteOutcome {
    Quoted(Decimal),
    /// 输入为零或为空，不访问节点。
    NoQuote,
    /// 被更新的请求取代，结果不写回。
    Superseded,
    Failed(ClientError),
}

impl QuoteOutcome {
    fn label(&self) -> &'static str {
        match self {
            QuoteOutcome::Quoted(_) => "quoted",
            QuoteOutcome::NoQuote => "no_quote",
            QuoteOutcome::Superseded => "superseded",
            QuoteOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuoteSettings {
    pub debounce: Duration,
    pub retry_base: Duration,
    pub max_retries: u32,
    pub desync_marker: String,
}

impl QuoteSettings {
    pub fn from_config(config: &QuoteSettingsConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            retry_base: Duration::from_millis(config.retry_base_ms),
            max_retries: config.max_retries,
            desync_marker: config.desync_marker.clone(),
        }
    }
}

impl Default for QuoteSettings {
    fn default() -> Self {
        Self::from_config(&QuoteSettingsConfig::default())
    }
}

pub struct QuoteEngine {
    gateway: Arc<dyn ChainGateway>,
    session: SessionView,
    pool: Address,
    quoter: Option<Address>,
    decimals: (u8, u8),
    settings: QuoteSettings,
    generation: AtomicU64,
    display: watch::Sender<QuoteDisplay>,
}

impl QuoteEngine {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        session: SessionView,
        contracts: &ContractsConfig,
        settings: QuoteSettings,
    ) -> Self {
        let (display, _) = watch::channel(QuoteDisplay::new());
        Self {
            gateway,
            session,
            pool: contracts.pool,
            quoter: contracts.quoter(),
            decimals: (contracts.token0.decimals, contracts.token1.decimals),
            settings,
            generation: AtomicU64::new(0),
            display,
        }
    }

    pub fn display(&self) -> QuoteDisplay {
        self.display.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QuoteDisplay> {
        self.display.subscribe()
    }

    /// 用当前方向更新输入金额并报价。
    pub async fn set_input(&self, amount: Decimal) -> QuoteOutcome {
        let direction = self.display.borrow().direction;
        self.request_quote(direction, amount).await
    }

    /// 切换方向：先对调两侧金额作为估计，再以新的输入金额重新报价。
    pub async fn toggle_direction(&self) -> QuoteOutcome {
        let mut next = (QuoteDirection::Forward, Decimal::ZERO);
        self.display.send_modify(|display| {
            display.direction = display.direction.toggled();
            std::mem::swap(&mut display.input, &mut display.output);
            next = (display.direction, display.input);
        });
        let (direction, amount) = next;
        if amount.is_zero() {
            // 新输入为 0 时保留对调后的金额，只作废进行中的请求
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.display.send_modify(|display| {
                display.busy = false;
                display.error = None;
            });
            events::quote_outcome(direction, "no_quote", 0);
            return QuoteOutcome::NoQuote;
        }
        self.request_quote(direction, amount).await
    }

    pub async fn request_quote(&self, direction: QuoteDirection, amount: Decimal) -> QuoteOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.display.send_modify(|display| {
            display.direction = direction;
            display.input = amount;
        });

        let outcome = self.evaluate(generation, direction, amount).await;
        match &outcome {
            QuoteOutcome::Superseded => {
                debug!(target: "quote", generation, "报价请求已被取代");
            }
            QuoteOutcome::Failed(err) => {
                warn!(target: "quote", generation, error = %err, "获取报价失败");
            }
            _ => {}
        }
        outcome
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// 仅当 `generation` 仍是最新请求时写回显示状态。
    fn apply(&self, generation: u64, apply: impl FnOnce(&mut QuoteDisplay)) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.display.send_modify(apply);
        true
    }

    async fn evaluate(
        &self,
        generation: u64,
        direction: QuoteDirection,
        amount: Decimal,
    ) -> QuoteOutcome {
        if amount.is_zero() {
            self.apply(generation, |display| {
                display.output = Decimal::ZERO;
                display.busy = false;
                display.error = None;
            });
            events::quote_outcome(direction, "no_quote", 0);
            return QuoteOutcome::NoQuote;
        }

        if !self.settings.debounce.is_zero() {
            tokio::time::sleep(self.settings.debounce).await;
        }
        if !self.is_current(generation) {
            events::quote_outcome(direction, "superseded", 0);
            return QuoteOutcome::Superseded;
        }

        self.apply(generation, |display| {
            display.busy = true;
            display.error = None;
        });

        let (result, attempts) = self.quote_with_retry(generation, direction, amount).await;
        let outcome = match result {
            Ok(Some(output)) => {
                if self.apply(generation, |display| {
                    display.output = output;
                    display.busy = false;
                }) {
                    QuoteOutcome::Quoted(output)
                } else {
                    QuoteOutcome::Superseded
                }
            }
            Ok(None) => QuoteOutcome::Superseded,
            Err(err) => {
                let reported = err.clone();
                if self.apply(generation, move |display| {
                    display.output = Decimal::ZERO;
                    display.busy = false;
                    display.error = Some(reported);
                }) {
                    QuoteOutcome::Failed(err)
                } else {
                    QuoteOutcome::Superseded
                }
            }
        };
        events::quote_outcome(direction, outcome.label(), attempts);
        outcome
    }

    /// 视图不同步时按 1×、2×、3× 基础延迟线性退避重试；被取代时返回 `Ok(None)`。
    async fn quote_with_retry(
        &self,
        generation: u64,
        direction: QuoteDirection,
        amount: Decimal,
    ) -> (ClientResult<Option<Decimal>>, u32) {
        let call = match self.build_call(direction, amount) {
            Ok(call) => call,
            Err(err) => return (Err(err), 0),
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.simulate(&call, direction).await {
                Ok(output) => return (Ok(Some(output)), attempt),
                Err(err) if err.is_transient() && attempt <= self.settings.max_retries => {
                    let delay = self.settings.retry_base * attempt;
                    debug!(
                        target: "quote",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "节点视图不同步，稍后重试"
                    );
                    tokio::time::sleep(delay).await;
                    if !self.is_current(generation) {
                        return (Ok(None), attempt);
                    }
                }
                Err(err) => return (Err(err), attempt),
            }
        }
    }

    fn build_call(&self, direction: QuoteDirection, amount: Decimal) -> ClientResult<ContractCall> {
        self.session.require_ready()?;
        let quoter = self.quoter.ok_or(ClientError::QuoterUnavailable)?;
        let input_decimals = match direction {
            QuoteDirection::Forward => self.decimals.0,
            QuoteDirection::Reverse => self.decimals.1,
        };
        let amount_in = to_base_units(amount, input_decimals)?;
        Ok(ContractCall::new(
            quoter,
            abi::quote_calldata(self.pool, amount_in, direction.zero_for_one()),
        ))
    }

    async fn simulate(&self, call: &ContractCall, direction: QuoteDirection) -> ClientResult<Decimal> {
        let data = self
            .gateway
            .simulate(call)
            .await
            .map_err(|err| ClientError::classify(&err, Some(&self.settings.desync_marker)))?;
        let amount_out = abi::decode_quote_output(&data)?;
        let output_decimals = match direction {
            QuoteDirection::Forward => self.decimals.1,
            QuoteDirection::Reverse => self.decimals.0,
        };
        from_base_units(amount_out, output_decimals)
    }
}
