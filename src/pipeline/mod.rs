//! 授权 → 执行 → 确认 的交易流水线，供添加流动性与兑换共用。

pub mod builders;
pub mod runner;


use std::collections::BTreeMap;

use alloy_primitives::{Address, B256, U256};

use crate::chain::{ContractCall, TxReceipt};
use crate::error::ClientError;

pub use runner::TransactionPipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    ProvideLiquidity,
    Swap,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ProvideLiquidity => "provide_liquidity",
            ActionKind::Swap => "swap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpend {
    pub token: Address,
    pub symbol: String,
    pub decimals: u8,
    pub amount: U256,
}

/// 一次交易请求；构造后不可变，只能被流水线消费一次。
#[derive(Debug)]
pub struct TransactionRequest {
    kind: ActionKind,
    spends: Vec<TokenSpend>,
    action: ContractCall,
}

impl TransactionRequest {
    pub fn new(kind: ActionKind, spends: Vec<TokenSpend>, action: ContractCall) -> Self {
        Self {
            kind,
            spends,
            action,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn spends(&self) -> &[TokenSpend] {
        &self.spends
    }

    pub fn action(&self) -> &ContractCall {
        &self.action
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Approving,
    Executing,
    Confirmed,
    Failed,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Approving => "approving",
            PipelinePhase::Executing => "executing",
            PipelinePhase::Confirmed => "confirmed",
            PipelinePhase::Failed => "failed",
        }
    }
}

/// 单次运行的执行记录，只归创建它的调用方所有。
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub kind: ActionKind,
    pub phase: PipelinePhase,
    /// 每个代币的授权交易哈希；额度已足够的代币保持 `None`。
    pub approvals: BTreeMap<Address, Option<B256>>,
    pub action_tx: Option<B256>,
    pub receipt: Option<TxReceipt>,
    pub error: Option<ClientError>,
}

impl PipelineRun {
    fn start(request: &TransactionRequest) -> Self {
        Self {
            kind: request.kind,
            phase: PipelinePhase::Approving,
            approvals: request
                .spends
                .iter()
                .map(|spend| (spend.token, None))
                .collect(),
            action_tx: None,
            receipt: None,
            error: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.phase == PipelinePhase::Confirmed
    }

    pub fn approval_count(&self) -> usize {
        self.approvals.values().filter(|hash| hash.is_some()).count()
    }
}
