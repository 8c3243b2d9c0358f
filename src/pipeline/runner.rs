use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::{Address, B256};
use tracing::{debug, info, warn};

use super::{PipelinePhase, PipelineRun, TokenSpend, TransactionRequest};
use crate::chain::units::format_base_units;
use crate::chain::{ChainGateway, ContractCall, TxReceipt, abi};
use crate::error::{ClientError, ClientResult};
use crate::monitoring::events;
use crate::session::{ReadySession, SessionView};

#[derive(Clone)]
pub struct TransactionPipeline {
    gateway: Arc<dyn ChainGateway>,
    session: SessionView,
    spender: Address,
}

impl TransactionPipeline {
    pub fn new(gateway: Arc<dyn ChainGateway>, session: SessionView, spender: Address) -> Self {
        Self {
            gateway,
            session,
            spender,
        }
    }

    pub async fn run(&self, request: TransactionRequest) -> PipelineRun {
        self.run_with_progress(request, |_| {}).await
    }

    /// 每次阶段变化都会回调 `on_progress`。任何一步失败即终止，不自动重试。
    pub async fn run_with_progress(
        &self,
        request: TransactionRequest,
        mut on_progress: impl FnMut(&PipelineRun),
    ) -> PipelineRun {
        let started = Instant::now();
        let mut run = PipelineRun::start(&request);
        on_progress(&run);

        if let Err(err) = self.drive(&request, &mut run, &mut on_progress).await {
            warn!(
                target: "pipeline",
                action = request.kind().as_str(),
                phase = run.phase.as_str(),
                error = %err,
                "交易流水线失败"
            );
            run.phase = PipelinePhase::Failed;
            run.error = Some(err);
            on_progress(&run);
        }

        events::pipeline_finished(request.kind(), run.phase, started.elapsed());
        run
    }

    async fn drive(
        &self,
        request: &TransactionRequest,
        run: &mut PipelineRun,
        on_progress: &mut impl FnMut(&PipelineRun),
    ) -> ClientResult<()> {
        let ready = self.session.require_ready()?;
        self.check_balances(&ready, request.spends()).await?;

        for spend in request.spends() {
            let hash = self.ensure_allowance(request, spend).await?;
            if hash.is_some() {
                run.approvals.insert(spend.token, hash);
                on_progress(run);
            }
        }

        run.phase = PipelinePhase::Executing;
        on_progress(run);

        let ready = self.session.require_ready()?;
        let hash = self.submit(ready.account, request.action()).await?;
        run.action_tx = Some(hash);
        on_progress(run);
        info!(
            target: "pipeline",
            action = request.kind().as_str(),
            tx = %hash,
            "交易已发送，等待确认"
        );

        let receipt = self.confirm(hash).await?;
        info!(
            target: "pipeline",
            action = request.kind().as_str(),
            tx = %hash,
            block = receipt.block_number,
            gas_used = receipt.gas_used,
            "交易已确认"
        );
        run.receipt = Some(receipt);
        run.phase = PipelinePhase::Confirmed;
        on_progress(run);
        Ok(())
    }

    /// 在任何提交之前检查余额，避免只能从回滚中推断余额不足。
    async fn check_balances(&self, ready: &ReadySession, spends: &[TokenSpend]) -> ClientResult<()> {
        for spend in spends {
            let balance = self
                .gateway
                .balance_of(spend.token, ready.account)
                .await
                .map_err(ClientError::from)?;
            if balance < spend.amount {
                return Err(ClientError::InsufficientFunds(format!(
                    "{} 当前余额 {}，需要 {}",
                    spend.symbol,
                    format_base_units(balance, spend.decimals),
                    format_base_units(spend.amount, spend.decimals)
                )));
            }
        }
        Ok(())
    }

    /// 授权前现读额度；不足时按所需数量精确授权并等待上链。
    async fn ensure_allowance(
        &self,
        request: &TransactionRequest,
        spend: &TokenSpend,
    ) -> ClientResult<Option<B256>> {
        let ready = self.session.require_ready()?;
        let allowance = self
            .gateway
            .allowance(spend.token, ready.account, self.spender)
            .await
            .map_err(ClientError::from)?;

        if allowance >= spend.amount {
            debug!(
                target: "pipeline",
                token = %spend.symbol,
                allowance = %format_base_units(allowance, spend.decimals),
                "授权额度充足"
            );
            return Ok(None);
        }

        debug!(
            target: "pipeline",
            reason = %ClientError::InsufficientAllowance { token: spend.token },
            current = %format_base_units(allowance, spend.decimals),
            required = %format_base_units(spend.amount, spend.decimals),
            "请求代币授权"
        );
        let approve = ContractCall::new(
            spend.token,
            abi::approve_calldata(self.spender, spend.amount),
        );
        let hash = self.submit(ready.account, &approve).await?;
        events::approval_submitted(request.kind(), &spend.token, spend.amount, &hash);
        self.confirm(hash).await?;
        info!(target: "pipeline", token = %spend.symbol, tx = %hash, "授权完成");
        Ok(Some(hash))
    }

    async fn submit(&self, from: Address, call: &ContractCall) -> ClientResult<B256> {
        self.gateway
            .send_transaction(from, call)
            .await
            .map_err(ClientError::from)
    }

    async fn confirm(&self, hash: B256) -> ClientResult<TxReceipt> {
        let receipt = self
            .gateway
            .wait_for_receipt(hash)
            .await
            .map_err(ClientError::from)?;
        if !receipt.success {
            return Err(ClientError::ActionFailed(format!("交易 {hash} 执行回滚")));
        }
        Ok(receipt)
    }
}
