use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::info;

use crate::chain::{ChainGateway, RpcGateway, RpcGatewaySettings};
use crate::cli::args::InitCmd;
use crate::config::{AppConfig, CONFIG_TEMPLATE};
use crate::feed::{EventFeed, FeedSettings};
use crate::pipeline::TransactionPipeline;
use crate::provider::{Eip1193, HttpProvider};
use crate::quote::{QuoteEngine, QuoteSettings};
use crate::session::{ConnectionManager, ConnectOutcome, ReadySession};

/// 一次命令执行所需的全部组件，均共享同一个会话。
pub struct AppContext {
    pub config: AppConfig,
    pub manager: Arc<ConnectionManager>,
    pub gateway: Arc<dyn ChainGateway>,
}

impl AppContext {
    pub fn build(config: AppConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.network.request_timeout_ms);
        let provider: Arc<dyn Eip1193> = Arc::new(
            HttpProvider::new(config.network.rpc_url.clone(), timeout)
                .map_err(|err| anyhow!("初始化 RPC 客户端失败: {err}"))?,
        );
        let settings = RpcGatewaySettings {
            receipt_poll: Duration::from_millis(config.pipeline.receipt_poll_ms),
            receipt_timeout: Duration::from_secs(config.pipeline.receipt_timeout_secs),
            log_poll: Duration::from_millis(config.feed.poll_interval_ms),
        };
        let gateway: Arc<dyn ChainGateway> =
            Arc::new(RpcGateway::new(Arc::clone(&provider), settings));
        let manager = Arc::new(ConnectionManager::new(
            Some(provider),
            config.network.clone(),
        ));
        info!(
            target: "cli",
            rpc = %config.network.rpc_url,
            chain_id = config.network.chain_id,
            "客户端组件已就绪"
        );
        Ok(Self {
            config,
            manager,
            gateway,
        })
    }

    pub fn pipeline(&self) -> TransactionPipeline {
        TransactionPipeline::new(
            Arc::clone(&self.gateway),
            self.manager.view(),
            self.config.contracts.manager,
        )
    }

    pub fn quote_engine(&self) -> QuoteEngine {
        QuoteEngine::new(
            Arc::clone(&self.gateway),
            self.manager.view(),
            &self.config.contracts,
            QuoteSettings::from_config(&self.config.quote),
        )
    }

    pub fn event_feed(&self) -> Arc<EventFeed> {
        Arc::new(EventFeed::new(
            Arc::clone(&self.gateway),
            self.manager.view(),
            self.config.contracts.pool,
            FeedSettings::from_config(&self.config.feed),
        ))
    }

    /// 自动连接并确认处于目标网络；网络不对时给出手动切换提示。
    pub async fn ensure_ready(&self) -> Result<ReadySession> {
        let outcome = match self.manager.initialize().await? {
            Some(outcome) => outcome,
            None => self.manager.connect().await?,
        };
        if let Some(offer) = &outcome.network_offer {
            print_network_offer(offer);
            return Err(anyhow!(
                "当前网络 {} 与目标网络 {} 不一致",
                offer.current_chain,
                offer.target_chain
            ));
        }
        Ok(self.manager.view().require_ready()?)
    }
}

pub fn print_connect_outcome(outcome: &ConnectOutcome) {
    println!("account: {}", outcome.account);
    println!("chain:   {}", outcome.chain_id);
    if let Some(offer) = &outcome.network_offer {
        print_network_offer(offer);
    }
}

fn print_network_offer(offer: &crate::session::NetworkOffer) {
    println!(
        "⚠️  钱包处于链 {}，目标为 {}（{}）",
        offer.current_chain, offer.target_chain, offer.chain_name
    );
    println!("   运行 `poolside switch-network` 自动切换，或在钱包中手动添加：");
    println!("   chain id: {}", offer.target_chain);
    println!("   name:     {}", offer.chain_name);
    println!("   rpc:      {}", offer.rpc_url);
}

pub fn init_configs(args: InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    fs::create_dir_all(&output_dir)?;

    let target_path = output_dir.join("poolside.toml");
    if target_path.exists() && !args.force {
        println!(
            "跳过 {}（文件已存在，如需覆盖请加 --force）",
            target_path.display()
        );
        return Ok(());
    }

    fs::write(&target_path, CONFIG_TEMPLATE)?;
    println!("已写入 {}", target_path.display());
    Ok(())
}
