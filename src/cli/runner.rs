use std::collections::HashSet;

use anyhow::{Result, anyhow, bail};
use tracing::{info, warn};

use crate::chain::units::format_base_units;
use crate::cli::args::{Cli, Command, EventsArgs, QuoteArgs, TradeArgs};
use crate::cli::context::{AppContext, init_configs, print_connect_outcome};
use crate::config::AppConfig;
use crate::feed::{ChainEvent, EventPayload};
use crate::pipeline::{PipelineRun, TransactionRequest};
use crate::quote::{QuoteDirection, QuoteDisplay, QuoteOutcome};

pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    crate::monitoring::try_init_prometheus(&config.monitoring)?;

    match cli.command {
        Command::Init(args) => init_configs(args),
        command => dispatch(AppContext::build(config)?, command).await,
    }
}

async fn dispatch(context: AppContext, command: Command) -> Result<()> {
    match command {
        Command::Status => show_status(&context).await,
        Command::Connect => {
            let outcome = context.manager.connect().await?;
            print_connect_outcome(&outcome);
            Ok(())
        }
        Command::SwitchNetwork => switch_network(&context).await,
        Command::AddLiquidity => add_liquidity(&context).await,
        Command::Swap(args) => swap(&context, args).await,
        Command::Quote(args) => quote(&context, args).await,
        Command::Events(args) => events(&context, args).await,
        Command::Init(args) => init_configs(args),
    }
}

fn direction(args: &TradeArgs) -> QuoteDirection {
    if args.reverse {
        QuoteDirection::Reverse
    } else {
        QuoteDirection::Forward
    }
}

async fn show_status(context: &AppContext) -> Result<()> {
    if let Err(err) = context.manager.initialize().await {
        warn!(target: "cli", error = %err, "初始化会话失败");
    }
    let session = context.manager.session();
    println!("state:   {}", session.state.as_str());
    match session.account {
        Some(account) => println!("account: {account}"),
        None => println!("account: -"),
    }
    match session.chain_id {
        Some(chain_id) => println!("chain:   {chain_id}"),
        None => println!("chain:   -"),
    }
    println!(
        "network: {}",
        if context.manager.is_correct_network() {
            "✅ 目标网络"
        } else {
            "⚠️  非目标网络"
        }
    );
    if let Some(err) = &session.last_error {
        println!("error:   {err}");
    }
    Ok(())
}

async fn switch_network(context: &AppContext) -> Result<()> {
    if !context.manager.is_connected() {
        context.manager.connect().await?;
    }
    if context.manager.is_correct_network() {
        println!("已处于目标网络 {}", context.config.network.chain_id);
        return Ok(());
    }
    context.manager.switch_network().await?;
    let session = context.manager.session();
    println!(
        "已切换网络: {}",
        session
            .chain_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    Ok(())
}

async fn add_liquidity(context: &AppContext) -> Result<()> {
    let ready = context.ensure_ready().await?;
    let request = TransactionRequest::provide_liquidity(
        &context.config.contracts,
        &context.config.liquidity,
        ready.account,
    )?;
    let run = execute(context, request).await?;
    if let Some(receipt) = &run.receipt {
        println!(
            "✅ 流动性已添加：区块 {}，gas {}",
            receipt.block_number, receipt.gas_used
        );
    }
    Ok(())
}

async fn swap(context: &AppContext, args: TradeArgs) -> Result<()> {
    let ready = context.ensure_ready().await?;
    let request = TransactionRequest::swap(
        &context.config.contracts,
        direction(&args),
        args.amount,
        ready.account,
    )?;
    let run = execute(context, request).await?;
    let Some(receipt) = &run.receipt else {
        return Ok(());
    };
    println!(
        "✅ 兑换完成：区块 {}，gas {}",
        receipt.block_number, receipt.gas_used
    );
    for log in &receipt.logs {
        if let Ok(event) = ChainEvent::decode(log) {
            if let EventPayload::Swap(fields) = &event.payload {
                info!(
                    target: "cli",
                    amount0 = %fields.amount0,
                    amount1 = %fields.amount1,
                    tick = fields.tick,
                    "Swap 事件"
                );
                println!("   {event}");
            }
        }
    }
    Ok(())
}

async fn execute(context: &AppContext, request: TransactionRequest) -> Result<PipelineRun> {
    for spend in request.spends() {
        println!(
            "   {} {}",
            format_base_units(spend.amount, spend.decimals),
            spend.symbol
        );
    }
    let pipeline = context.pipeline();
    let run = pipeline
        .run_with_progress(request, |run| {
            println!("→ {}", run.phase.as_str());
        })
        .await;
    if !run.is_confirmed() {
        let reason = run
            .error
            .as_ref()
            .map(|err| err.to_string())
            .unwrap_or_else(|| "未确认".to_string());
        return Err(anyhow!("{} 失败: {reason}", run.kind.as_str()));
    }
    println!("   授权交易 {} 笔", run.approval_count());
    Ok(run)
}

async fn quote(context: &AppContext, args: QuoteArgs) -> Result<()> {
    context.ensure_ready().await?;
    let engine = context.quote_engine();
    if direction(&args.trade) == QuoteDirection::Reverse {
        // 输入为空时切换方向不会触发报价
        engine.toggle_direction().await;
    }

    let outcome = engine.set_input(args.trade.amount).await;
    print_quote(context, outcome, &engine.display())?;
    if args.flip {
        let outcome = engine.toggle_direction().await;
        print_quote(context, outcome, &engine.display())?;
    }
    Ok(())
}

fn print_quote(context: &AppContext, outcome: QuoteOutcome, display: &QuoteDisplay) -> Result<()> {
    let contracts = &context.config.contracts;
    let (input, output) = match display.direction {
        QuoteDirection::Forward => (&contracts.token0, &contracts.token1),
        QuoteDirection::Reverse => (&contracts.token1, &contracts.token0),
    };
    match outcome {
        QuoteOutcome::Quoted(amount) => {
            println!(
                "{} {} → {} {}",
                display.input, input.symbol, amount, output.symbol
            );
            println!(
                "   {}: {} / {}: {}",
                contracts.token0.symbol,
                display.amount0(),
                contracts.token1.symbol,
                display.amount1()
            );
            Ok(())
        }
        QuoteOutcome::NoQuote => {
            println!("输入数量为 0，无需报价");
            Ok(())
        }
        QuoteOutcome::Superseded => bail!("报价请求已被取代"),
        QuoteOutcome::Failed(err) => Err(anyhow!("报价失败: {err}")),
    }
}

async fn events(context: &AppContext, args: EventsArgs) -> Result<()> {
    context.ensure_ready().await?;
    let feed = context.event_feed();
    let count = feed.load_history().await?;
    println!("最近 {count} 条事件：");
    let mut seen = HashSet::new();
    for event in feed.entries() {
        seen.insert(event.key());
        println!("{event}");
    }

    if !args.follow {
        return Ok(());
    }

    let _listener = context.manager.listen();
    let mut updates = feed.subscribe();
    let mut subscription = feed.start().await?;
    println!("持续订阅中，Ctrl+C 退出…");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(target: "cli", "收到终止信号，停止订阅");
                return Ok(());
            }
            _ = subscription.closed() => {
                let state = feed.snapshot();
                return match state.error {
                    Some(err) => Err(anyhow!(err)),
                    None => {
                        println!("会话已变化，订阅结束");
                        Ok(())
                    }
                };
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let fresh: Vec<ChainEvent> = updates
                    .borrow_and_update()
                    .buffer
                    .entries()
                    .iter()
                    .filter(|event| !seen.contains(&event.key()))
                    .cloned()
                    .collect();
                for event in fresh.into_iter().rev() {
                    seen.insert(event.key());
                    println!("{event}");
                }
            }
        }
    }
}
