use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(name = "poolside", version, about = "集中流动性池客户端")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 poolside.toml 或 config/poolside.toml）"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 查看钱包连接与网络状态
    Status,
    /// 请求账户授权并连接
    Connect,
    /// 切换到配置的目标网络（必要时先添加网络）
    #[command(name = "switch-network")]
    SwitchNetwork,
    /// 按配置的区间与数量添加流动性
    #[command(name = "add-liquidity")]
    AddLiquidity,
    /// 兑换代币
    Swap(TradeArgs),
    /// 获取兑换报价（不发送交易）
    Quote(QuoteArgs),
    /// 查看池子的 Mint / Swap 事件
    Events(EventsArgs),
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug)]
pub struct TradeArgs {
    #[arg(long, help = "输入数量（人类可读单位）")]
    pub amount: Decimal,
    #[arg(long, help = "反向兑换：token1 → token0")]
    pub reverse: bool,
}

#[derive(Args, Debug)]
pub struct QuoteArgs {
    #[command(flatten)]
    pub trade: TradeArgs,
    #[arg(long, help = "报价后切换方向，以对侧金额再报价一次")]
    pub flip: bool,
}

#[derive(Args, Debug)]
pub struct EventsArgs {
    #[arg(long, help = "加载历史后持续订阅新事件，Ctrl+C 退出")]
    pub follow: bool,
}

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    pub output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    pub force: bool,
}
