use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

mod chain;
mod cli;
mod config;
mod error;
mod feed;
mod monitoring;
mod pipeline;
mod provider;
mod quote;
mod session;

#[cfg(test)]
mod testkit;

use cli::args::{Cli, Command};
use config::{AppConfig, load_config};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.command {
        // 生成模版不依赖已有配置
        Command::Init(_) => AppConfig::default(),
        _ => load_config(cli.config.clone())?,
    };
    init_tracing(&config.logging)?;
    cli::run(cli, config).await
}

fn init_tracing(config: &config::LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .init();
    } else {
        fmt().with_env_filter(filter).init();
    }
    Ok(())
}
