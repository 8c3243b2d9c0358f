use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

use crate::config::MonitoringConfig;

static EXPORTER: OnceCell<()> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

/// 仅在配置了监听地址时启动 exporter，重复调用只生效一次。
pub fn try_init_prometheus(config: &MonitoringConfig) -> Result<()> {
    let Some(listen) = config.prometheus_listen.as_deref() else {
        return Ok(());
    };
    EXPORTER
        .get_or_try_init(|| {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("invalid prometheus listen address: {listen}"))?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .context("failed to install prometheus exporter")?;
            PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
            Ok(())
        })
        .map(|_| ())
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}
