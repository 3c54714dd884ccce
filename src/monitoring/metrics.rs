use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

/// 安装 Prometheus 导出器，重复调用返回首次绑定的地址。
pub fn try_init_prometheus(listen: &str) -> Result<SocketAddr> {
    EXPORTER
        .get_or_try_init(|| {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("invalid prometheus listen address: {listen}"))?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .context("failed to install prometheus exporter")?;
            describe_metrics();
            PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
            Ok(addr)
        })
        .copied()
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}

fn describe_metrics() {
    describe_counter!("solsplit_step_confirmed_total", "已确认的上链步骤数");
    describe_counter!("solsplit_flow_aborted_total", "因提交失败而中止的流程数");
    describe_counter!("solsplit_flow_declined_total", "因用户拒绝签名而结束的流程数");
    describe_counter!("solsplit_preflight_shortfall_total", "余额预检不足的次数");
    describe_counter!("solsplit_alt_closed_total", "已关闭的 ALT 数量");
    describe_histogram!("solsplit_split_recipients", "单次分账的收款人数量");
}
