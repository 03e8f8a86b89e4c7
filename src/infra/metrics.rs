//! 网关计数器的 Prometheus 视图
//!
//! 统计汇总任务周期性把 [`StatsSnapshot`] 写入全局 Recorder，`/metrics` 读取渲染结果。
//! Recorder 未安装时 `metrics` 宏为空操作，`render` 返回 None。

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use crate::context::StatsSnapshot;
use crate::error::{Result, ServerError};

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

const GAUGE_CONNECTIONS: &str = "linegate_connections_active";
const GAUGE_REQUEST_RATE: &str = "linegate_request_rate";
const GAUGE_BACKLOG: &str = "linegate_backlog";
const GAUGE_BUDGET_AVAILABLE: &str = "linegate_budget_available";
const COUNTER_RECEIVED: &str = "linegate_requests_received_total";
const COUNTER_PROCESSED: &str = "linegate_requests_processed_total";
const COUNTER_LOOKUP_SKIPPED: &str = "linegate_lookup_skipped_total";
const COUNTER_ADMISSION_WAITED: &str = "linegate_admission_waited_total";

/// 安装全局 Prometheus Recorder；已安装时直接返回
pub fn install() -> Result<()> {
    if is_installed() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Configuration(format!("prometheus recorder: {}", e)))?;
    // 并发安装时只保留第一个 handle
    let _ = PROMETHEUS.set(handle);
    Ok(())
}

pub fn is_installed() -> bool {
    PROMETHEUS.get().is_some()
}

/// 当前指标的 Prometheus 文本
pub fn render() -> Option<String> {
    PROMETHEUS.get().map(PrometheusHandle::render)
}

/// 上报一次统计快照
pub fn record_snapshot(snapshot: &StatsSnapshot) {
    metrics::gauge!(GAUGE_CONNECTIONS).set(snapshot.active_connections as f64);
    metrics::gauge!(GAUGE_REQUEST_RATE).set(snapshot.counters.rate as f64);
    metrics::gauge!(GAUGE_BACKLOG).set(snapshot.counters.backlog() as f64);
    metrics::gauge!(GAUGE_BUDGET_AVAILABLE).set(snapshot.budget_available as f64);
    metrics::counter!(COUNTER_RECEIVED).absolute(snapshot.counters.received);
    metrics::counter!(COUNTER_PROCESSED).absolute(snapshot.counters.processed);
    metrics::counter!(COUNTER_LOOKUP_SKIPPED).absolute(snapshot.lookup_skipped);
    metrics::counter!(COUNTER_ADMISSION_WAITED).absolute(snapshot.admission_waited);
}
