use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::infra::{AdmissionGate, CountersSnapshot, MetricsCounters, RateBudget};
use crate::lookup::LookupService;

/// 网关共享上下文
///
/// 进程内唯一，所有连接 handler 和后台任务通过 `Arc` 共享。
/// 对外只暴露各原语自身的原子操作，连接之间不共享任何其他状态。
pub struct GatewayContext {
    /// 外部调用令牌预算
    pub budget: RateBudget,
    /// 连接准入闸门
    pub gate: AdmissionGate,
    /// 请求计数器
    pub counters: MetricsCounters,
    /// 外部查询服务
    pub lookup: Arc<dyn LookupService>,
    /// 单次读空闲超时
    pub read_timeout: Duration,
    /// 补充 / 清零周期
    pub refill_interval: Duration,
    next_connection_id: AtomicU64,
}

impl GatewayContext {
    /// 创建新的共享上下文
    pub fn new(config: &ServerConfig, lookup: Arc<dyn LookupService>) -> Self {
        Self {
            budget: RateBudget::new(config.api_rate_limit),
            gate: AdmissionGate::new(config.max_connections as usize),
            counters: MetricsCounters::new(),
            lookup,
            read_timeout: config.read_timeout(),
            refill_interval: config.refill_interval(),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// 分配连接 ID（仅用于日志关联）
    pub fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// 当前统计快照
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            active_connections: self.gate.active(),
            counters: self.counters.snapshot(),
            budget_available: self.budget.available(),
            lookup_skipped: self.budget.skipped_total(),
            admission_waited: self.gate.waited_total(),
            uptime_secs: self.counters.uptime_secs(),
            rate_window_ms: self.refill_interval.as_millis() as u64,
        }
    }
}

impl fmt::Debug for GatewayContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayContext")
            .field("budget", &self.budget)
            .field("gate", &self.gate)
            .field("counters", &self.counters)
            .field("lookup", &self.lookup.name())
            .field("read_timeout", &self.read_timeout)
            .field("refill_interval", &self.refill_interval)
            .finish()
    }
}

/// 统计快照（供 HTTP 统计端点与 Prometheus 上报使用）
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSnapshot {
    pub active_connections: usize,
    pub counters: CountersSnapshot,
    pub budget_available: u32,
    pub lookup_skipped: u64,
    pub admission_waited: u64,
    pub uptime_secs: u64,
    /// `rate` 的统计窗口（即补充 / 清零周期）
    pub rate_window_ms: u64,
}

impl StatsSnapshot {
    /// 速率单位：1 秒窗口显示为 `s`，整秒显示为 `Ns`，其余显示为 `Nms`
    pub fn rate_unit(&self) -> String {
        match self.rate_window_ms {
            1000 => "s".to_string(),
            ms if ms % 1000 == 0 => format!("{}s", ms / 1000),
            ms => format!("{}ms", ms),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current connection count: {}", self.active_connections)?;
        writeln!(
            f,
            "Current request rate: {}/{}",
            self.counters.rate,
            self.rate_unit()
        )?;
        writeln!(f, "Processed request count: {}", self.counters.received)?;
        writeln!(f, "Remaining jobs: {}", self.counters.backlog())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::EchoLookup;

    #[test]
    fn test_snapshot_text() {
        let ctx = GatewayContext::new(&ServerConfig::default(), Arc::new(EchoLookup));
        ctx.counters.record_received();
        ctx.counters.record_received();
        ctx.counters.record_processed();

        let text = ctx.snapshot().to_string();
        assert_eq!(
            text,
            "Current connection count: 0\n\
             Current request rate: 2/s\n\
             Processed request count: 2\n\
             Remaining jobs: 1\n"
        );
    }

    #[test]
    fn test_rate_unit_follows_refill_interval() {
        let config = ServerConfig {
            refill_interval_ms: 500,
            ..ServerConfig::default()
        };
        let ctx = GatewayContext::new(&config, Arc::new(EchoLookup));
        ctx.counters.record_received();

        let text = ctx.snapshot().to_string();
        assert!(text.contains("Current request rate: 1/500ms\n"));

        let config = ServerConfig {
            refill_interval_ms: 5000,
            ..ServerConfig::default()
        };
        let ctx = GatewayContext::new(&config, Arc::new(EchoLookup));
        assert_eq!(ctx.snapshot().rate_unit(), "5s");
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let ctx = GatewayContext::new(&ServerConfig::default(), Arc::new(EchoLookup));
        let a = ctx.next_connection_id();
        let b = ctx.next_connection_id();
        assert_ne!(a, b);
    }
}
