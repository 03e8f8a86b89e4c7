//! 请求计数器：累计接收数、周期速率、累计处理数
//!
//! 所有写操作都是单条原子指令，不持锁。`rate` 的周期清零使用 `swap(0)`，
//! 与并发中的自增存在竞争：恰好落在清零前的自增会被清掉，落在清零后的计入新周期。
//! 这是近似速率信号，不做精确记账。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// 进程级请求计数器
#[derive(Debug)]
pub struct MetricsCounters {
    received: AtomicU64,
    rate: AtomicU64,
    processed: AtomicU64,
    started_at: DateTime<Utc>,
}

/// 计数器只读快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub received: u64,
    pub rate: u64,
    pub processed: u64,
}

impl CountersSnapshot {
    /// 已接收但尚未处理完的行数
    pub fn backlog(&self) -> u64 {
        self.received.saturating_sub(self.processed)
    }
}

impl Default for MetricsCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCounters {
    pub fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            rate: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    /// 读到一行：累计接收数和周期速率各加一
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::SeqCst);
        self.rate.fetch_add(1, Ordering::Relaxed);
    }

    /// 一行处理完成（无论是否调用了外部服务）
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// 周期速率清零，返回清零前的值
    pub fn reset_rate(&self) -> u64 {
        self.rate.swap(0, Ordering::Relaxed)
    }

    /// 读取快照。
    ///
    /// 先读 `processed` 再读 `received`：同一行的 received 自增总是先于 processed，
    /// 因此快照中 `processed <= received` 恒成立。
    pub fn snapshot(&self) -> CountersSnapshot {
        let processed = self.processed.load(Ordering::SeqCst);
        let received = self.received.load(Ordering::SeqCst);
        let rate = self.rate.load(Ordering::Relaxed);
        CountersSnapshot {
            received,
            rate,
            processed,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 运行时长（秒）
    pub fn uptime_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}
