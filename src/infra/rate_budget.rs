//! 外部调用令牌预算
//!
//! 每个周期把可用令牌补满到容量 C（不累积、不超过 C），周期内所有连接共享并争抢同一份额度。
//! 获取是非阻塞的：没有令牌时立即失败，调用方直接跳过外部调用。

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// 外部调用令牌预算（补满式，非漏桶）
#[derive(Debug)]
pub struct RateBudget {
    capacity: u32,
    available: AtomicU32,
    /// 成功获取的累计次数
    granted: AtomicU64,
    /// 获取失败（被跳过）的累计次数
    skipped: AtomicU64,
}

impl RateBudget {
    /// 创建预算，初始即为满额
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            available: AtomicU32::new(capacity),
            granted: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    /// 尝试获取一个令牌（非阻塞）。
    /// 可用数 > 0 时减一并返回 true，否则立即返回 false。
    pub fn try_acquire(&self) -> bool {
        let acquired = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();

        if acquired {
            self.granted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
        }
        acquired
    }

    /// 补满到容量，返回本次补充的令牌数（已满时为 0）
    pub fn refill(&self) -> u32 {
        let previous = self.available.swap(self.capacity, Ordering::AcqRel);
        self.capacity - previous.min(self.capacity)
    }

    /// 当前可用令牌数
    pub fn available(&self) -> u32 {
        self.available.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// 累计成功获取次数
    pub fn granted_total(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }

    /// 累计因预算耗尽而跳过的次数
    pub fn skipped_total(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}
