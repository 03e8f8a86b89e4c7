//! 连接准入闸门
//!
//! 限制同时处于处理阶段的连接数量。超出容量的连接在传输层照常 accept，
//! 但其 handler 在读取任何数据之前阻塞等待空位，这是入站方向唯一的背压点。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// 准入许可；drop 时释放槽位，保证每条退出路径只释放一次
pub type AdmissionPermit = OwnedSemaphorePermit;

/// 连接准入闸门
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    sem: Arc<Semaphore>,
    capacity: usize,
    /// 因闸门已满而需要排队等待的累计次数
    waited_count: Arc<AtomicU64>,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
            waited_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 获取槽位（阻塞直到有空位）。
    ///
    /// 信号量只在进程内持有且从不 close，因此 acquire 不会失败。
    pub async fn acquire(&self) -> AdmissionPermit {
        if let Ok(permit) = self.sem.clone().try_acquire_owned() {
            return permit;
        }

        self.waited_count.fetch_add(1, Ordering::Relaxed);
        match self.sem.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("admission semaphore is never closed"),
        }
    }

    /// 当前处于处理阶段的连接数
    pub fn active(&self) -> usize {
        self.capacity - self.sem.available_permits()
    }

    /// 剩余可用槽位
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 累计排队等待次数
    pub fn waited_total(&self) -> u64 {
        self.waited_count.load(Ordering::Relaxed)
    }
}
