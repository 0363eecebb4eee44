//! Per-bill async mutex
//!
//! 同一账单上的状态更新、加菜、结账串行执行，保证聚合重算与事件推导
//! 在一个进程内最多只有一个在途。跨进程的一致性由存储层 compare-and-set 保证。

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct BillLocks {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

/// Held for the duration of one bill mutation
pub struct BillGuard {
    bill_id: i64,
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl BillLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, bill_id: i64) -> BillGuard {
        let mutex = self
            .locks
            .entry(bill_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        BillGuard {
            bill_id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Number of bills with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for BillGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // map 内一份 + 无其他等待者时移除条目
        self.locks
            .remove_if(&self.bill_id, |_, m| Arc::strong_count(m) == 1);
    }
}
