//
// 教案级说明：Loom 模型检查需要接管原子类型以枚举调度交错，因此在 `--cfg loom` 下
// 切换到 `loom::sync::atomic`；常规构建沿用 `core` 原子类型。
#[cfg(not(any(loom, spark_loom)))]
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
#[cfg(any(loom, spark_loom))]
use loom::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// 头部对象池的统计快照。
///
/// # 契约说明（What）
/// - `generation`：当前安装代次，每次 `install` 递增，0 表示从未安装；
/// - `installed`：快照时刻是否有工厂处于安装状态；
/// - `idle`：空闲集合中的实例数；
/// - `checked_out`：已借出且尚未归还（或脱离）的实例数；
/// - `created` / `reused`：工厂构造与空闲集合复用的累计次数（预热计入 `created`）；
/// - `discarded`：因池已卸载或代次不符而被丢弃的累计实例数（含被并发卸载作废的预热批次）。
///
/// 各字段分别读取，并发场景下快照只保证单字段一致。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolStats {
    pub generation: u64,
    pub installed: bool,
    pub idle: usize,
    pub checked_out: usize,
    pub created: u64,
    pub reused: u64,
    pub discarded: u64,
}

pub(super) struct PoolMetrics {
    created: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
    checked_out: AtomicUsize,
}

impl PoolMetrics {
    pub(super) fn new() -> Self {
        Self {
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            checked_out: AtomicUsize::new(0),
        }
    }

    pub(super) fn record_created(&self, count: u64) {
        self.created.fetch_add(count, Ordering::Relaxed);
    }

    pub(super) fn record_checkout(&self, reused: bool) {
        if reused {
            self.reused.fetch_add(1, Ordering::Relaxed);
        }
        self.checked_out.fetch_add(1, Ordering::Relaxed);
    }

    /// 每次借出都先于句柄创建记账，计数归零后仍有归还只可能是记账缺陷。
    pub(super) fn record_return(&self) {
        let prev = self.checked_out.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "PoolMetrics::record_return: checked_out underflow");
    }

    pub(super) fn record_discard(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub(super) fn snapshot(&self, generation: u64, installed: bool, idle: usize) -> PoolStats {
        PoolStats {
            generation,
            installed,
            idle,
            checked_out: self.checked_out.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}
