//! 缓存统计

use std::sync::atomic::{AtomicU64, Ordering};

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 命中次数（请求的块已在缓存中）
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 提交的后端读取次数
    pub reads: u64,
    /// 提交的后端写回次数
    pub writes: u64,
    /// 驱逐次数
    pub evictions: u64,
    /// 刷新屏障次数
    pub flushes: u64,
    /// 当前缓冲区数
    pub buffers: usize,
    /// 当前脏链表长度
    pub dirty_buffers: usize,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 引擎内部计数器，不需要持锁即可更新
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) reads: AtomicU64,
    pub(crate) writes: AtomicU64,
    pub(crate) evictions: AtomicU64,
    pub(crate) flushes: AtomicU64,
}

impl Counters {
    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, buffers: usize, dirty_buffers: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            buffers,
            dirty_buffers,
        }
    }
}
