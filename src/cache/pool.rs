//! 缓冲区内存池
//!
//! 负责分配缓冲区背后的定长内存。分配策略只由块大小和是否为预留缓冲区决定：
//!
//! | 策略 | 适用场景 | 失败行为 |
//! |------|----------|----------|
//! | [`StorageKind::Compact`] | 块大小 ≤ 一页 | 可能失败（预留缓冲区除外）|
//! | [`StorageKind::PageRun`] | 块大小 > 一页 | 可能失败，调用者改为回收 |
//! | [`StorageKind::Guaranteed`] | 预留缓冲区且块大小 > 一页 | 不会失败 |
//!
//! 普通分配从不阻塞也不重试，失败时由缓存引擎走预留缓冲区 / 回收 / 等待路径。

use super::buffer::{Buffer, BufferId};
use crate::consts::PAGE_SIZE;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 存储分配策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// 小块：通用分配器
    Compact,
    /// 大块：连续页分配，允许失败
    PageRun,
    /// 大块：按页组织的保底分配，仅用于预留缓冲区
    Guaranteed,
}

/// 缓冲区数据存储
///
/// 记录分配方式，I/O 适配器据此选择直接传输或按页分散传输
pub enum BufferStorage {
    /// 通用分配器分配的小块
    Compact(Box<[u8]>),
    /// 连续页
    PageRun(Box<[u8]>),
    /// 保底分配（页之间不保证物理连续）
    Guaranteed(Box<[u8]>),
}

impl BufferStorage {
    /// 分配策略
    pub fn kind(&self) -> StorageKind {
        match self {
            Self::Compact(_) => StorageKind::Compact,
            Self::PageRun(_) => StorageKind::PageRun,
            Self::Guaranteed(_) => StorageKind::Guaranteed,
        }
    }

    /// 数据（只读）
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Compact(data) | Self::PageRun(data) | Self::Guaranteed(data) => data,
        }
    }

    /// 数据（可写）
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Self::Compact(data) | Self::PageRun(data) | Self::Guaranteed(data) => data,
        }
    }

    /// 数据长度
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// 是否可以当作单段连续内存传输
    pub fn is_contiguous(&self) -> bool {
        !matches!(self, Self::Guaranteed(_))
    }
}

impl core::fmt::Debug for BufferStorage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferStorage")
            .field("kind", &self.kind())
            .field("len", &self.len())
            .finish()
    }
}

/// 选择分配策略
pub fn select_storage(block_size: usize, reserved: bool) -> StorageKind {
    if block_size <= PAGE_SIZE {
        StorageKind::Compact
    } else if reserved {
        StorageKind::Guaranteed
    } else {
        StorageKind::PageRun
    }
}

/// 不重试的分配，内存不足时返回 `None`
fn try_alloc_zeroed(len: usize) -> Option<Box<[u8]>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len).ok()?;
    data.resize(len, 0);
    Some(data.into_boxed_slice())
}

/// 缓冲区内存池
#[derive(Debug)]
pub(crate) struct BufferPool {
    /// 块大小
    block_size: usize,
    /// 下一个缓冲区 ID
    next_id: AtomicU64,
}

impl BufferPool {
    pub(crate) fn new(block_size: usize) -> Self {
        Self {
            block_size,
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> BufferId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// 尽力分配一个缓冲区（不阻塞、不重试、不动用保底）
    pub(crate) fn try_alloc(&self) -> Option<Arc<Buffer>> {
        let data = try_alloc_zeroed(self.block_size)?;
        let storage = match select_storage(self.block_size, false) {
            StorageKind::Compact => BufferStorage::Compact(data),
            _ => BufferStorage::PageRun(data),
        };
        Some(Arc::new(Buffer::new(self.next_id(), storage)))
    }

    /// 分配预留缓冲区，不会失败
    pub(crate) fn alloc_reserved(&self) -> Arc<Buffer> {
        let data = vec![0u8; self.block_size].into_boxed_slice();
        let storage = match select_storage(self.block_size, true) {
            StorageKind::Compact => BufferStorage::Compact(data),
            _ => BufferStorage::Guaranteed(data),
        };
        Arc::new(Buffer::new(self.next_id(), storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_storage() {
        assert_eq!(select_storage(512, false), StorageKind::Compact);
        assert_eq!(select_storage(PAGE_SIZE, false), StorageKind::Compact);
        assert_eq!(select_storage(PAGE_SIZE, true), StorageKind::Compact);
        assert_eq!(select_storage(PAGE_SIZE * 2, false), StorageKind::PageRun);
        assert_eq!(select_storage(PAGE_SIZE * 2, true), StorageKind::Guaranteed);
    }

    #[test]
    fn test_try_alloc_small() {
        let pool = BufferPool::new(1024);
        let buf = pool.try_alloc().unwrap();
        let storage = buf.storage();
        assert_eq!(storage.kind(), StorageKind::Compact);
        assert_eq!(storage.len(), 1024);
        assert!(storage.as_slice().iter().all(|&b| b == 0));
        assert!(storage.is_contiguous());
    }

    #[test]
    fn test_large_alloc_modes() {
        let pool = BufferPool::new(PAGE_SIZE * 4);

        let normal = pool.try_alloc().unwrap();
        assert_eq!(normal.storage().kind(), StorageKind::PageRun);

        let reserved = pool.alloc_reserved();
        assert_eq!(reserved.storage().kind(), StorageKind::Guaranteed);
        assert!(!reserved.storage().is_contiguous());
        assert_eq!(reserved.storage().len(), PAGE_SIZE * 4);
    }

    #[test]
    fn test_unique_ids() {
        let pool = BufferPool::new(512);
        let a = pool.try_alloc().unwrap();
        let b = pool.alloc_reserved();
        assert_ne!(a.id(), b.id());
    }
}
