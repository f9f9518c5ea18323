//! 缓冲区目录
//!
//! 块号 → 缓冲区的哈希索引，加上两条按最近使用排序的链表：
//! 干净链表（既不脏也不在写回）和脏链表（脏或写回中）。
//! 链表用 `lru::LruCache<u64, ()>` 表示，只记录块号的先后顺序，
//! 缓冲区本身由索引持有。
//!
//! 目录只在缓存引擎锁内访问，自身不做同步。

use super::buffer::{Buffer, BufferState};
use crate::error::{Error, ErrorKind, Result};
use lru::LruCache;
use std::collections::HashMap;
use std::sync::Arc;

/// 最近使用链表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LruList {
    /// 干净链表
    Clean,
    /// 脏链表（含写回中）
    Dirty,
}

impl LruList {
    /// 按缓冲区当前状态决定所属链表
    pub(crate) fn of(buffer: &Buffer) -> Self {
        if buffer.test(BufferState::DIRTY | BufferState::WRITING) {
            Self::Dirty
        } else {
            Self::Clean
        }
    }
}

/// 缓冲区目录
pub(crate) struct Directory {
    /// 块号索引
    index: HashMap<u64, Arc<Buffer>>,
    /// 干净链表
    clean: LruCache<u64, ()>,
    /// 脏链表
    dirty: LruCache<u64, ()>,
}

impl Directory {
    pub(crate) fn new() -> Self {
        Self {
            index: HashMap::new(),
            clean: LruCache::unbounded(),
            dirty: LruCache::unbounded(),
        }
    }

    fn list_mut(&mut self, list: LruList) -> &mut LruCache<u64, ()> {
        match list {
            LruList::Clean => &mut self.clean,
            LruList::Dirty => &mut self.dirty,
        }
    }

    /// 以缓冲区当前块号建立索引，并插入指定链表的头部
    pub(crate) fn link(&mut self, buffer: Arc<Buffer>, list: LruList) -> Result<()> {
        let block = buffer.block();
        if self.index.contains_key(&block) {
            log::error!("[BUFIO] block {:#x} is already cached", block);
            return Err(Error::new(ErrorKind::InvalidState, "block already has a buffer"));
        }
        self.index.insert(block, buffer);
        self.list_mut(list).put(block, ());
        Ok(())
    }

    /// 从索引和所在链表中移除
    pub(crate) fn unlink(&mut self, buffer: &Arc<Buffer>) -> Result<()> {
        let block = buffer.block();
        if !self.is_linked(buffer) {
            log::error!(
                "[BUFIO] unlink of buffer {} not cached at block {:#x}",
                buffer.id(),
                block
            );
            return Err(Error::new(ErrorKind::InvalidState, "buffer is not in the directory"));
        }
        self.index.remove(&block);
        self.clean.pop(&block);
        self.dirty.pop(&block);
        Ok(())
    }

    /// 移到指定链表的头部（最近使用）
    pub(crate) fn relink(&mut self, buffer: &Arc<Buffer>, list: LruList) {
        if !self.is_linked(buffer) {
            return;
        }
        let block = buffer.block();
        let (from, to) = match list {
            LruList::Clean => (&mut self.dirty, &mut self.clean),
            LruList::Dirty => (&mut self.clean, &mut self.dirty),
        };
        from.pop(&block);
        // 已在目标链表时 put 只更新位置
        to.put(block, ());
    }

    /// 查找块对应的缓冲区
    pub(crate) fn find(&self, block: u64) -> Option<&Arc<Buffer>> {
        self.index.get(&block)
    }

    /// 缓冲区是否仍以其当前块号在目录中
    pub(crate) fn is_linked(&self, buffer: &Arc<Buffer>) -> bool {
        self.index
            .get(&buffer.block())
            .map_or(false, |b| Arc::ptr_eq(b, buffer))
    }

    /// 按最久未使用在前的顺序列出链表中的缓冲区
    pub(crate) fn lru_snapshot(&self, list: LruList) -> Vec<Arc<Buffer>> {
        let lru = match list {
            LruList::Clean => &self.clean,
            LruList::Dirty => &self.dirty,
        };
        lru.iter()
            .rev()
            .filter_map(|(block, _)| self.index.get(block).cloned())
            .collect()
    }

    /// 已索引的缓冲区数
    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 链表长度
    pub(crate) fn count(&self, list: LruList) -> usize {
        match list {
            LruList::Clean => self.clean.len(),
            LruList::Dirty => self.dirty.len(),
        }
    }
}

impl core::fmt::Debug for Directory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Directory")
            .field("buffers", &self.index.len())
            .field("clean", &self.clean.len())
            .field("dirty", &self.dirty.len())
            .finish()
    }
}
