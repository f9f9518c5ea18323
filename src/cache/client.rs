//! 缓存引擎
//!
//! [`BufioClient`] 是缓存的公开入口：一个客户端对应一个打开的设备，持有目录、
//! 两条最近使用链表、活跃缓冲区计数、水位线和一个预留缓冲区。
//!
//! # 锁
//!
//! 引擎锁（`inner`）保护目录、链表、计数和预留槽。等待单个缓冲区的
//! READING / WRITING 位时总是先释放引擎锁（`MutexGuard::unlocked`），
//! 因此一个块上的 I/O 不会阻塞其他块上的操作。I/O 完成回调只修改
//! 缓冲区自身的状态，从不获取引擎锁。
//!
//! # 使用约束
//!
//! - 同一线程同一时刻最多持有一个缓冲区。分配可能要等待其他线程释放
//!   缓冲区，持有 A 时去获取 B 会与反向操作的线程形成循环等待。
//! - 调用写回类操作前必须先丢弃 `data()` / `data_mut()` 返回的守卫，
//!   否则 I/O 线程无法访问数据。

use super::buffer::{Buffer, BufferState};
use super::config::BufioConfig;
use super::directory::{Directory, LruList};
use super::handle::BufferHandle;
use super::pool::BufferPool;
use super::stats::{CacheStats, Counters};
use crate::block::io::{BlockIo, Rw};
use crate::block::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::Arc;

/// 缓冲区获取方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NewMode {
    /// 只返回已缓存的缓冲区
    Get,
    /// 未命中时从设备读取
    Read,
    /// 未命中时不读取，调用者会覆盖整个块
    Fresh,
}

/// 引擎锁保护的状态
struct Inner {
    /// 目录与链表
    dir: Directory,
    /// 预留缓冲区
    reserved: Option<Arc<Buffer>>,
    /// 预留槽之外的缓冲区数（已索引的加上正在转交的）
    live: usize,
}

/// 缓冲块 I/O 客户端
///
/// # 示例
///
/// ```rust,ignore
/// use bufio_core::{BufioClient, BufioConfig, RamDevice};
///
/// let client = BufioClient::new(RamDevice::new(512, 2048), BufioConfig::new(4096))?;
///
/// let mut buf = client.new_buffer(0)?;
/// buf.with_data_mut(|data| data.fill(0xAA));
/// buf.mark_dirty();
/// buf.release();
///
/// client.write_dirty_buffers()?;
/// ```
pub struct BufioClient<D: BlockDevice> {
    /// 后端 I/O
    io: BlockIo<D>,
    /// 创建时的配置
    config: BufioConfig,
    /// 软上限（缓冲区个数）
    threshold_buffers: usize,
    /// 硬上限（缓冲区个数）
    limit_buffers: usize,
    /// 内存池
    pool: BufferPool,
    /// 引擎锁
    inner: Mutex<Inner>,
    /// 有缓冲区被释放或放回时通知
    free_buffer_wait: Condvar,
    /// 异步写回的第一个错误，由 `write_dirty_buffers` 取走
    async_write_error: Arc<Mutex<Option<Error>>>,
    /// 统计计数
    counters: Counters,
    /// 已通过 `close` 拆除
    closed: bool,
}

impl<D: BlockDevice> BufioClient<D> {
    /// 在设备上创建缓存客户端
    pub fn new(device: D, config: BufioConfig) -> Result<Self> {
        config.validate(device.sector_size())?;

        let pool = BufferPool::new(config.block_size);
        let reserved = pool.alloc_reserved();
        let io = BlockIo::new(device, config.block_size, config.io_threads)?;
        let threshold_buffers = config.threshold_buffers();
        let limit_buffers = config.limit_buffers();

        log::info!(
            "[BUFIO] client created: block_size={}, blocks={}, threshold={}, limit={}, io_threads={}",
            config.block_size,
            io.device_blocks(),
            threshold_buffers,
            limit_buffers,
            io.threads()
        );

        Ok(Self {
            io,
            config,
            threshold_buffers,
            limit_buffers,
            pool,
            inner: Mutex::new(Inner {
                dir: Directory::new(),
                reserved: Some(reserved),
                live: 0,
            }),
            free_buffer_wait: Condvar::new(),
            async_write_error: Arc::new(Mutex::new(None)),
            counters: Counters::default(),
            closed: false,
        })
    }

    //=========================================================================
    // 获取与释放
    //=========================================================================

    /// 读取块
    ///
    /// 命中时等待进行中的读取完成；未命中时分配缓冲区并从设备读取。
    /// 同一块的并发请求只会产生一次设备读取。读取失败时返回设备错误，
    /// 失败的缓冲区在最后一个持有者释放时被驱逐。
    pub fn read(&self, block: u64) -> Result<BufferHandle<'_, D>> {
        let buffer = self.bufio_new(block, NewMode::Read)?.ok_or(Error::new(
            ErrorKind::InvalidState,
            "read returned no buffer",
        ))?;
        Ok(BufferHandle::new(self, buffer))
    }

    /// 获取块但不读取设备
    ///
    /// 调用者应当覆盖整个块并随后标记为脏
    pub fn new_buffer(&self, block: u64) -> Result<BufferHandle<'_, D>> {
        let buffer = self.bufio_new(block, NewMode::Fresh)?.ok_or(Error::new(
            ErrorKind::InvalidState,
            "new returned no buffer",
        ))?;
        Ok(BufferHandle::new(self, buffer))
    }

    /// 只在块已缓存时返回缓冲区，不分配也不发起 I/O
    pub fn get(&self, block: u64) -> Result<Option<BufferHandle<'_, D>>> {
        Ok(self
            .bufio_new(block, NewMode::Get)?
            .map(|buffer| BufferHandle::new(self, buffer)))
    }

    fn check_block(&self, block: u64) -> Result<()> {
        if block >= self.io.device_blocks() {
            return Err(Error::new(ErrorKind::InvalidInput, "block beyond end of device"));
        }
        Ok(())
    }

    fn bufio_new(&self, block: u64, mode: NewMode) -> Result<Option<Arc<Buffer>>> {
        self.check_block(block)?;

        let mut g = self.inner.lock();
        let (buffer, fresh) = loop {
            if let Some(b) = g.dir.find(block).cloned() {
                b.get();
                g.dir.relink(&b, LruList::of(&b));
                break (b, false);
            }
            if mode == NewMode::Get {
                return Ok(None);
            }

            let b = self.alloc_buffer_wait(&mut g)?;
            self.check_watermark(&mut g);

            // 分配期间释放过锁，其他线程可能已经缓存了这个块
            if g.dir.find(block).is_some() {
                self.free_buffer_wake(&mut g, b);
                continue;
            }

            b.reset(block);
            b.get();
            if mode == NewMode::Read {
                b.set(BufferState::READING);
            }
            if let Err(e) = g.dir.link(Arc::clone(&b), LruList::Clean) {
                self.free_buffer_wake(&mut g, b);
                return Err(e);
            }
            break (b, true);
        };
        drop(g);

        if fresh {
            Counters::inc(&self.counters.misses);
            log::debug!("[BUFIO] block {:#x} miss ({:?})", block, mode);
            if mode == NewMode::Read {
                Counters::inc(&self.counters.reads);
                let done = Arc::clone(&buffer);
                self.io.submit(
                    Rw::Read,
                    block,
                    Arc::clone(&buffer),
                    Box::new(move |res| done.end_read(res)),
                );
            }
        } else {
            Counters::inc(&self.counters.hits);
            log::trace!("[BUFIO] block {:#x} hit", block);
        }

        buffer.wait_clear(BufferState::READING);

        if let Some(err) = buffer.read_error() {
            self.release_buffer(&buffer);
            return Err(err);
        }
        Ok(Some(buffer))
    }

    /// 释放一次持有
    ///
    /// 持有计数归零且缓冲区带有粘滞错误、没有待写数据时立即驱逐
    pub(crate) fn release_buffer(&self, buffer: &Arc<Buffer>) {
        let mut g = self.inner.lock();
        let remaining = match buffer.put() {
            Ok(n) => n,
            Err(e) => {
                log::error!("[BUFIO] buffer {}: {}", buffer.id(), e);
                return;
            }
        };
        if remaining > 0 {
            return;
        }

        self.free_buffer_wait.notify_all();
        let busy = BufferState::READING | BufferState::WRITING | BufferState::DIRTY;
        if buffer.has_error() && !buffer.test(busy) && g.dir.is_linked(buffer) {
            if g.dir.unlink(buffer).is_ok() {
                log::debug!(
                    "[BUFIO] evicting block {:#x} after I/O error",
                    buffer.block()
                );
                Counters::inc(&self.counters.evictions);
                self.free_buffer_wake(&mut g, Arc::clone(buffer));
            }
        }
    }

    /// 标记为脏（幂等）
    pub(crate) fn mark_buffer_dirty(&self, buffer: &Arc<Buffer>) {
        let mut g = self.inner.lock();
        if !buffer.test_and_set(BufferState::DIRTY) {
            g.dir.relink(buffer, LruList::Dirty);
            log::trace!("[BUFIO] block {:#x} dirty", buffer.block());
        }
    }

    //=========================================================================
    // 分配与回收
    //=========================================================================

    /// 获取一个空闲缓冲区，必要时回收或等待
    fn alloc_buffer_wait(&self, g: &mut MutexGuard<'_, Inner>) -> Result<Arc<Buffer>> {
        loop {
            if g.live < self.limit_buffers {
                if let Some(b) = self.pool.try_alloc() {
                    g.live += 1;
                    return Ok(b);
                }
                log::debug!("[BUFIO] buffer allocation failed, falling back");
            }

            if let Some(b) = g.reserved.take() {
                log::debug!("[BUFIO] using reserved buffer {}", b.id());
                g.live += 1;
                return Ok(b);
            }

            if let Some(b) = self.get_unclaimed_buffer(g, true) {
                return Ok(b);
            }

            match Self::unheld_state(g) {
                Some(true) => {
                    if let Some(e) = self.async_write_error.lock().as_ref() {
                        log::warn!("[BUFIO] no reclaimable buffer, last write-back failed: {}", e);
                    }
                    return Err(Error::new(
                        ErrorKind::NoMemory,
                        "no reclaimable buffer: write-back failed",
                    ));
                }
                // 扫描期间状态变化，重新扫描
                Some(false) => continue,
                None => {}
            }

            log::debug!("[BUFIO] waiting for a free buffer ({} live)", g.live);
            self.free_buffer_wait.wait(g);
        }
    }

    /// 所有活跃缓冲区都已索引且没有持有者时，返回其中是否有写回失败的缓冲区
    ///
    /// 返回 `None` 表示还有缓冲区被持有或正在转交，之后的释放会唤醒等待者。
    /// `Some(true)` 时回收已无法继续：只剩写回失败后重新变脏的缓冲区。
    fn unheld_state(g: &MutexGuard<'_, Inner>) -> Option<bool> {
        if g.dir.len() < g.live {
            return None;
        }
        let mut failed = false;
        for b in [LruList::Clean, LruList::Dirty]
            .into_iter()
            .flat_map(|list| g.dir.lru_snapshot(list))
        {
            if b.hold_count() > 0 {
                return None;
            }
            failed |= b.write_error().is_some();
        }
        Some(failed)
    }

    /// 放回缓冲区：补充空的预留槽，否则释放内存；随后唤醒等待分配的线程
    fn free_buffer_wake(&self, g: &mut MutexGuard<'_, Inner>, buffer: Arc<Buffer>) {
        g.live = g.live.saturating_sub(1);
        if g.reserved.is_none() {
            buffer.reset(0);
            g.reserved = Some(buffer);
        }
        self.free_buffer_wait.notify_all();
    }

    /// 活跃缓冲区超过软上限时回收未被持有的缓冲区
    fn check_watermark(&self, g: &mut MutexGuard<'_, Inner>) {
        while g.live > self.threshold_buffers {
            match self.get_unclaimed_buffer(g, true) {
                Some(b) => self.free_buffer_wake(g, b),
                None => break,
            }
        }
    }

    /// 找一个未被持有的缓冲区，使其干净后从目录中摘下
    ///
    /// 先按最久未使用顺序扫描干净链表，再扫描脏链表。`wait` 为 false 时
    /// 不等待任何 I/O：跳过读取中的缓冲区，对脏缓冲区只发起写回。
    fn get_unclaimed_buffer(
        &self,
        g: &mut MutexGuard<'_, Inner>,
        wait: bool,
    ) -> Option<Arc<Buffer>> {
        let mut skipped = HashSet::new();

        'rescan: loop {
            for b in g.dir.lru_snapshot(LruList::Clean) {
                if skipped.contains(&b.id()) || b.hold_count() > 0 {
                    continue;
                }
                if !wait && b.test(BufferState::READING) {
                    continue;
                }
                if self.try_claim(g, &b) {
                    return Some(b);
                }
                skipped.insert(b.id());
                continue 'rescan;
            }

            for b in g.dir.lru_snapshot(LruList::Dirty) {
                if skipped.contains(&b.id()) || b.hold_count() > 0 || !g.dir.is_linked(&b) {
                    continue;
                }
                if !wait {
                    let state = b.state();
                    if state.contains(BufferState::DIRTY) && !state.contains(BufferState::WRITING) {
                        self.write_dirty_buffer(g, &b);
                        skipped.insert(b.id());
                        continue;
                    }
                    if !state.is_empty() {
                        continue;
                    }
                }
                if self.try_claim(g, &b) {
                    return Some(b);
                }
                skipped.insert(b.id());
                continue 'rescan;
            }

            return None;
        }
    }

    /// 使缓冲区干净并在条件仍满足时摘下
    fn try_claim(&self, g: &mut MutexGuard<'_, Inner>, buffer: &Arc<Buffer>) -> bool {
        self.make_buffer_clean(g, buffer);
        if !g.dir.is_linked(buffer) || buffer.hold_count() > 0 || !buffer.is_idle() {
            return false;
        }
        if g.dir.unlink(buffer).is_err() {
            return false;
        }
        Counters::inc(&self.counters.evictions);
        log::debug!(
            "[BUFIO] reclaimed buffer {} (block {:#x})",
            buffer.id(),
            buffer.block()
        );
        true
    }

    /// 等待读取完成，写回脏数据并等待写回完成
    fn make_buffer_clean(&self, g: &mut MutexGuard<'_, Inner>, buffer: &Arc<Buffer>) {
        if buffer.is_idle() {
            return;
        }
        MutexGuard::unlocked(g, || buffer.wait_clear(BufferState::READING));
        self.write_dirty_buffer(g, buffer);
        MutexGuard::unlocked(g, || buffer.wait_clear(BufferState::WRITING));
    }

    //=========================================================================
    // 写回
    //=========================================================================

    /// 缓冲区为脏时提交写回（不等待完成）
    fn write_dirty_buffer(&self, g: &mut MutexGuard<'_, Inner>, buffer: &Arc<Buffer>) {
        if !buffer.test(BufferState::DIRTY) {
            return;
        }
        if MutexGuard::unlocked(g, || buffer.begin_write()) {
            self.submit_write(buffer);
        }
    }

    /// 把缓冲区写到它当前的块，调用前必须已经置 WRITING
    fn submit_write(&self, buffer: &Arc<Buffer>) {
        Counters::inc(&self.counters.writes);
        let done = Arc::clone(buffer);
        let first_error = Arc::clone(&self.async_write_error);
        self.io.submit(
            Rw::Write,
            buffer.block(),
            Arc::clone(buffer),
            Box::new(move |res| {
                if let Err(e) = &res {
                    first_error.lock().get_or_insert_with(|| e.clone());
                }
                done.end_write(&res);
            }),
        );
    }

    /// 为脏链表上的所有脏缓冲区提交写回，不等待完成
    pub fn write_dirty_buffers_async(&self) {
        let mut g = self.inner.lock();
        self.write_dirty_buffers_async_locked(&mut g);
    }

    fn write_dirty_buffers_async_locked(&self, g: &mut MutexGuard<'_, Inner>) {
        let dirty = g.dir.lru_snapshot(LruList::Dirty);
        log::debug!("[BUFIO] writing back {} buffers", dirty.len());
        for b in dirty {
            if !g.dir.is_linked(&b) {
                continue;
            }
            if !b.test(BufferState::DIRTY | BufferState::WRITING) {
                g.dir.relink(&b, LruList::Clean);
                continue;
            }
            self.write_dirty_buffer(g, &b);
        }
    }

    /// 写回所有脏缓冲区并等待完成，然后发送刷新屏障
    ///
    /// 调用开始前已经变脏的数据在返回时都已提交到设备。返回第一个异步写回
    /// 错误，没有时返回刷新屏障的结果。写回失败的缓冲区保留在缓存中并保持
    /// 为脏，再次调用会重试。
    pub fn write_dirty_buffers(&self) -> Result<()> {
        let mut g = self.inner.lock();
        self.write_dirty_buffers_async_locked(&mut g);

        for b in g.dir.lru_snapshot(LruList::Dirty) {
            if !g.dir.is_linked(&b) {
                continue;
            }
            if b.test(BufferState::WRITING) {
                // 持有期间不会被回收
                b.get();
                MutexGuard::unlocked(&mut g, || b.wait_clear(BufferState::WRITING));
                if let Err(e) = b.put() {
                    log::error!("[BUFIO] buffer {}: {}", b.id(), e);
                }
            }
            if g.dir.is_linked(&b) && !b.test(BufferState::DIRTY | BufferState::WRITING) {
                g.dir.relink(&b, LruList::Clean);
            }
        }
        self.free_buffer_wait.notify_all();
        drop(g);

        let write_error = self.async_write_error.lock().take();
        let flushed = self.issue_flush();
        match write_error {
            Some(e) => {
                log::warn!("[BUFIO] write-back failed: {}", e);
                Err(e)
            }
            None => flushed,
        }
    }

    /// 发送刷新屏障，要求设备把易失缓存落盘
    pub fn issue_flush(&self) -> Result<()> {
        Counters::inc(&self.counters.flushes);
        self.io.flush()
    }

    //=========================================================================
    // 搬移
    //=========================================================================

    /// 把持有的缓冲区搬到新块号
    ///
    /// 新块上已有的缓冲区先被驱逐。只有调用者持有时，脏数据先写回旧位置，
    /// 然后缓冲区改挂到新块号下并标记为脏，旧位置写回失败时搬移照常完成并
    /// 返回该错误；还有其他持有者时，缓冲区留在旧块号（同样先写回旧位置的
    /// 脏数据），并把内容同步写到新块。
    pub(crate) fn move_buffer(&self, buffer: &Arc<Buffer>, new_block: u64) -> Result<()> {
        self.check_block(new_block)?;

        let mut g = self.inner.lock();
        let mut flushed_old = false;
        loop {
            if let Some(other) = g.dir.find(new_block).cloned() {
                if Arc::ptr_eq(&other, buffer) {
                    return Ok(());
                }
                if other.hold_count() > 0 {
                    log::debug!("[BUFIO] move target {:#x} is held, waiting", new_block);
                    self.free_buffer_wait.wait(&mut g);
                    continue;
                }
                self.make_buffer_clean(&mut g, &other);
                if g.dir.is_linked(&other) && other.hold_count() == 0 && other.is_idle() {
                    g.dir.unlink(&other)?;
                    Counters::inc(&self.counters.evictions);
                    self.free_buffer_wake(&mut g, other);
                }
                continue;
            }

            if buffer.hold_count() == 1 {
                // 先把脏数据落到旧位置，只尝试一次
                if !flushed_old && buffer.test(BufferState::DIRTY | BufferState::WRITING) {
                    flushed_old = true;
                    self.write_dirty_buffer(&mut g, buffer);
                    MutexGuard::unlocked(&mut g, || buffer.wait_clear(BufferState::WRITING));
                    // 锁曾释放，目标块和持有情况都要重新检查
                    continue;
                }
                if buffer.test(BufferState::WRITING) {
                    MutexGuard::unlocked(&mut g, || buffer.wait_clear(BufferState::WRITING));
                    continue;
                }
                let old_block = buffer.block();
                let old_write = buffer.write_error();
                buffer.set(BufferState::DIRTY);
                g.dir.unlink(buffer)?;
                buffer.set_block(new_block);
                g.dir.link(Arc::clone(buffer), LruList::Dirty)?;
                log::debug!(
                    "[BUFIO] moved block {:#x} -> {:#x}",
                    old_block,
                    new_block
                );
                return old_write.map_or(Ok(()), Err);
            }

            // 其他持有者仍在旧块号上使用这个缓冲区
            self.write_dirty_buffer(&mut g, buffer);
            MutexGuard::unlocked(&mut g, || buffer.lock_bit(BufferState::WRITING));

            Counters::inc(&self.counters.writes);
            let (tx, rx) = mpsc::channel();
            let done = Arc::clone(buffer);
            self.io.submit(
                Rw::Write,
                new_block,
                Arc::clone(buffer),
                Box::new(move |res| {
                    done.clear_and_wake(BufferState::WRITING);
                    let _ = tx.send(res);
                }),
            );
            log::debug!(
                "[BUFIO] copying shared block {:#x} -> {:#x}",
                buffer.block(),
                new_block
            );
            return MutexGuard::unlocked(&mut g, || {
                rx.recv()
                    .unwrap_or(Err(Error::new(ErrorKind::Io, "write completion lost")))
            });
        }
    }

    //=========================================================================
    // 拆除
    //=========================================================================

    /// 写回全部脏数据并回收所有未被持有的缓冲区
    ///
    /// 仍被持有的缓冲区会作为泄漏记录到日志并返回 `InvalidState`
    pub fn drop_all(&self) -> Result<()> {
        let written = self.write_dirty_buffers();

        let mut g = self.inner.lock();
        while let Some(b) = self.get_unclaimed_buffer(&mut g, true) {
            self.free_buffer_wake(&mut g, b);
        }

        let leaked = !g.dir.is_empty();
        for list in [LruList::Clean, LruList::Dirty] {
            for b in g.dir.lru_snapshot(list) {
                log::error!(
                    "[BUFIO] leaked buffer {}: block={:#x}, hold_count={}, state={:?}, write_error={:?}",
                    b.id(),
                    b.block(),
                    b.hold_count(),
                    b.state(),
                    b.write_error()
                );
            }
        }
        drop(g);

        // 回收过程中重试写回也可能失败
        let reclaim_error = self.async_write_error.lock().take();
        written?;
        if let Some(e) = reclaim_error {
            return Err(e);
        }
        if leaked {
            return Err(Error::new(ErrorKind::InvalidState, "buffers still cached after drop_all"));
        }
        Ok(())
    }

    /// 非阻塞地回收至多 `max` 个缓冲区，返回回收数
    ///
    /// 脏缓冲区只会被发起写回，等写回完成后才能在之后的调用中回收
    pub fn shrink(&self, max: usize) -> usize {
        let mut g = self.inner.lock();
        let mut freed = 0;
        while freed < max {
            match self.get_unclaimed_buffer(&mut g, false) {
                Some(b) => {
                    self.free_buffer_wake(&mut g, b);
                    freed += 1;
                }
                None => break,
            }
        }
        if freed > 0 {
            log::debug!("[BUFIO] shrink freed {} buffers", freed);
        }
        freed
    }

    /// 拆除客户端，返回拆除过程中的错误
    pub fn close(mut self) -> Result<()> {
        let result = self.drop_all();
        self.closed = true;
        result
    }

    //=========================================================================
    // 查询
    //=========================================================================

    /// 块大小（字节）
    pub fn block_size(&self) -> usize {
        self.io.block_size()
    }

    /// 设备容量（块）
    pub fn device_size(&self) -> u64 {
        self.io.device_blocks()
    }

    /// 使用者标志
    pub fn flags(&self) -> u32 {
        self.config.extra_flags
    }

    /// 软上限（缓冲区个数）
    pub fn threshold_buffers(&self) -> usize {
        self.threshold_buffers
    }

    /// 硬上限（缓冲区个数）
    pub fn limit_buffers(&self) -> usize {
        self.limit_buffers
    }

    /// 活跃缓冲区数（不含预留槽中的缓冲区）
    pub fn buffer_count(&self) -> usize {
        self.inner.lock().live
    }

    /// 干净链表长度
    pub fn clean_count(&self) -> usize {
        self.inner.lock().dir.count(LruList::Clean)
    }

    /// 脏链表长度
    pub fn dirty_count(&self) -> usize {
        self.inner.lock().dir.count(LruList::Dirty)
    }

    /// 预留槽是否有缓冲区
    pub fn has_reserved_buffer(&self) -> bool {
        self.inner.lock().reserved.is_some()
    }

    /// 后端设备
    pub fn device(&self) -> &D {
        self.io.device()
    }

    /// 统计信息
    pub fn stats(&self) -> CacheStats {
        let g = self.inner.lock();
        self.counters.snapshot(g.live, g.dir.count(LruList::Dirty))
    }
}

impl<D: BlockDevice> Drop for BufioClient<D> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.drop_all() {
                log::error!("[BUFIO] teardown failed: {}", e);
            }
        }
        log::info!("[BUFIO] client destroyed");
    }
}

impl<D: BlockDevice> core::fmt::Debug for BufioClient<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let g = self.inner.lock();
        f.debug_struct("BufioClient")
            .field("block_size", &self.config.block_size)
            .field("threshold_buffers", &self.threshold_buffers)
            .field("limit_buffers", &self.limit_buffers)
            .field("live", &g.live)
            .field("directory", &g.dir)
            .field("reserved", &g.reserved.is_some())
            .finish()
    }
}
