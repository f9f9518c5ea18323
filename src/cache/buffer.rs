//! 缓冲区结构
//!
//! 一个缓冲区缓存一个块的内容及其元数据。字段按保护方式分为三组：
//!
//! - `block` / `hold_count`：只在缓存引擎锁内修改
//! - `status`（状态位与粘滞错误）：由缓冲区自身的互斥锁保护，I/O 完成回调
//!   只会修改这一组，并通过条件变量唤醒等待者
//! - `storage`：块数据，由读写锁保护，持有者通过句柄访问，I/O 线程在传输期间访问

use super::pool::BufferStorage;
use crate::error::{Error, ErrorKind, Result};
use bitflags::bitflags;
use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// 缓冲区 ID，仅用于诊断
pub type BufferId = u64;

bitflags! {
    /// 缓冲区状态位
    ///
    /// 三个位互相独立，但引擎只会驱动缓冲区经过以下状态：
    /// 空闲（无位）、读取中、脏、写回中（写回中时可以再次变脏）
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferState: u8 {
        /// 正在从设备读取
        const READING = 0x01;
        /// 正在写回设备
        const WRITING = 0x02;
        /// 内容已修改，尚未提交写回
        const DIRTY   = 0x04;
    }
}

#[derive(Debug)]
struct BufferStatus {
    state: BufferState,
    read_error: Option<Error>,
    write_error: Option<Error>,
}

/// 缓冲区
pub(crate) struct Buffer {
    /// 缓冲区 ID
    id: BufferId,
    /// 当前关联的块号
    block: AtomicU64,
    /// 持有计数，> 0 时不能被驱逐或复用
    hold_count: AtomicUsize,
    /// 块数据
    storage: RwLock<BufferStorage>,
    /// 状态位与粘滞错误
    status: Mutex<BufferStatus>,
    /// 状态位清除时通知
    state_changed: Condvar,
}

impl core::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let status = self.status.lock();
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("block", &self.block())
            .field("hold_count", &self.hold_count())
            .field("state", &status.state)
            .field("read_error", &status.read_error)
            .field("write_error", &status.write_error)
            .finish()
    }
}

impl Buffer {
    pub(crate) fn new(id: BufferId, storage: BufferStorage) -> Self {
        Self {
            id,
            block: AtomicU64::new(0),
            hold_count: AtomicUsize::new(0),
            storage: RwLock::new(storage),
            status: Mutex::new(BufferStatus {
                state: BufferState::empty(),
                read_error: None,
                write_error: None,
            }),
            state_changed: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> BufferId {
        self.id
    }

    pub(crate) fn block(&self) -> u64 {
        self.block.load(Ordering::Acquire)
    }

    pub(crate) fn set_block(&self, block: u64) {
        self.block.store(block, Ordering::Release);
    }

    pub(crate) fn hold_count(&self) -> usize {
        self.hold_count.load(Ordering::Acquire)
    }

    /// 增加持有计数，返回新值
    pub(crate) fn get(&self) -> usize {
        self.hold_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// 减少持有计数，返回新值
    pub(crate) fn put(&self) -> Result<usize> {
        self.hold_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|old| old - 1)
            .map_err(|_| Error::new(ErrorKind::InvalidState, "release of a buffer that is not held"))
    }

    /// 数据（只读）
    pub(crate) fn storage(&self) -> RwLockReadGuard<'_, BufferStorage> {
        self.storage.read()
    }

    /// 数据（可写）
    pub(crate) fn storage_mut(&self) -> RwLockWriteGuard<'_, BufferStorage> {
        self.storage.write()
    }

    pub(crate) fn state(&self) -> BufferState {
        self.status.lock().state
    }

    /// 没有任何状态位
    pub(crate) fn is_idle(&self) -> bool {
        self.state().is_empty()
    }

    pub(crate) fn test(&self, flag: BufferState) -> bool {
        self.state().intersects(flag)
    }

    /// 置位，返回置位前是否已置位
    pub(crate) fn test_and_set(&self, flag: BufferState) -> bool {
        let mut status = self.status.lock();
        let old = status.state.contains(flag);
        status.state.insert(flag);
        old
    }

    pub(crate) fn set(&self, flag: BufferState) {
        self.status.lock().state.insert(flag);
    }

    /// 等待状态位清除
    pub(crate) fn wait_clear(&self, flag: BufferState) {
        let mut status = self.status.lock();
        while status.state.intersects(flag) {
            self.state_changed.wait(&mut status);
        }
    }

    /// 等待状态位清除后立即置位（独占该位）
    pub(crate) fn lock_bit(&self, flag: BufferState) {
        let mut status = self.status.lock();
        while status.state.intersects(flag) {
            self.state_changed.wait(&mut status);
        }
        status.state.insert(flag);
    }

    /// 开始一次写回
    ///
    /// 等待正在进行的写回结束；若此时仍为脏，清除 DIRTY 并置 WRITING，返回 true。
    /// 返回 false 表示没有需要写回的内容。
    pub(crate) fn begin_write(&self) -> bool {
        let mut status = self.status.lock();
        while status.state.contains(BufferState::WRITING) {
            self.state_changed.wait(&mut status);
        }
        if !status.state.contains(BufferState::DIRTY) {
            return false;
        }
        status.state.remove(BufferState::DIRTY);
        status.state.insert(BufferState::WRITING);
        true
    }

    /// 清除状态位并唤醒等待者
    pub(crate) fn clear_and_wake(&self, flag: BufferState) {
        let mut status = self.status.lock();
        status.state.remove(flag);
        drop(status);
        self.state_changed.notify_all();
    }

    /// 读取完成（I/O 完成回调中调用）
    pub(crate) fn end_read(&self, result: Result<()>) {
        let mut status = self.status.lock();
        status.read_error = result.err();
        status.state.remove(BufferState::READING);
        drop(status);
        self.state_changed.notify_all();
    }

    /// 写回完成（I/O 完成回调中调用）
    ///
    /// 写入失败时重新置脏：内存中的数据仍然有效，下一轮写回会再次尝试
    pub(crate) fn end_write(&self, result: &Result<()>) {
        let mut status = self.status.lock();
        match result {
            Ok(()) => status.write_error = None,
            Err(e) => {
                status.write_error = Some(e.clone());
                status.state.insert(BufferState::DIRTY);
            }
        }
        status.state.remove(BufferState::WRITING);
        drop(status);
        self.state_changed.notify_all();
    }

    pub(crate) fn read_error(&self) -> Option<Error> {
        self.status.lock().read_error.clone()
    }

    pub(crate) fn write_error(&self) -> Option<Error> {
        self.status.lock().write_error.clone()
    }

    /// 是否带有粘滞的读或写错误
    pub(crate) fn has_error(&self) -> bool {
        let status = self.status.lock();
        status.read_error.is_some() || status.write_error.is_some()
    }

    /// 复用前重置为空闲状态
    pub(crate) fn reset(&self, block: u64) {
        let mut status = self.status.lock();
        status.state = BufferState::empty();
        status.read_error = None;
        status.write_error = None;
        drop(status);
        self.hold_count.store(0, Ordering::Release);
        self.set_block(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn buffer() -> Buffer {
        Buffer::new(1, BufferStorage::Compact(vec![0u8; 512].into_boxed_slice()))
    }

    #[test]
    fn test_buffer_creation() {
        let buf = buffer();
        assert_eq!(buf.id(), 1);
        assert_eq!(buf.block(), 0);
        assert_eq!(buf.hold_count(), 0);
        assert!(buf.is_idle());
        assert!(!buf.has_error());
        assert_eq!(buf.storage().len(), 512);
    }

    #[test]
    fn test_hold_counting() {
        let buf = buffer();
        assert_eq!(buf.get(), 1);
        assert_eq!(buf.get(), 2);
        assert_eq!(buf.put().unwrap(), 1);
        assert_eq!(buf.put().unwrap(), 0);
        // 多余的释放是不变量破坏
        assert_eq!(buf.put().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(buf.hold_count(), 0);
    }

    #[test]
    fn test_dirty_is_idempotent() {
        let buf = buffer();
        assert!(!buf.test_and_set(BufferState::DIRTY));
        assert!(buf.test_and_set(BufferState::DIRTY));
        assert_eq!(buf.state(), BufferState::DIRTY);
    }

    #[test]
    fn test_begin_write() {
        let buf = buffer();
        // 不脏时无需写回
        assert!(!buf.begin_write());

        buf.set(BufferState::DIRTY);
        assert!(buf.begin_write());
        assert_eq!(buf.state(), BufferState::WRITING);

        buf.end_write(&Ok(()));
        assert!(buf.is_idle());
        assert!(buf.write_error().is_none());
    }

    #[test]
    fn test_write_error_redirties() {
        let buf = buffer();
        buf.set(BufferState::DIRTY);
        assert!(buf.begin_write());

        buf.end_write(&Err(Error::new(ErrorKind::Io, "write failed")));
        assert_eq!(buf.state(), BufferState::DIRTY);
        assert_eq!(buf.write_error().unwrap().kind(), ErrorKind::Io);

        // 重试成功后错误清除
        assert!(buf.begin_write());
        buf.end_write(&Ok(()));
        assert!(buf.is_idle());
        assert!(!buf.has_error());
    }

    #[test]
    fn test_read_error_is_sticky_until_reset() {
        let buf = buffer();
        buf.set(BufferState::READING);
        buf.end_read(Err(Error::new(ErrorKind::Io, "read failed")));
        assert!(buf.is_idle());
        assert!(buf.read_error().is_some());

        buf.reset(7);
        assert!(buf.read_error().is_none());
        assert_eq!(buf.block(), 7);
    }

    #[test]
    fn test_wait_clear_across_threads() {
        let buf = Arc::new(buffer());
        buf.set(BufferState::READING);

        let waiter = {
            let buf = Arc::clone(&buf);
            std::thread::spawn(move || {
                buf.wait_clear(BufferState::READING);
                buf.read_error().is_none()
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        buf.end_read(Ok(()));
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_lock_bit_serializes() {
        let buf = Arc::new(buffer());
        buf.set(BufferState::WRITING);

        let waiter = {
            let buf = Arc::clone(&buf);
            std::thread::spawn(move || {
                buf.lock_bit(BufferState::WRITING);
                buf.test(BufferState::WRITING)
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        buf.clear_and_wake(BufferState::WRITING);
        // 等待者重新获得了 WRITING 位
        assert!(waiter.join().unwrap());
        assert!(buf.test(BufferState::WRITING));
    }
}
