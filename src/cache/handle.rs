//! 缓冲区句柄 - RAII 风格的块访问
//!
//! 对应 `read` / `new` 返回的持有：句柄存在期间缓冲区不会被驱逐或复用，
//! 丢弃时自动释放持有。

use super::buffer::{Buffer, BufferId};
use super::client::BufioClient;
use super::pool::BufferStorage;
use crate::block::BlockDevice;
use crate::error::Result;
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// 缓冲区句柄
///
/// 提供 RAII 风格的块访问：
/// - 获取时由客户端完成查找、分配和读取
/// - 持有期间可以读写块数据，修改后调用 [`mark_dirty`](Self::mark_dirty)
/// - 丢弃时释放持有，脏数据由之后的写回提交
///
/// 同一块可以被多个句柄同时持有，它们看到的是同一份内存。
///
/// # 示例
///
/// ```rust,ignore
/// // 读取块
/// let buf = client.read(0)?;
/// buf.with_data(|data| {
///     println!("First byte: {:02x}", data[0]);
/// });
///
/// // 覆盖整块（不从设备读取）
/// let mut buf = client.new_buffer(10)?;
/// buf.with_data_mut(|data| data.fill(0xFF));
/// buf.mark_dirty();
/// // buf 超出作用域时自动释放
/// ```
pub struct BufferHandle<'a, D: BlockDevice> {
    /// 所属客户端
    client: &'a BufioClient<D>,
    /// 持有的缓冲区
    buffer: Arc<Buffer>,
    /// 是否仍持有（需要在 drop 时释放）
    held: bool,
}

impl<'a, D: BlockDevice> BufferHandle<'a, D> {
    pub(crate) fn new(client: &'a BufioClient<D>, buffer: Arc<Buffer>) -> Self {
        Self {
            client,
            buffer,
            held: true,
        }
    }

    /// 当前块号
    pub fn block(&self) -> u64 {
        self.buffer.block()
    }

    /// 缓冲区 ID（诊断用，同一块的并发持有者看到相同的 ID）
    pub fn buffer_id(&self) -> BufferId {
        self.buffer.id()
    }

    /// 块数据（只读）
    ///
    /// 返回的守卫必须在调用写回类操作之前丢弃
    pub fn data(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.buffer.storage(), BufferStorage::as_slice)
    }

    /// 块数据（可写）
    ///
    /// 修改后需要调用 [`mark_dirty`](Self::mark_dirty) 才会被写回
    pub fn data_mut(&mut self) -> MappedRwLockWriteGuard<'_, [u8]> {
        RwLockWriteGuard::map(self.buffer.storage_mut(), BufferStorage::as_mut_slice)
    }

    /// 使用闭包读取块数据
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.data())
    }

    /// 使用闭包修改块数据
    pub fn with_data_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.data_mut())
    }

    /// 标记为脏，重复调用没有额外效果
    pub fn mark_dirty(&self) {
        self.client.mark_buffer_dirty(&self.buffer);
    }

    /// 释放持有
    pub fn release(self) {
        drop(self);
    }

    /// 释放持有并把缓冲区搬到 `new_block`
    ///
    /// 独占时脏数据先写回旧位置，再改挂到新块号并标记为脏；
    /// 共享时内容被同步写到新块，缓冲区留在原块号。
    pub fn release_move(self, new_block: u64) -> Result<()> {
        let old_block = self.buffer.block();
        let result = self.client.move_buffer(&self.buffer, new_block);
        if let Err(e) = &result {
            log::warn!(
                "[BUFIO] move of block {:#x} to {:#x} failed: {}",
                old_block,
                new_block,
                e
            );
        }
        result
    }
}

impl<D: BlockDevice> Drop for BufferHandle<'_, D> {
    fn drop(&mut self) {
        if self.held {
            self.held = false;
            self.client.release_buffer(&self.buffer);
        }
    }
}

impl<D: BlockDevice> core::fmt::Debug for BufferHandle<'_, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferHandle")
            .field("block", &self.block())
            .field("buffer_id", &self.buffer_id())
            .field("held", &self.held)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::RamDevice;
    use crate::cache::BufioConfig;

    fn client() -> BufioClient<RamDevice> {
        BufioClient::new(RamDevice::new(512, 64), BufioConfig::new(1024)).unwrap()
    }

    #[test]
    fn test_handle_releases_on_drop() {
        let client = client();
        {
            let a = client.read(0).unwrap();
            let b = client.get(0).unwrap().unwrap();
            assert_eq!(a.buffer_id(), b.buffer_id());
        }
        // 两个持有都已释放，缓冲区可以被回收
        assert_eq!(client.shrink(1), 1);
    }

    #[test]
    fn test_shared_memory() {
        let client = client();
        let mut writer = client.new_buffer(1).unwrap();
        let reader = client.get(1).unwrap().unwrap();

        writer.with_data_mut(|data| data[..4].copy_from_slice(b"bufi"));
        assert_eq!(reader.with_data(|data| data[..4].to_vec()), b"bufi".to_vec());
    }

    #[test]
    fn test_data_guards() {
        let client = client();
        let mut buf = client.new_buffer(2).unwrap();
        assert_eq!(buf.data().len(), 1024);
        buf.data_mut()[0] = 0x42;
        assert_eq!(buf.data()[0], 0x42);
        buf.mark_dirty();
        buf.release();
        assert_eq!(client.dirty_count(), 1);
    }

    #[test]
    fn test_release_move_out_of_range() {
        let client = client();
        let buf = client.new_buffer(3).unwrap();
        assert!(buf.release_move(1 << 20).is_err());
        // 失败时持有同样被释放
        assert_eq!(client.shrink(1), 1);
    }

    #[test]
    fn test_debug_format() {
        let client = client();
        let buf = client.new_buffer(4).unwrap();
        let text = format!("{:?}", buf);
        assert!(text.contains("block: 4"));
    }
}
