//! 后端块 I/O
//!
//! 把"读 / 写块 b 到缓冲区"翻译成对设备的扇区请求，并在 I/O 线程上异步执行，
//! 完成时调用一次回调。起始扇区为 `b × (块大小 / 扇区大小)`，长度恰为一个块。
//!
//! 传输路径按缓冲区的存储方式选择：
//!
//! - 存储连续且不超过 [`DIRECT_IO_MAX_BYTES`]：整块一次请求（直接路径）
//! - 否则按页拆分为多次请求（分散路径），任一段失败即整体失败
//!
//! 两条路径对调用者的可见效果完全相同。

use super::queue::IoQueue;
use super::BlockDevice;
use crate::cache::buffer::Buffer;
use crate::cache::pool::BufferStorage;
use crate::consts::{DIRECT_IO_MAX_BYTES, PAGE_SIZE};
use crate::error::{Error, ErrorKind, Result};
use std::sync::Arc;

/// 传输方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rw {
    /// 设备 → 缓冲区
    Read,
    /// 缓冲区 → 设备
    Write,
}

/// I/O 完成回调
///
/// 在 I/O 线程上调用，恰好一次。回调只允许修改缓冲区自身的状态，
/// 不能获取缓存引擎锁。
pub(crate) type EndIoCallback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// I/O 线程与提交者共享的部分
struct IoShared<D: BlockDevice> {
    device: D,
    block_size: usize,
    sector_size: usize,
    sectors_per_block: u64,
}

/// 后端块 I/O 适配器
pub(crate) struct BlockIo<D: BlockDevice> {
    shared: Arc<IoShared<D>>,
    queue: IoQueue,
}

impl<D: BlockDevice> BlockIo<D> {
    /// 创建适配器并启动 I/O 线程
    ///
    /// 块大小必须是设备扇区大小的整数倍（由配置校验保证）
    pub(crate) fn new(device: D, block_size: usize, io_threads: usize) -> Result<Self> {
        let sector_size = device.sector_size() as usize;
        if sector_size == 0 || block_size == 0 || block_size % sector_size != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "block size is not a multiple of the sector size",
            ));
        }
        let queue = IoQueue::new(io_threads)?;
        Ok(Self {
            shared: Arc::new(IoShared {
                device,
                block_size,
                sector_size,
                sectors_per_block: (block_size / sector_size) as u64,
            }),
            queue,
        })
    }

    pub(crate) fn device(&self) -> &D {
        &self.shared.device
    }

    pub(crate) fn block_size(&self) -> usize {
        self.shared.block_size
    }

    /// 设备容量（块）
    pub(crate) fn device_blocks(&self) -> u64 {
        self.shared.device.total_sectors() / self.shared.sectors_per_block
    }

    /// I/O 线程数
    pub(crate) fn threads(&self) -> usize {
        self.queue.threads()
    }

    /// 提交异步传输
    ///
    /// 只入队不阻塞，可以在持有缓存引擎锁时调用
    pub(crate) fn submit(&self, rw: Rw, block: u64, buffer: Arc<Buffer>, done: EndIoCallback) {
        log::trace!(
            "[BUFIO-IO] submit {:?} block={:#x} buffer={}",
            rw,
            block,
            buffer.id()
        );
        let shared = Arc::clone(&self.shared);
        self.queue.push(Box::new(move || {
            let result = shared.transfer(rw, block, &buffer);
            if let Err(e) = &result {
                log::warn!("[BUFIO-IO] {:?} block={:#x} failed: {}", rw, block, e);
            }
            done(result);
        }));
    }

    /// 同步刷新设备缓存
    pub(crate) fn flush(&self) -> Result<()> {
        self.shared.device.flush()
    }
}

impl<D: BlockDevice> IoShared<D> {
    fn transfer(&self, rw: Rw, block: u64, buffer: &Buffer) -> Result<()> {
        let lba = block
            .checked_mul(self.sectors_per_block)
            .ok_or(Error::new(ErrorKind::InvalidInput, "block number overflows"))?;
        let end = lba
            .checked_add(self.sectors_per_block)
            .ok_or(Error::new(ErrorKind::InvalidInput, "block number overflows"))?;
        if end > self.device.total_sectors() {
            return Err(Error::new(ErrorKind::InvalidInput, "block beyond end of device"));
        }

        match rw {
            Rw::Read => {
                let mut storage = buffer.storage_mut();
                self.read_into(lba, &mut storage)
            }
            Rw::Write => {
                if self.device.is_read_only() {
                    return Err(Error::new(ErrorKind::PermissionDenied, "device is read-only"));
                }
                let storage = buffer.storage();
                self.write_from(lba, &storage)
            }
        }
    }

    fn is_direct(storage: &BufferStorage) -> bool {
        storage.is_contiguous() && storage.len() <= DIRECT_IO_MAX_BYTES
    }

    /// 分散路径的分段大小（至少一个扇区）
    fn chunk_size(&self) -> usize {
        PAGE_SIZE.max(self.sector_size)
    }

    fn read_into(&self, lba: u64, storage: &mut BufferStorage) -> Result<()> {
        let direct = Self::is_direct(storage);
        let data = storage.as_mut_slice();
        if direct {
            return self.read_chunk(lba, data);
        }
        let chunk_size = self.chunk_size();
        for (i, chunk) in data.chunks_mut(chunk_size).enumerate() {
            let offset = (i * chunk_size / self.sector_size) as u64;
            self.read_chunk(lba + offset, chunk)?;
        }
        Ok(())
    }

    fn write_from(&self, lba: u64, storage: &BufferStorage) -> Result<()> {
        let data = storage.as_slice();
        if Self::is_direct(storage) {
            return self.write_chunk(lba, data);
        }
        let chunk_size = self.chunk_size();
        for (i, chunk) in data.chunks(chunk_size).enumerate() {
            let offset = (i * chunk_size / self.sector_size) as u64;
            self.write_chunk(lba + offset, chunk)?;
        }
        Ok(())
    }

    fn read_chunk(&self, lba: u64, buf: &mut [u8]) -> Result<()> {
        let count = (buf.len() / self.sector_size) as u32;
        let n = self.device.read_sectors(lba, count, buf)?;
        if n != buf.len() {
            return Err(Error::new(ErrorKind::Io, "short read from device"));
        }
        Ok(())
    }

    fn write_chunk(&self, lba: u64, buf: &[u8]) -> Result<()> {
        let count = (buf.len() / self.sector_size) as u32;
        let n = self.device.write_sectors(lba, count, buf)?;
        if n != buf.len() {
            return Err(Error::new(ErrorKind::Io, "short write to device"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::RamDevice;
    use crate::cache::pool::BufferPool;
    use std::sync::mpsc;

    /// 提交一次传输并等待完成
    fn run<D: BlockDevice>(io: &BlockIo<D>, rw: Rw, block: u64, buffer: &Arc<Buffer>) -> Result<()> {
        let (tx, rx) = mpsc::channel();
        io.submit(
            rw,
            block,
            Arc::clone(buffer),
            Box::new(move |res| {
                tx.send(res).unwrap();
            }),
        );
        rx.recv().unwrap()
    }

    #[test]
    fn test_block_to_sector_mapping() {
        let io = BlockIo::new(RamDevice::new(512, 64), 2048, 1).unwrap();
        assert_eq!(io.device_blocks(), 16);

        let pool = BufferPool::new(2048);
        let buf = pool.try_alloc().unwrap();
        buf.storage_mut().as_mut_slice().fill(0xAB);
        run(&io, Rw::Write, 3, &buf).unwrap();

        // 块 3 = 扇区 12 = 字节偏移 6144
        assert_eq!(io.device().peek(6144, 2048), vec![0xAB; 2048]);
        assert_eq!(io.device().peek(4096, 16), vec![0; 16]);

        let other = pool.try_alloc().unwrap();
        run(&io, Rw::Read, 3, &other).unwrap();
        assert!(other.storage().as_slice().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_direct_and_scatter_paths() {
        let block_size = PAGE_SIZE * 2;
        let io = BlockIo::new(RamDevice::new(512, 64), block_size, 1).unwrap();
        let pool = BufferPool::new(block_size);

        // 连续存储：一次请求
        let contiguous = pool.try_alloc().unwrap();
        contiguous.storage_mut().as_mut_slice().fill(0x11);
        run(&io, Rw::Write, 0, &contiguous).unwrap();
        assert_eq!(io.device().write_count(), 1);

        // 保底存储：按页分两次请求
        let reserved = pool.alloc_reserved();
        {
            let mut storage = reserved.storage_mut();
            let data = storage.as_mut_slice();
            data[..PAGE_SIZE].fill(0x22);
            data[PAGE_SIZE..].fill(0x33);
        }
        run(&io, Rw::Write, 1, &reserved).unwrap();
        assert_eq!(io.device().write_count(), 3);
        assert_eq!(io.device().peek(block_size, PAGE_SIZE), vec![0x22; PAGE_SIZE]);
        assert_eq!(
            io.device().peek(block_size + PAGE_SIZE, PAGE_SIZE),
            vec![0x33; PAGE_SIZE]
        );

        // 两条路径读回的内容一致
        let reader = pool.alloc_reserved();
        run(&io, Rw::Read, 0, &reader).unwrap();
        assert_eq!(io.device().read_count(), 2);
        assert!(reader.storage().as_slice().iter().all(|&b| b == 0x11));
    }

    #[test]
    fn test_large_block_uses_scatter() {
        let block_size = DIRECT_IO_MAX_BYTES * 2;
        let sectors = (block_size / 512) as u64;
        let io = BlockIo::new(RamDevice::new(512, sectors), block_size, 1).unwrap();
        let pool = BufferPool::new(block_size);

        let buf = pool.try_alloc().unwrap();
        run(&io, Rw::Read, 0, &buf).unwrap();
        assert_eq!(io.device().read_count(), (block_size / PAGE_SIZE) as u64);
    }

    #[test]
    fn test_error_propagation() {
        let io = BlockIo::new(RamDevice::new(512, 64), 1024, 1).unwrap();
        let pool = BufferPool::new(1024);
        let buf = pool.try_alloc().unwrap();

        io.device().fail_reads(5);
        // 块 2 覆盖扇区 4..6
        assert_eq!(run(&io, Rw::Read, 2, &buf).unwrap_err().kind(), ErrorKind::Io);
        assert!(run(&io, Rw::Read, 1, &buf).is_ok());

        // 越界
        assert_eq!(
            run(&io, Rw::Write, 32, &buf).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_bad_block_size() {
        assert!(BlockIo::new(RamDevice::new(4096, 8), 1024, 1).is_err());
    }
}
