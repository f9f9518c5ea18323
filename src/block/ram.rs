//! 内存块设备
//!
//! 以一段内存模拟块设备，支持按扇区注入读写错误、模拟读写延迟，
//! 并统计实际发生的物理读写次数。主要用于测试缓存行为。

use super::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// 内存块设备
///
/// # 示例
///
/// ```rust,ignore
/// let dev = RamDevice::new(512, 1024);
/// dev.fail_writes(8); // 覆盖扇区 8 的写入都会失败
/// ```
pub struct RamDevice {
    /// 扇区大小
    sector_size: u32,
    /// 设备内容
    storage: Mutex<Vec<u8>>,
    /// 读取会失败的扇区
    bad_read_sectors: Mutex<BTreeSet<u64>>,
    /// 写入会失败的扇区
    bad_write_sectors: Mutex<BTreeSet<u64>>,
    /// 每次读取前的人为延迟
    read_delay: Mutex<Option<Duration>>,
    /// 每次写入前的人为延迟
    write_delay: Mutex<Option<Duration>>,
    /// 物理读取次数
    read_count: AtomicU64,
    /// 物理写入次数
    write_count: AtomicU64,
    /// 刷新次数
    flush_count: AtomicU64,
}

impl RamDevice {
    /// 创建全零内存设备
    ///
    /// # 参数
    ///
    /// * `sector_size` - 扇区大小（字节）
    /// * `total_sectors` - 扇区数
    pub fn new(sector_size: u32, total_sectors: u64) -> Self {
        let len = sector_size as usize * total_sectors as usize;
        Self {
            sector_size,
            storage: Mutex::new(vec![0u8; len]),
            bad_read_sectors: Mutex::new(BTreeSet::new()),
            bad_write_sectors: Mutex::new(BTreeSet::new()),
            read_delay: Mutex::new(None),
            write_delay: Mutex::new(None),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        }
    }

    /// 令覆盖 `sector` 的读取失败
    pub fn fail_reads(&self, sector: u64) {
        self.bad_read_sectors.lock().insert(sector);
    }

    /// 令覆盖 `sector` 的写入失败
    pub fn fail_writes(&self, sector: u64) {
        self.bad_write_sectors.lock().insert(sector);
    }

    /// 清除所有注入的错误
    pub fn clear_faults(&self) {
        self.bad_read_sectors.lock().clear();
        self.bad_write_sectors.lock().clear();
    }

    /// 设置每次读取前的延迟
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.lock() = delay;
    }

    /// 设置每次写入前的延迟
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock() = delay;
    }

    /// 绕过缓存直接查看设备内容
    pub fn peek(&self, offset: usize, len: usize) -> Vec<u8> {
        self.storage.lock()[offset..offset + len].to_vec()
    }

    /// 绕过缓存直接修改设备内容
    pub fn poke(&self, offset: usize, data: &[u8]) {
        self.storage.lock()[offset..offset + data.len()].copy_from_slice(data);
    }

    /// 物理读取次数
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::SeqCst)
    }

    /// 物理写入次数
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::SeqCst)
    }

    /// 刷新次数
    pub fn flush_count(&self) -> u64 {
        self.flush_count.load(Ordering::SeqCst)
    }

    fn range(&self, lba: u64, count: u32, buf_len: usize) -> Result<(usize, usize)> {
        let len = count as usize * self.sector_size as usize;
        if buf_len != len {
            return Err(Error::new(ErrorKind::InvalidInput, "buffer length does not match sector count"));
        }
        let beyond = Error::new(ErrorKind::InvalidInput, "access beyond end of device");
        let start = usize::try_from(lba)
            .ok()
            .and_then(|lba| lba.checked_mul(self.sector_size as usize))
            .ok_or(beyond.clone())?;
        let end = start.checked_add(len).ok_or(beyond.clone())?;
        if end > self.storage.lock().len() {
            return Err(beyond);
        }
        Ok((start, len))
    }

    fn hits(set: &Mutex<BTreeSet<u64>>, lba: u64, count: u32) -> bool {
        set.lock().range(lba..lba + count as u64).next().is_some()
    }
}

impl BlockDevice for RamDevice {
    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn total_sectors(&self) -> u64 {
        (self.storage.lock().len() / self.sector_size as usize) as u64
    }

    fn read_sectors(&self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let (start, len) = self.range(lba, count, buf.len())?;
        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.read_count.fetch_add(1, Ordering::SeqCst);
        if Self::hits(&self.bad_read_sectors, lba, count) {
            return Err(Error::new(ErrorKind::Io, "injected read error"));
        }
        buf.copy_from_slice(&self.storage.lock()[start..start + len]);
        Ok(len)
    }

    fn write_sectors(&self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
        let (start, len) = self.range(lba, count, buf.len())?;
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.write_count.fetch_add(1, Ordering::SeqCst);
        if Self::hits(&self.bad_write_sectors, lba, count) {
            return Err(Error::new(ErrorKind::Io, "injected write error"));
        }
        self.storage.lock()[start..start + len].copy_from_slice(buf);
        Ok(len)
    }

    fn flush(&self) -> Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_roundtrip() {
        let dev = RamDevice::new(512, 16);
        assert_eq!(dev.total_sectors(), 16);

        let data = vec![0x5Au8; 1024];
        dev.write_sectors(2, 2, &data).unwrap();

        let mut buf = vec![0u8; 1024];
        dev.read_sectors(2, 2, &mut buf).unwrap();
        assert_eq!(buf, data);
        assert_eq!(dev.peek(1024, 4), vec![0x5A; 4]);
        assert_eq!(dev.read_count(), 1);
        assert_eq!(dev.write_count(), 1);
    }

    #[test]
    fn test_fault_injection() {
        let dev = RamDevice::new(512, 16);
        dev.fail_reads(3);
        dev.fail_writes(5);

        let mut buf = vec![0u8; 1024];
        // 扇区 2..4 覆盖了扇区 3
        assert_eq!(dev.read_sectors(2, 2, &mut buf).unwrap_err().kind(), ErrorKind::Io);
        // 扇区 0..2 不受影响
        assert!(dev.read_sectors(0, 2, &mut buf).is_ok());
        assert!(dev.write_sectors(4, 2, &buf).is_err());

        dev.clear_faults();
        assert!(dev.read_sectors(2, 2, &mut buf).is_ok());
        assert!(dev.write_sectors(4, 2, &buf).is_ok());
    }

    #[test]
    fn test_out_of_range() {
        let dev = RamDevice::new(512, 4);
        let mut buf = vec![0u8; 1024];
        assert_eq!(
            dev.read_sectors(3, 2, &mut buf).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        // 长度与扇区数不符
        assert!(dev.write_sectors(0, 1, &buf).is_err());
    }

    #[test]
    fn test_huge_lba_rejected() {
        let dev = RamDevice::new(512, 4);
        let mut buf = vec![0u8; 1024];
        assert_eq!(
            dev.read_sectors(u64::MAX - 1, 2, &mut buf).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            dev.write_sectors(u64::MAX / 256, 2, &buf).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(dev.write_count(), 0);
    }

    #[test]
    fn test_write_delay() {
        let dev = RamDevice::new(512, 4);
        dev.set_write_delay(Some(Duration::from_millis(20)));
        let start = std::time::Instant::now();
        dev.write_sectors(0, 1, &[0x11; 512]).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(dev.peek(0, 2), vec![0x11; 2]);
    }

    #[test]
    fn test_flush_counter() {
        let dev = RamDevice::new(512, 4);
        dev.flush().unwrap();
        dev.flush().unwrap();
        assert_eq!(dev.flush_count(), 2);
    }
}
