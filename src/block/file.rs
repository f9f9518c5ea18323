//! 文件块设备
//!
//! 使用 `pread`/`pwrite` 语义的定位 I/O（`std::os::unix::fs::FileExt`），
//! 不依赖共享的文件偏移，可被多个 I/O 线程并发使用。

use super::BlockDevice;
use crate::consts::SECTOR_SIZE;
use crate::error::{Error, ErrorKind, Result};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

/// 文件块设备
#[derive(Debug)]
pub struct FileDevice {
    file: File,
    sector_size: u32,
    total_sectors: u64,
    writable: bool,
}

impl FileDevice {
    /// 打开镜像文件
    ///
    /// 优先以读写方式打开，失败时退化为只读。文件长度必须是扇区大小的整数倍。
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sector_size(path, SECTOR_SIZE)
    }

    /// 以指定扇区大小打开镜像文件
    pub fn open_with_sector_size(path: impl AsRef<Path>, sector_size: u32) -> Result<Self> {
        if sector_size == 0 || !sector_size.is_power_of_two() {
            return Err(Error::new(ErrorKind::InvalidInput, "sector size must be a power of two"));
        }
        let path = path.as_ref();
        let (file, writable) = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map(|file| (file, true))
            .or_else(|_| OpenOptions::new().read(true).open(path).map(|file| (file, false)))?;
        let len = file.metadata()?.len();
        if len % sector_size as u64 != 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "image length is not sector aligned"));
        }
        log::debug!(
            "[BUFIO] opened {:?}: {} bytes, writable={}",
            path,
            len,
            writable
        );
        Ok(Self {
            file,
            sector_size,
            total_sectors: len / sector_size as u64,
            writable,
        })
    }

    fn offset(&self, lba: u64, count: u32, buf_len: usize) -> Result<u64> {
        if buf_len != count as usize * self.sector_size as usize {
            return Err(Error::new(ErrorKind::InvalidInput, "buffer length does not match sector count"));
        }
        let end = lba
            .checked_add(count as u64)
            .ok_or(Error::new(ErrorKind::InvalidInput, "sector range overflows"))?;
        if end > self.total_sectors {
            return Err(Error::new(ErrorKind::InvalidInput, "access beyond end of device"));
        }
        Ok(lba * self.sector_size as u64)
    }
}

impl BlockDevice for FileDevice {
    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn total_sectors(&self) -> u64 {
        self.total_sectors
    }

    fn read_sectors(&self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let offset = self.offset(lba, count, buf.len())?;
        self.file.read_exact_at(buf, offset)?;
        Ok(buf.len())
    }

    fn write_sectors(&self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(Error::new(ErrorKind::PermissionDenied, "device is read-only"));
        }
        let offset = self.offset(lba, count, buf.len())?;
        self.file.write_all_at(buf, offset)?;
        Ok(buf.len())
    }

    fn flush(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        !self.writable
    }
}
