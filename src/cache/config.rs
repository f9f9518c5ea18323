//! 缓存配置
//!
//! 创建客户端时识别的全部选项。水位线以字节给出，内部换算成缓冲区个数。

use crate::consts::{
    DEFAULT_CACHE_LIMIT_BYTES, DEFAULT_CACHE_THRESHOLD_BYTES, DEFAULT_IO_THREADS,
    MAX_BLOCK_SIZE, MIN_BLOCK_SIZE,
};
use crate::error::{Error, ErrorKind, Result};

/// 缓存配置
///
/// # 示例
///
/// ```rust,ignore
/// let config = BufioConfig::new(4096)
///     .with_threshold_bytes(2 * 4096)
///     .with_limit_bytes(3 * 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufioConfig {
    /// 块大小（字节）
    pub block_size: usize,
    /// 使用者自定义标志，缓存不解释
    pub extra_flags: u32,
    /// 软上限（字节），0 表示默认值
    pub cache_threshold_bytes: usize,
    /// 硬上限（字节），0 表示默认值
    pub cache_limit_bytes: usize,
    /// I/O 完成线程数
    pub io_threads: usize,
}

impl BufioConfig {
    /// 以默认水位线创建配置
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            extra_flags: 0,
            cache_threshold_bytes: 0,
            cache_limit_bytes: 0,
            io_threads: DEFAULT_IO_THREADS,
        }
    }

    /// 设置软上限
    pub fn with_threshold_bytes(mut self, bytes: usize) -> Self {
        self.cache_threshold_bytes = bytes;
        self
    }

    /// 设置硬上限
    pub fn with_limit_bytes(mut self, bytes: usize) -> Self {
        self.cache_limit_bytes = bytes;
        self
    }

    /// 设置使用者标志
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.extra_flags = flags;
        self
    }

    /// 设置 I/O 完成线程数（至少 1）
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// 校验配置
    ///
    /// 块大小必须是 2 的幂、不小于且整除设备扇区大小、不超过 [`MAX_BLOCK_SIZE`]
    pub fn validate(&self, sector_size: u32) -> Result<()> {
        let sector_size = sector_size as usize;
        if !self.block_size.is_power_of_two() {
            return Err(Error::new(ErrorKind::InvalidInput, "block size must be a power of two"));
        }
        if self.block_size < MIN_BLOCK_SIZE || self.block_size > MAX_BLOCK_SIZE {
            return Err(Error::new(ErrorKind::InvalidInput, "block size out of range"));
        }
        if sector_size == 0 || self.block_size < sector_size || self.block_size % sector_size != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "block size must be a multiple of the sector size",
            ));
        }
        if self.io_threads == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "at least one I/O thread is required"));
        }
        Ok(())
    }

    fn bytes_to_buffers(&self, bytes: usize, default: usize) -> usize {
        let bytes = if bytes == 0 { default } else { bytes };
        (bytes / self.block_size).max(1)
    }

    /// 硬上限（缓冲区个数）
    pub fn limit_buffers(&self) -> usize {
        self.bytes_to_buffers(self.cache_limit_bytes, DEFAULT_CACHE_LIMIT_BYTES)
    }

    /// 软上限（缓冲区个数），不超过硬上限
    pub fn threshold_buffers(&self) -> usize {
        self.bytes_to_buffers(self.cache_threshold_bytes, DEFAULT_CACHE_THRESHOLD_BYTES)
            .min(self.limit_buffers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BufioConfig::new(4096);
        assert!(config.validate(512).is_ok());
        assert_eq!(config.threshold_buffers(), (8 << 20) / 4096);
        assert_eq!(config.limit_buffers(), (9 << 20) / 4096);
        assert_eq!(config.io_threads, DEFAULT_IO_THREADS);
    }

    #[test]
    fn test_block_size_validation() {
        assert!(BufioConfig::new(3000).validate(512).is_err());
        assert!(BufioConfig::new(256).validate(512).is_err());
        assert!(BufioConfig::new(MAX_BLOCK_SIZE * 2).validate(512).is_err());
        // 块小于扇区
        assert!(BufioConfig::new(1024).validate(4096).is_err());
        assert!(BufioConfig::new(4096).validate(4096).is_ok());
        assert_eq!(
            BufioConfig::new(0).validate(512).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_watermarks_in_buffers() {
        let config = BufioConfig::new(4096)
            .with_threshold_bytes(2 * 4096)
            .with_limit_bytes(3 * 4096);
        assert_eq!(config.threshold_buffers(), 2);
        assert_eq!(config.limit_buffers(), 3);
    }

    #[test]
    fn test_threshold_clamped_to_limit() {
        let config = BufioConfig::new(4096)
            .with_threshold_bytes(16 * 4096)
            .with_limit_bytes(4 * 4096);
        assert_eq!(config.threshold_buffers(), 4);

        // 不足一个块的上限按一个缓冲区计
        let tiny = BufioConfig::new(4096).with_threshold_bytes(1).with_limit_bytes(1);
        assert_eq!(tiny.threshold_buffers(), 1);
        assert_eq!(tiny.limit_buffers(), 1);
    }

    #[test]
    fn test_builder() {
        let config = BufioConfig::new(1024).with_flags(0x5).with_io_threads(0);
        assert_eq!(config.extra_flags, 0x5);
        assert_eq!(config.io_threads, 1);
    }
}
