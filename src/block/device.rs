//! 块设备核心类型

use crate::error::Result;
use std::sync::Arc;

/// 块设备接口
///
/// 实现此 trait 以提供底层块设备访问。地址以扇区为单位，缓存在其上
/// 按配置的块大小进行换算（`块号 × 块大小 / 扇区大小`）。
///
/// 设备由后台 I/O 线程共享，因此所有方法都接收 `&self`，实现者需要自行
/// 保证内部可变性的线程安全。
///
/// # 示例
///
/// ```rust,ignore
/// use bufio_core::{BlockDevice, Result};
///
/// struct MyDevice {
///     // ...
/// }
///
/// impl BlockDevice for MyDevice {
///     fn sector_size(&self) -> u32 {
///         512
///     }
///
///     fn total_sectors(&self) -> u64 {
///         1 << 21
///     }
///
///     fn read_sectors(&self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
///         // 实现扇区读取
///         Ok(count as usize * 512)
///     }
///
///     fn write_sectors(&self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
///         // 实现扇区写入
///         Ok(count as usize * 512)
///     }
/// }
/// ```
pub trait BlockDevice: Send + Sync + 'static {
    /// 物理扇区大小（最小可寻址单位，通常 512）
    fn sector_size(&self) -> u32;

    /// 总扇区数
    fn total_sectors(&self) -> u64;

    /// 读取扇区
    ///
    /// # 参数
    ///
    /// * `lba` - 起始扇区地址
    /// * `count` - 要读取的扇区数
    /// * `buf` - 目标缓冲区（大小恰为 count * sector_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际读取的字节数
    fn read_sectors(&self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize>;

    /// 写入扇区
    ///
    /// # 参数
    ///
    /// * `lba` - 起始扇区地址
    /// * `count` - 要写入的扇区数
    /// * `buf` - 源缓冲区（大小恰为 count * sector_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际写入的字节数
    fn write_sectors(&self, lba: u64, count: u32, buf: &[u8]) -> Result<usize>;

    /// 刷新设备易失性写缓存（屏障）
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// 是否只读
    fn is_read_only(&self) -> bool {
        false
    }
}

/// 共享设备
///
/// 缓存独占传入的设备，使用者需要在缓存之外继续访问同一设备时传入 `Arc`
impl<T: BlockDevice> BlockDevice for Arc<T> {
    fn sector_size(&self) -> u32 {
        (**self).sector_size()
    }

    fn total_sectors(&self) -> u64 {
        (**self).total_sectors()
    }

    fn read_sectors(&self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        (**self).read_sectors(lba, count, buf)
    }

    fn write_sectors(&self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
        (**self).write_sectors(lba, count, buf)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn is_read_only(&self) -> bool {
        (**self).is_read_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullDevice;

    impl BlockDevice for NullDevice {
        fn sector_size(&self) -> u32 {
            512
        }

        fn total_sectors(&self) -> u64 {
            16
        }

        fn read_sectors(&self, _lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
            buf.fill(0);
            Ok(count as usize * 512)
        }

        fn write_sectors(&self, _lba: u64, count: u32, _buf: &[u8]) -> Result<usize> {
            Ok(count as usize * 512)
        }
    }

    #[test]
    fn test_default_methods() {
        let dev = NullDevice;
        assert!(dev.flush().is_ok());
        assert!(!dev.is_read_only());
    }

    #[test]
    fn test_trait_object() {
        let dev: Box<dyn BlockDevice> = Box::new(NullDevice);
        let mut buf = [0xFFu8; 1024];
        assert_eq!(dev.read_sectors(0, 2, &mut buf).unwrap(), 1024);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_shared_device() {
        let dev = Arc::new(NullDevice);
        let shared: Arc<NullDevice> = Arc::clone(&dev);
        assert_eq!(shared.sector_size(), 512);
        assert_eq!(BlockDevice::total_sectors(&shared), 16);
    }
}
