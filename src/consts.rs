//! 缓冲块 I/O 缓存常量定义
//!
//! 这个模块包含了缓存的所有常量定义，包括：
//! - 设备与内存页大小
//! - 块大小范围
//! - 默认水位线
//! - 后端 I/O 参数

//=============================================================================
// 基础常量
//=============================================================================

/// 系统内存页大小（字节）
///
/// 块大小不超过一页时使用紧凑分配，超过时使用页面连续分配
pub const PAGE_SIZE: usize = 4096;

/// 默认物理扇区大小（字节）
pub const SECTOR_SIZE: u32 = 512;

/// 最小块大小（一个扇区）
pub const MIN_BLOCK_SIZE: usize = SECTOR_SIZE as usize;

/// 最大块大小（1 MiB）
pub const MAX_BLOCK_SIZE: usize = 1 << 20;

//=============================================================================
// 水位线
//=============================================================================

/// 默认软上限（字节），超过后在获取新缓冲区时主动回收
pub const DEFAULT_CACHE_THRESHOLD_BYTES: usize = 8 << 20;

/// 默认硬上限（字节），达到后新分配必须等待回收
pub const DEFAULT_CACHE_LIMIT_BYTES: usize = 9 << 20;

//=============================================================================
// 后端 I/O
//=============================================================================

/// 直接映射路径可处理的最大页数
pub const DIRECT_IO_MAX_PAGES: usize = 16;

/// 直接映射路径可处理的最大字节数，超过后按页分散传输
pub const DIRECT_IO_MAX_BYTES: usize = DIRECT_IO_MAX_PAGES * PAGE_SIZE;

/// 默认 I/O 完成线程数
pub const DEFAULT_IO_THREADS: usize = 2;
