//! bufio_core: 缓冲块 I/O 缓存
//!
//! 位于块设备与上层块存储逻辑之间的缓存层，提供：
//! - **有界的定长缓冲区池**，按块号索引，每个块在内存中最多一份
//! - **显式的脏跟踪与写回**，写回失败不丢数据
//! - **内存压力下的安全回收**，干净缓冲区优先，预留缓冲区保证前进
//! - **RAII 句柄**，持有期间缓冲区不会被驱逐
//!
//! # 示例
//!
//! ```rust,ignore
//! use bufio_core::{BufioClient, BufioConfig, RamDevice, Result};
//!
//! fn main() -> Result<()> {
//!     let device = RamDevice::new(512, 2048);
//!     let config = BufioConfig::new(4096)
//!         .with_threshold_bytes(64 * 4096)
//!         .with_limit_bytes(96 * 4096);
//!     let client = BufioClient::new(device, config)?;
//!
//!     // 覆盖整块并写回
//!     let mut buf = client.new_buffer(0)?;
//!     buf.with_data_mut(|data| data.fill(0xAA));
//!     buf.mark_dirty();
//!     buf.release();
//!     client.write_dirty_buffers()?;
//!
//!     // 读取块
//!     let buf = client.read(0)?;
//!     assert_eq!(buf.data()[0], 0xAA);
//!
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`block`] - 块设备抽象和后端 I/O
//! - [`cache`] - 缓冲区、目录与缓存引擎

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 块设备抽象
pub mod block;

/// 缓冲块缓存
pub mod cache;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockDevice, RamDevice};
#[cfg(unix)]
pub use block::FileDevice;

// Cache
pub use cache::{
    BufferHandle, BufferId, BufferState, BufioClient, BufioConfig, CacheStats, StorageKind,
};
