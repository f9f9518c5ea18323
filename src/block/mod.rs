//! 块设备抽象
//!
//! 提供块设备接口和缓存使用的后端 I/O。
//! block/device.rs 定义设备接口，缓存只通过它访问介质
//!
//! block/io.rs 把块号换算成扇区请求，在 I/O 线程上异步执行并回调，
//! 按缓冲区的存储方式选择整块直接传输或按页分散传输
//!
//! block/ram.rs 与 block/file.rs 是两种现成的设备实现

mod device;
#[cfg(unix)]
mod file;
pub(crate) mod io;
mod queue;
mod ram;

pub use device::BlockDevice;
#[cfg(unix)]
pub use file::FileDevice;
pub use ram::RamDevice;
