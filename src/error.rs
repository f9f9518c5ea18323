//! 错误类型定义
//!
//! 提供缓冲块 I/O 缓存操作的错误类型。
//!
//! 设备错误（[`ErrorKind::Io`]）按原样从后端设备传递上来，会作为粘滞错误
//! 保存在缓冲区上，并原样返回给每一个等待该 I/O 的调用者，因此 [`Error`]
//! 必须是 `Clone` 的。

use core::fmt;

/// 缓存操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 设备 I/O 错误（读、写或刷新屏障失败）
    Io,
    /// 无效参数（配置错误、块号越界等）
    InvalidInput,
    /// 内存分配失败
    NoMemory,
    /// 内部不变量被破坏（正确使用时不应出现）
    InvalidState,
    /// 设备只读
    PermissionDenied,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 创建带原因的错误
    ///
    /// 原因只写入日志，不随错误保存
    pub fn with_cause(kind: ErrorKind, message: &'static str, cause: impl fmt::Debug) -> Self {
        log::debug!("[BUFIO] {}: {:?}", message, cause);
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 是否是设备 I/O 错误
    pub const fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                Error::with_cause(ErrorKind::PermissionDenied, "device access denied", err)
            }
            std::io::ErrorKind::UnexpectedEof => {
                Error::with_cause(ErrorKind::InvalidInput, "access beyond end of device", err)
            }
            std::io::ErrorKind::OutOfMemory => {
                Error::with_cause(ErrorKind::NoMemory, "out of memory", err)
            }
            _ => Error::with_cause(ErrorKind::Io, "device I/O error", err),
        }
    }
}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_accessors() {
        let err = Error::new(ErrorKind::Io, "read failed");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.message(), "read failed");
        assert!(err.is_io());
        assert!(!Error::new(ErrorKind::NoMemory, "no buffer").is_io());
    }

    #[test]
    fn test_error_display() {
        let err = Error::new(ErrorKind::InvalidState, "double link");
        assert_eq!(format!("{}", err), "InvalidState: double link");
    }

    #[test]
    fn test_from_io_error() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(err.kind(), ErrorKind::Io);

        let err: Error = std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err: Error = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }
}
