use thiserror::Error;
use std::io;

use crate::core::task::control::Halt;

/// 下载核心的错误类型
///
/// 所有错误都在任务边界被吸收，转换为任务状态，不会穿过注册表或线程池向外抛出。
#[derive(Error, Debug)]
pub enum DownloadError {
    /// 预探测文件大小失败（非致命，总大小记为未知）
    #[error("探测文件大小失败: {0}")]
    Probe(String),

    #[error("连接失败: {0}")]
    Connect(String),

    #[error("网络流错误: {0}")]
    Stream(String),

    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    /// 被线程池强制中断
    #[error("下载被中断")]
    Interrupted,

    #[error("下载被取消")]
    Cancelled,

    #[error("配置错误: {0}")]
    Config(String),
}

impl DownloadError {
    pub fn invalid_url(url: impl Into<String>) -> Self {
        DownloadError::InvalidUrl(url.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        DownloadError::Config(msg.into())
    }
}

/// 传输循环被控制信号打断
impl From<Halt> for DownloadError {
    fn from(halt: Halt) -> Self {
        match halt {
            Halt::Cancelled => DownloadError::Cancelled,
            Halt::Interrupted => DownloadError::Interrupted,
        }
    }
}

pub type DownloadResult<T> = Result<T, DownloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(DownloadError::invalid_url("ftp://host").to_string(), "无效的URL: ftp://host");
        assert_eq!(DownloadError::config("并发数为0").to_string(), "配置错误: 并发数为0");
        assert_eq!(DownloadError::Interrupted.to_string(), "下载被中断");
    }

    #[test]
    fn test_halt_conversion() {
        assert!(matches!(DownloadError::from(Halt::Cancelled), DownloadError::Cancelled));
        assert!(matches!(DownloadError::from(Halt::Interrupted), DownloadError::Interrupted));
    }

    #[test]
    fn test_io_conversion() {
        let error: DownloadError = io::Error::new(io::ErrorKind::Other, "disk").into();
        assert!(matches!(error, DownloadError::Io(_)));
        assert!(error.to_string().starts_with("IO错误"));
    }
}
