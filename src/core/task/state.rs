use serde::{Serialize, Deserialize};
use std::fmt;

/// 下载任务状态
///
/// `Waiting → Connecting → Downloading → {Completed | Paused | Cancelled | Error}`，
/// 其中 `Paused` 不是终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Waiting,
    Connecting,
    Downloading,
    Paused,
    Completed,
    Cancelled,
    Error,
}

impl TaskStatus {
    /// 终态之后不会再有任何传输进展
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Error)
    }

    /// 界面显示用的状态文字
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Waiting => "等待中",
            TaskStatus::Connecting => "连接中",
            TaskStatus::Downloading => "下载中",
            TaskStatus::Paused => "已暂停",
            TaskStatus::Completed => "已完成",
            TaskStatus::Cancelled => "已取消",
            TaskStatus::Error => "错误",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
        assert!(!TaskStatus::Waiting.is_terminal());
    }

    #[test]
    fn test_label() {
        assert_eq!(TaskStatus::Downloading.to_string(), "下载中");
        assert_eq!(TaskStatus::Completed.label(), "已完成");
    }
}
