mod progress;

use anyhow::{anyhow, Result};
use std::fmt;
use std::path::Path;
use std::process::Command;

use crate::core::task::{TaskProgress, TaskStatus};
use crate::utils::format_bytes;
pub use progress::ProgressManager;

pub fn print_success(message: &str) {
    println!("✓ {}", message);
}

pub fn print_error(message: &str) {
    eprintln!("✗ {}", message);
}

/// 用系统文件管理器打开目录
pub fn reveal_in_folder(folder: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        Command::new("open")
            .arg(folder)
            .spawn()
            .map_err(|e| anyhow!("open failed: {e}"))?;
        return Ok(());
    }
    #[cfg(target_os = "linux")]
    {
        Command::new("xdg-open")
            .arg(folder)
            .spawn()
            .map_err(|e| anyhow!("xdg-open failed: {e}"))?;
        return Ok(());
    }
    #[cfg(target_os = "windows")]
    {
        Command::new("explorer")
            .arg(folder)
            .spawn()
            .map_err(|e| anyhow!("explorer failed: {e}"))?;
        return Ok(());
    }
    #[allow(unreachable_code)]
    Err(anyhow!("当前平台不支持打开目录: {}", folder.display()))
}

pub struct DownloadSummary {
    pub total_files: usize,
    pub total_size: u64,
    pub elapsed_time: std::time::Duration,
    pub success_count: usize,
    pub failed_count: usize,
    pub cancelled_count: usize,
    pub unfinished_count: usize,
}

impl DownloadSummary {
    pub fn from_tasks(tasks: &[TaskProgress], elapsed_time: std::time::Duration) -> Self {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
        Self {
            total_files: tasks.len(),
            total_size: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .map(|t| t.downloaded)
                .sum(),
            elapsed_time,
            success_count: count(TaskStatus::Completed),
            failed_count: count(TaskStatus::Error),
            cancelled_count: count(TaskStatus::Cancelled),
            unfinished_count: tasks.iter().filter(|t| !t.status.is_terminal()).count(),
        }
    }
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n下载摘要:")?;
        writeln!(f, "总文件数: {}", self.total_files)?;
        writeln!(f, "总大小: {}", format_bytes(self.total_size.min(i64::MAX as u64) as i64))?;
        writeln!(f, "耗时: {:.2}秒", self.elapsed_time.as_secs_f64())?;
        writeln!(f, "成功: {}", self.success_count)?;
        writeln!(f, "失败: {}", self.failed_count)?;
        writeln!(f, "取消: {}", self.cancelled_count)?;
        writeln!(f, "未完成: {}", self.unfinished_count)?;
        Ok(())
    }
}
