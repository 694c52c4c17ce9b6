//! CLI: 命令行接口和参数解析模块
//!
//! ## 主要功能
//!
//! - 命令行参数解析和验证
//! - 配置文件路径管理
//! - URL 列表处理（命令行参数和文件）
//! - 配置文件编辑器集成
//!
//! ## 支持的命令
//!
//! - 基本下载：`taskdown <url>...`
//! - 批量下载：`taskdown -f urls.txt`
//! - 编辑配置：`taskdown -e`
//! - 指定配置：`taskdown -c config.conf <url>`
//! - 限制并发：`taskdown -j 2 <url>...`
//!
//! ## 平台支持
//!
//! - Windows: `%APPDATA%/taskdown/taskdown.conf`
//! - macOS: `~/Library/Application Support/taskdown/taskdown.conf`
//! - Linux: `~/.config/taskdown/taskdown.conf`

use clap::Parser;
use std::env;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::core::error::{DownloadError, DownloadResult};
use crate::utils::validator::validate_urls;

/// 获取平台默认配置文件路径
pub fn default_config_path() -> String {
    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        format!("{}/taskdown/taskdown.conf", appdata)
    }
    #[cfg(target_os = "macos")]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/Library/Application Support/taskdown/taskdown.conf", home)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.config/taskdown/taskdown.conf", home)
    }
}

/// 打开配置文件编辑器
pub fn open_config_in_editor(config_path: &str) {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("notepad").arg(config_path).status().ok();
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg("-e").arg(config_path).status().ok();
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // 优先 xdg-open，否则 nano
        if std::process::Command::new("xdg-open").arg(config_path).status().is_err() {
            let _ = std::process::Command::new("nano").arg(config_path).status();
        }
    }
}

/// 版本与构建信息
pub fn build_info() -> String {
    format!(
        "taskdown {} (git {}, 构建于 {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
    )
}

/// Taskdown 命令行参数
///
/// 示例用法：
///   taskdown https://example.com/a.zip https://example.com/b.zip
///   taskdown -e  # 编辑配置文件
///   taskdown -c /path/to/config.conf -f urls.txt
///
/// 更多用法请加 --help 查看
#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdown",
    author = "panzhifu",
    version = env!("CARGO_PKG_VERSION"),
    about = "一个用 Rust 编写的并发多文件下载管理器",
    long_about = "同时下载多个文件，每个任务都可以单独暂停、恢复、取消。\n\n\
下载过程中的按键：p 暂停全部，r 恢复全部，s 强制停止全部，c 取消全部，o 打开已完成文件所在目录，q 退出。\n\n\
示例：\n  taskdown https://example.com/file.zip\n  taskdown -e\n  taskdown -j 2 -f urls.txt\n"
)]
pub struct Args {
    /// 要下载的URL列表（可同时指定多个）
    #[arg(required = false, help = "要下载的URL列表，可以同时指定多个URL。")]
    pub urls: Vec<String>,

    /// 包含URL列表的文件路径
    #[arg(short, long, help = "包含URL列表的文件路径，每行一个URL，# 开头为注释。")]
    pub file: Option<String>,

    /// 配置文件路径，默认为平台推荐路径
    #[arg(short = 'c', long, default_value_t = default_config_path(), help = "配置文件路径，默认为平台推荐路径。")]
    pub config: String,

    /// 编辑配置文件（-e 或 --edit）
    #[arg(short = 'e', long = "edit", help = "用系统默认编辑器打开配置文件并退出。")]
    pub edit_config: bool,

    /// 指定下载目录
    #[arg(long, short = 'd', help = "指定下载目录，覆盖配置文件中的设置。")]
    pub download_dir: Option<String>,

    /// 同时进行的下载数
    #[arg(long, short = 'j', help = "同时进行的下载数，覆盖配置文件中的设置。")]
    pub jobs: Option<usize>,

    /// 日志级别
    #[arg(long, help = "日志级别：error / warn / info / debug / trace。")]
    pub log_level: Option<String>,

    /// 退出时以 JSON 输出所有任务的最终状态
    #[arg(long, help = "退出时以 JSON 格式输出所有任务的最终状态。")]
    pub json: bool,
}

impl Args {
    /// 解析命令行参数，加载（或创建）配置文件并合并命令行覆盖项
    pub fn parse_args() -> DownloadResult<(Self, Config)> {
        let args = Args::parse();
        let config = args.load_config()?;
        Ok((args, config))
    }

    pub fn load_config(&self) -> DownloadResult<Config> {
        // 不存在时 Config::load 会写入带教程的默认配置
        let mut config = Config::load(&self.config)
            .map_err(|e| DownloadError::config(format!("无法读取配置文件 {}: {}", self.config, e)))?;

        // 合并命令行参数到配置
        config.merge_from_args(self);
        config.validate()?;
        Ok(config)
    }

    // 定义从文件中读取URL的方法
    pub fn get_urls(&self) -> DownloadResult<Vec<String>> {
        let mut urls = Vec::new();
        urls.extend_from_slice(&self.urls);

        // 如果提供了文件，从文件中读取URL
        if let Some(file_path) = &self.file {
            if !Path::new(file_path).exists() {
                return Err(DownloadError::config(format!("URL文件不存在: {}", file_path)));
            }
            let content = fs::read_to_string(file_path)?;

            // 按行读取URL，忽略空行和注释
            for line in content.lines() {
                let line = line.trim();
                if !line.is_empty() && !line.starts_with('#') {
                    urls.push(line.to_string());
                }
            }
        }

        if urls.is_empty() {
            return Err(DownloadError::invalid_url("未提供任何URL。请通过命令行参数或文件提供至少一个URL。"));
        }
        validate_urls(&urls).map_err(|e| DownloadError::invalid_url(e.to_string()))?;

        Ok(urls)
    }
}

// 测试模块
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from([
            "taskdown", "-j", "2", "-d", "/tmp/dl", "--json",
            "https://example.com/a.zip", "https://example.com/b.zip",
        ])
        .unwrap();
        assert_eq!(args.urls.len(), 2);
        assert_eq!(args.jobs, Some(2));
        assert_eq!(args.download_dir.as_deref(), Some("/tmp/dl"));
        assert!(args.json);
        assert!(!args.edit_config);
    }

    #[test]
    fn test_config_loading_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("taskdown.conf");
        let config_path = config_path.to_str().unwrap();

        let args = Args::try_parse_from([
            "taskdown", "-c", config_path, "-j", "7", "https://example.com/file.zip",
        ])
        .unwrap();
        let config = args.load_config().unwrap();
        assert_eq!(config.max_concurrent_downloads, 7);
        assert!(Path::new(config_path).exists());

        let args = Args::try_parse_from(["taskdown", "-c", config_path, "-j", "0"]).unwrap();
        assert!(matches!(args.load_config(), Err(DownloadError::Config(_))));
    }

    #[test]
    fn test_url_file_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let url_file = dir.path().join("urls.txt");
        let content = "# 这是一个注释\nhttps://example.com/file1.zip\n\n  https://example.com/file2.zip  \n";
        fs::write(&url_file, content).unwrap();

        let args = Args::try_parse_from([
            "taskdown", "-f", url_file.to_str().unwrap(), "https://example.com/first.zip",
        ])
        .unwrap();
        let urls = args.get_urls().unwrap();
        assert_eq!(urls, vec![
            "https://example.com/first.zip",
            "https://example.com/file1.zip",
            "https://example.com/file2.zip",
        ]);
    }

    #[test]
    fn test_url_errors() {
        let args = Args::try_parse_from(["taskdown"]).unwrap();
        assert!(matches!(args.get_urls(), Err(DownloadError::InvalidUrl(_))));

        let args = Args::try_parse_from(["taskdown", "ftp://example.com/file"]).unwrap();
        assert!(matches!(args.get_urls(), Err(DownloadError::InvalidUrl(_))));

        let args = Args::try_parse_from(["taskdown", "-f", "/definitely/missing/urls.txt"]).unwrap();
        assert!(args.get_urls().is_err());
    }
}
