use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use crate::core::error::{DownloadError, DownloadResult};
use crate::core::task::DEFAULT_CHUNK_SIZE;
use crate::utils::validator::{validate_download_dir, validate_jobs};

/// 配置结构体
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 默认下载目录
    pub download_dir: String,
    /// 最大并发下载数（工作线程数）
    pub max_concurrent_downloads: usize,
    /// 每次写入文件的块大小（字节）
    pub chunk_size: usize,
    /// 网络超时时间（秒）
    pub timeout: u64,
    /// User-Agent
    pub user_agent: String,
    /// 日志级别：error / warn / info / debug / trace
    pub log_level: String,
    /// 日志文件，不设置时输出到标准错误
    pub log_file: Option<String>,
    /// 日志文件超过该大小（字节）时在启动时轮转
    pub log_max_size: u64,
    /// 进度刷新间隔（毫秒）
    pub refresh_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: "./downloads".to_string(),
            max_concurrent_downloads: 4,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: 30,
            user_agent: format!("Taskdown/{}", env!("CARGO_PKG_VERSION")),
            log_level: "info".to_string(),
            log_file: None,
            log_max_size: 10 * 1024 * 1024,
            refresh_interval_ms: 200,
        }
    }
}

impl Config {
    /// 加载配置文件，不存在时写入带教程的默认配置
    pub fn load(path: &str) -> DownloadResult<Self> {
        if Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            match toml::from_str(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    log::warn!("配置文件格式错误: {}，将使用默认配置", e);
                    Ok(Config::default())
                }
            }
        } else {
            let config = Config::default();
            config.save_with_tutorial(path)?;
            Ok(config)
        }
    }

    /// 保存带教程的配置文件（唯一写入方法）
    pub fn save_with_tutorial(&self, path: &str) -> DownloadResult<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let config_content = toml::to_string_pretty(self)
            .map_err(|e| DownloadError::config(format!("无法序列化配置: {}", e)))?;
        let full_content = format!("{}\n{}", Config::generate_tutorial_content(), config_content);
        fs::write(path, full_content)?;
        Ok(())
    }

    fn generate_tutorial_content() -> String {
        r#"# Taskdown 配置文件
# ====================
#
# 这是一个 TOML 格式的配置文件，用于配置 Taskdown 下载管理器的行为。
#
# 配置文件位置：
# - Windows: %APPDATA%/taskdown/taskdown.conf
# - macOS: ~/Library/Application Support/taskdown/taskdown.conf
# - Linux: ~/.config/taskdown/taskdown.conf
#
# 命令行参数会覆盖配置文件中的设置，优先级：命令行 > 配置文件 > 默认值
#
# 使用示例：
#   taskdown https://example.com/file.zip                       # 使用默认配置
#   taskdown -j 2 https://example.com/a.zip https://example.com/b.zip   # 最多同时下载2个
#   taskdown -d /path/to/downloads https://example.com/file.zip # 指定下载目录
#   taskdown -f urls.txt                                        # 从文件读取URL，每行一个
#
# 下载过程中的按键：
#   p 暂停全部    r 恢复全部    s 强制停止全部
#   c 取消全部    o 打开已完成文件所在目录    q 退出
#
# ==================== 配置项说明 ====================
#
# download_dir              下载目录，支持相对路径和绝对路径
# max_concurrent_downloads  同时进行的下载任务数，超出的任务按添加顺序排队
# chunk_size                每次写入文件的块大小（字节），暂停和取消在块之间生效
# timeout                   网络超时时间（秒）
# user_agent                某些服务器可能需要特定的 User-Agent
# log_level                 error / warn / info / debug / trace，RUST_LOG 环境变量优先
# log_file                  日志文件路径，不设置时日志输出到终端
# log_max_size              日志文件超过该大小（字节）时，启动时改名为 .backup
# refresh_interval_ms       进度条刷新间隔（毫秒）
#
# ==================== 故障排除 ====================
#
# 问题：强制停止后再恢复，进度从 0 开始
# 说明：强制停止会删除未完成的文件，恢复时重新下载
#
# 问题：进度显示为“未知”
# 说明：服务器没有返回文件大小，下载仍会正常完成
"#.to_string()
    }

    /// 校验配置合法性
    pub fn validate(&self) -> DownloadResult<()> {
        validate_jobs(self.max_concurrent_downloads)
            .and_then(|_| validate_download_dir(&self.download_dir))
            .map_err(|e| DownloadError::config(e.to_string()))?;
        if self.timeout == 0 {
            return Err(DownloadError::config("超时时间必须大于0"));
        }
        if self.chunk_size == 0 {
            return Err(DownloadError::config("分块大小必须大于0"));
        }
        if self.refresh_interval_ms == 0 {
            return Err(DownloadError::config("刷新间隔必须大于0"));
        }
        if crate::utils::logger::parse_level(&self.log_level).is_none() {
            return Err(DownloadError::config(format!("未知的日志级别: {}", self.log_level)));
        }
        Ok(())
    }

    /// 合并命令行参数到配置
    pub fn merge_from_args(&mut self, args: &crate::cli::Args) {
        if let Some(dir) = &args.download_dir {
            self.download_dir = dir.clone();
        }
        if let Some(jobs) = args.jobs {
            self.max_concurrent_downloads = jobs;
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
    }

    /// 获取配置摘要信息
    pub fn get_summary(&self) -> String {
        format!(
            "配置摘要:\n\
            - 下载目录: {}\n\
            - 并发数: {}\n\
            - 分块大小: {} 字节\n\
            - 超时时间: {} 秒\n\
            - 日志: {} ({})",
            self.download_dir,
            self.max_concurrent_downloads,
            self.chunk_size,
            self.timeout,
            self.log_level,
            self.log_file.as_deref().unwrap_or("终端"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_concurrent_downloads, 4);
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.timeout, 30);
        assert!(config.log_file.is_none());
        assert_ok!(config.validate());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.max_concurrent_downloads = 0;
        assert_err!(config.validate());

        let mut config = Config::default();
        config.chunk_size = 0;
        assert_err!(config.validate());

        let mut config = Config::default();
        config.log_level = "loud".to_string();
        assert_err!(config.validate());

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("downloads");
        fs::write(&file, b"not a dir").unwrap();
        let mut config = Config::default();
        config.download_dir = file.to_str().unwrap().to_string();
        assert!(matches!(config.validate(), Err(DownloadError::Config(_))));
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("taskdown.conf");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.max_concurrent_downloads = 2;
        config.log_file = Some("logs/taskdown.log".to_string());
        config.save_with_tutorial(path).expect("保存带教程的配置失败");

        let loaded = Config::load(path).expect("加载配置失败");
        assert_eq!(loaded, config);

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("Taskdown 配置文件"));
        assert!(content.contains("故障排除"));
    }

    #[test]
    fn test_missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskdown.conf");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskdown.conf");
        fs::write(&path, "max_concurrent_downloads = 8\n").unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.max_concurrent_downloads, 8);
        assert_eq!(config.chunk_size, 4096);
    }

    #[test]
    fn test_config_summary() {
        let summary = Config::default().get_summary();
        assert!(summary.contains("配置摘要"));
        assert!(summary.contains("下载目录"));
        assert!(summary.contains("终端"));
    }
}
