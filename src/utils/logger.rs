use anyhow::{Context, Result};
use chrono::Local; // 用于获取本地时间
use log::LevelFilter; // 用于设置日志级别
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// 解析日志级别字符串
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// 日志文件超过 max_size 时改名为 `<file>.backup`，返回是否发生了轮转
pub fn rotate_if_needed(file_path: &Path, max_size: u64) -> io::Result<bool> {
    let size = match fs::metadata(file_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if size <= max_size {
        return Ok(false);
    }

    let mut backup = file_path.as_os_str().to_owned();
    backup.push(".backup");
    let backup = Path::new(&backup);
    if backup.exists() {
        fs::remove_file(backup)?;
    }
    fs::rename(file_path, backup)?;
    Ok(true)
}

/// 初始化全局日志
///
/// 格式：`2024-01-01 12:00:00 [INFO] taskdown::core::pool - 消息`。
/// 指定 `file_path` 时写入文件（启动时按大小轮转），否则输出到标准错误。
/// `RUST_LOG` 环境变量会覆盖配置的级别。
pub fn init_logger(level: &str, file_path: Option<&str>, max_size: u64) -> Result<()> {
    let level = parse_level(level).unwrap_or(LevelFilter::Info);

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        });

    if let Some(file_path) = file_path {
        let path = Path::new(file_path);
        // 确保日志目录存在
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("无法创建日志目录: {}", parent.display()))?;
            }
        }
        rotate_if_needed(path, max_size)
            .with_context(|| format!("日志轮转失败: {}", file_path))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("无法打开日志文件: {}", file_path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("日志系统已经初始化")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("info"), Some(LevelFilter::Info));
        assert_eq!(parse_level(" DEBUG "), Some(LevelFilter::Debug));
        assert_eq!(parse_level("warning"), Some(LevelFilter::Warn));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        assert!(!rotate_if_needed(&log, 10).unwrap());

        fs::write(&log, b"short").unwrap();
        assert!(!rotate_if_needed(&log, 10).unwrap());

        fs::write(&log, b"a much longer log line").unwrap();
        assert!(rotate_if_needed(&log, 10).unwrap());
        assert!(!log.exists());
        let backup = dir.path().join("app.log.backup");
        assert_eq!(fs::read(&backup).unwrap(), b"a much longer log line");
    }
}
