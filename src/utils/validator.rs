use anyhow::Result;
use std::path::Path;
use url::Url;

/// 只接受带主机名的 http / https 地址
pub fn is_valid_url(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

pub fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        anyhow::bail!("URL 不能为空");
    }
    if !is_valid_url(url) {
        anyhow::bail!("无效的URL（仅支持 http/https）: {}", url);
    }
    Ok(())
}

pub fn validate_urls(urls: &[String]) -> Result<()> {
    if urls.is_empty() {
        anyhow::bail!("URL列表不能为空");
    }
    urls.iter().try_for_each(|url| validate_url(url))
}

pub fn validate_jobs(jobs: usize) -> Result<()> {
    if jobs == 0 {
        anyhow::bail!("并发数必须大于0");
    }
    Ok(())
}

/// 下载目录可以不存在（下载时创建），但不能是一个已存在的文件
pub fn validate_download_dir(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        anyhow::bail!("下载目录不能为空");
    }
    if Path::new(path).is_file() {
        anyhow::bail!("下载目录是一个文件: {}", path);
    }
    Ok(())
}
