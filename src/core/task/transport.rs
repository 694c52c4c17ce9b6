//! 传输层：预探测文件大小 + 流式 GET
//!
//! `awc` 的请求与响应都不是 `Send` 的，只能在工作线程（Arbiter）内部使用，
//! 所以 trait 的 future 不要求 `Send`，而实现本身需要 `Send + Sync` 以便在线程池间共享。

use async_trait::async_trait;
use awc::http::header;
use bytes::Bytes;
use futures::stream::{LocalBoxStream, StreamExt};
use std::time::Duration;

use crate::config::Config;
use crate::core::error::{DownloadError, DownloadResult};

/// 响应体字节流
pub type BodyStream = LocalBoxStream<'static, DownloadResult<Bytes>>;

#[async_trait(?Send)]
pub trait Transport: Send + Sync {
    /// 预探测（HEAD），返回服务器报告的大小；没有 Content-Length 时返回 None
    async fn probe(&self, url: &str) -> DownloadResult<Option<u64>>;

    /// 打开传输连接，返回响应体流
    async fn open(&self, url: &str) -> DownloadResult<BodyStream>;
}

/// 基于 awc 的 HTTP 传输
#[derive(Debug, Clone)]
pub struct AwcTransport {
    timeout: Duration,
    user_agent: String,
}

impl AwcTransport {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self { timeout, user_agent: user_agent.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Duration::from_secs(config.timeout), config.user_agent.clone())
    }

    // awc::Client 不能跨线程，每次请求在当前工作线程上创建
    fn client(&self) -> awc::Client {
        awc::Client::builder()
            .timeout(self.timeout)
            .add_default_header((header::USER_AGENT, self.user_agent.clone()))
            .finish()
    }
}

#[async_trait(?Send)]
impl Transport for AwcTransport {
    async fn probe(&self, url: &str) -> DownloadResult<Option<u64>> {
        let response = self.client()
            .head(url)
            .no_decompress()
            .send()
            .await
            .map_err(|e| DownloadError::Probe(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DownloadError::Probe(format!("服务器返回状态码 {}", response.status())));
        }

        Ok(response.headers().get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok()))
    }

    async fn open(&self, url: &str) -> DownloadResult<BodyStream> {
        let response = self.client()
            .get(url)
            .no_decompress()
            .send()
            .await
            .map_err(|e| DownloadError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DownloadError::Connect(format!("服务器返回状态码 {}", response.status())));
        }

        let body = response.map(|chunk| chunk.map_err(|e| DownloadError::Stream(e.to_string())));
        Ok(body.boxed_local())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! 测试用的脚本化传输：响应体由测试代码逐块喂入

    use super::*;
    use futures::channel::mpsc;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::watch;

    use crate::core::task::progress::TaskProgress;

    #[derive(Default)]
    struct Route {
        probe: Option<u64>,
        bodies: VecDeque<mpsc::UnboundedReceiver<DownloadResult<Bytes>>>,
    }

    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        routes: Mutex<HashMap<String, Route>>,
        opened: Mutex<Vec<String>>,
    }

    pub(crate) type BodyFeed = mpsc::UnboundedSender<DownloadResult<Bytes>>;

    impl ScriptedTransport {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// 为 url 准备一次响应；`probe` 为 None 时预探测失败
        pub(crate) fn body(&self, url: &str, probe: Option<u64>) -> BodyFeed {
            let (tx, rx) = mpsc::unbounded();
            let mut routes = self.routes.lock().unwrap();
            let route = routes.entry(url.to_string()).or_default();
            route.probe = probe;
            route.bodies.push_back(rx);
            tx
        }

        pub(crate) fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().clone()
        }
    }

    #[async_trait(?Send)]
    impl Transport for ScriptedTransport {
        async fn probe(&self, url: &str) -> DownloadResult<Option<u64>> {
            let routes = self.routes.lock().unwrap();
            match routes.get(url).and_then(|route| route.probe) {
                Some(size) => Ok(Some(size)),
                None => Err(DownloadError::Probe("HEAD 405".to_string())),
            }
        }

        async fn open(&self, url: &str) -> DownloadResult<BodyStream> {
            self.opened.lock().unwrap().push(url.to_string());
            let body = self.routes.lock().unwrap()
                .get_mut(url)
                .and_then(|route| route.bodies.pop_front());
            match body {
                Some(rx) => Ok(rx.boxed_local()),
                None => Err(DownloadError::Connect("connection refused".to_string())),
            }
        }
    }

    pub(crate) fn chunk(len: usize, fill: u8) -> DownloadResult<Bytes> {
        Ok(Bytes::from(vec![fill; len]))
    }

    /// 等待进度满足条件，超时则测试失败
    pub(crate) async fn wait_for(
        rx: &mut watch::Receiver<TaskProgress>,
        what: &str,
        pred: impl FnMut(&TaskProgress) -> bool,
    ) -> TaskProgress {
        let outcome = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
            .await
            .map(|res| res.map(|progress| TaskProgress::clone(&progress)));
        match outcome {
            Ok(Ok(progress)) => progress,
            Ok(Err(_)) => panic!("进度通道已关闭: {}", what),
            Err(_) => panic!("等待超时: {} (当前 {:?})", what, *rx.borrow()),
        }
    }
}
