use actix::prelude::*;
use log::{debug, info};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::Config;
use crate::core::error::DownloadError;
use crate::core::pool::TaskPool;
use crate::core::registry::{Registry, TaskId};
use crate::core::task::{
    AwcTransport, DownloadTask, ProgressNotice, SizeKind, TaskProgress, TaskStatus, Transport,
};
use crate::utils::validator::is_valid_url;

/// ================== 查询结果结构体 ==================

/// 文件定位信息，界面据此打开所在目录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileLocation {
    pub path: PathBuf,
    pub folder: PathBuf,
    pub exists: bool,
}

/// 各状态的任务数量以及线程池占用情况
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    pub total: usize,
    pub waiting: usize,
    pub connecting: usize,
    pub downloading: usize,
    pub paused: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub error: usize,
    pub active: usize,
    pub queued: usize,
    pub workers: usize,
}

/// ================== 任务创建与控制 ==================

/// 创建下载任务，立即返回，任务以等待状态进入线程池
pub struct CreateDownload {
    pub url: String,
    pub dest_dir: PathBuf,
}
impl Message for CreateDownload { type Result = Result<TaskId, DownloadError>; }
impl Handler<CreateDownload> for DownloadManagerActor {
    type Result = Result<TaskId, DownloadError>;
    fn handle(&mut self, msg: CreateDownload, _ctx: &mut Self::Context) -> Self::Result {
        let url = msg.url.trim();
        if url.is_empty() {
            return Err(DownloadError::invalid_url("URL 不能为空"));
        }
        if !is_valid_url(url) {
            return Err(DownloadError::invalid_url(url));
        }

        let id = self.registry.reserve_id();
        let mut task = DownloadTask::new(id, url, msg.dest_dir)
            .with_chunk_size(self.config.chunk_size);
        if let Some(observer) = &self.observer {
            task = task.with_observer(observer.clone());
        }
        let task = Arc::new(task);
        let handle = self.pool.submit(task.clone());
        info!("创建下载任务 {}: {} -> {}", id, url, task.destination_path().display());
        Ok(self.registry.add(task, handle))
    }
}

/// 暂停指定任务
pub struct PauseTask(pub TaskId);
impl Message for PauseTask { type Result = bool; }
impl Handler<PauseTask> for DownloadManagerActor {
    type Result = bool;
    fn handle(&mut self, msg: PauseTask, _ctx: &mut Self::Context) -> Self::Result {
        self.task(msg.0).map_or(false, |task| task.pause())
    }
}

/// 恢复指定任务；被强制停止的任务重新入池
pub struct ResumeTask(pub TaskId);
impl Message for ResumeTask { type Result = bool; }
impl Handler<ResumeTask> for DownloadManagerActor {
    type Result = bool;
    fn handle(&mut self, msg: ResumeTask, _ctx: &mut Self::Context) -> Self::Result {
        let Some(task) = self.task(msg.0).cloned() else {
            return false;
        };
        if task.restart() {
            let handle = self.pool.submit(task);
            self.registry.replace_handle(msg.0, handle);
            return true;
        }
        // 强制停止后执行还没结束，此时清除暂停标志没有意义，等它停在 Paused 后再恢复
        if task.is_interrupted() {
            debug!("[task {}] 正在停止，暂不能恢复", msg.0);
            return false;
        }
        task.resume()
    }
}

/// 取消指定任务
pub struct CancelTask(pub TaskId);
impl Message for CancelTask { type Result = bool; }
impl Handler<CancelTask> for DownloadManagerActor {
    type Result = bool;
    fn handle(&mut self, msg: CancelTask, _ctx: &mut Self::Context) -> Self::Result {
        let Some(entry) = self.registry.get(msg.0) else {
            return false;
        };
        if !entry.task.cancel() {
            return false;
        }
        // 还没开始执行的任务没有人会把状态推进到已取消
        self.pool.withdraw(&entry.handle);
        entry.task.abandon();
        true
    }
}

/// 强制停止指定任务（不移除）
pub struct StopTask(pub TaskId);
impl Message for StopTask { type Result = bool; }
impl Handler<StopTask> for DownloadManagerActor {
    type Result = bool;
    fn handle(&mut self, msg: StopTask, _ctx: &mut Self::Context) -> Self::Result {
        match self.registry.get(msg.0) {
            Some(entry) if !entry.task.status().is_terminal() => self.pool.force_stop(&entry.handle),
            _ => false,
        }
    }
}

/// 移除指定任务：先取消并强制停止，再移出登记表
pub struct RemoveTask(pub TaskId);
impl Message for RemoveTask { type Result = bool; }
impl Handler<RemoveTask> for DownloadManagerActor {
    type Result = bool;
    fn handle(&mut self, msg: RemoveTask, _ctx: &mut Self::Context) -> Self::Result {
        let Some(entry) = self.registry.remove(msg.0) else {
            return false;
        };
        entry.task.cancel();
        self.pool.force_stop(&entry.handle);
        entry.task.abandon();
        info!("移除下载任务 {}", msg.0);
        true
    }
}

/// ================== 查询 ==================

/// 查询指定任务状态
pub struct QueryStatus(pub TaskId);
impl Message for QueryStatus { type Result = Option<TaskStatus>; }
impl Handler<QueryStatus> for DownloadManagerActor {
    type Result = Option<TaskStatus>;
    fn handle(&mut self, msg: QueryStatus, _ctx: &mut Self::Context) -> Self::Result {
        self.task(msg.0).map(|task| task.status())
    }
}

/// 查询指定任务进度百分比；外层 None 表示任务不存在，内层 None 表示大小未知
pub struct QueryPercent(pub TaskId);
impl Message for QueryPercent { type Result = Option<Option<u8>>; }
impl Handler<QueryPercent> for DownloadManagerActor {
    type Result = Option<Option<u8>>;
    fn handle(&mut self, msg: QueryPercent, _ctx: &mut Self::Context) -> Self::Result {
        self.task(msg.0).map(|task| task.snapshot().percent())
    }
}

/// 查询人类可读的总大小或剩余大小
pub struct QueryHumanSize {
    pub id: TaskId,
    pub which: SizeKind,
}
impl Message for QueryHumanSize { type Result = Option<String>; }
impl Handler<QueryHumanSize> for DownloadManagerActor {
    type Result = Option<String>;
    fn handle(&mut self, msg: QueryHumanSize, _ctx: &mut Self::Context) -> Self::Result {
        self.task(msg.id).map(|task| task.snapshot().human_size(msg.which))
    }
}

/// 查询保存路径
pub struct QueryDestination(pub TaskId);
impl Message for QueryDestination { type Result = Option<PathBuf>; }
impl Handler<QueryDestination> for DownloadManagerActor {
    type Result = Option<PathBuf>;
    fn handle(&mut self, msg: QueryDestination, _ctx: &mut Self::Context) -> Self::Result {
        self.task(msg.0).map(|task| task.destination_path().to_path_buf())
    }
}

/// 查询指定任务的完整快照
pub struct QuerySnapshot(pub TaskId);
impl Message for QuerySnapshot { type Result = Option<TaskProgress>; }
impl Handler<QuerySnapshot> for DownloadManagerActor {
    type Result = Option<TaskProgress>;
    fn handle(&mut self, msg: QuerySnapshot, _ctx: &mut Self::Context) -> Self::Result {
        self.task(msg.0).map(|task| task.snapshot())
    }
}

/// 按创建顺序列出所有任务的快照
pub struct ListTasks;
impl Message for ListTasks { type Result = Vec<TaskProgress>; }
impl Handler<ListTasks> for DownloadManagerActor {
    type Result = MessageResult<ListTasks>;
    fn handle(&mut self, _msg: ListTasks, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.registry.iter().map(|(_, entry)| entry.task.snapshot()).collect())
    }
}

/// 订阅指定任务的进度（只保留最新值）
pub struct WatchTask(pub TaskId);
impl Message for WatchTask { type Result = Option<watch::Receiver<TaskProgress>>; }
impl Handler<WatchTask> for DownloadManagerActor {
    type Result = Option<watch::Receiver<TaskProgress>>;
    fn handle(&mut self, msg: WatchTask, _ctx: &mut Self::Context) -> Self::Result {
        self.task(msg.0).map(|task| task.subscribe())
    }
}

/// 注册进度推送的接收方，对之后创建的任务生效
pub struct Subscribe(pub Recipient<ProgressNotice>);
impl Message for Subscribe { type Result = (); }
impl Handler<Subscribe> for DownloadManagerActor {
    type Result = ();
    fn handle(&mut self, msg: Subscribe, _ctx: &mut Self::Context) {
        debug!("注册进度通知接收方");
        self.observer = Some(msg.0);
    }
}

/// 查询文件位置以及文件是否已经存在
pub struct LocateFile(pub TaskId);
impl Message for LocateFile { type Result = Option<FileLocation>; }
impl Handler<LocateFile> for DownloadManagerActor {
    type Result = Option<FileLocation>;
    fn handle(&mut self, msg: LocateFile, _ctx: &mut Self::Context) -> Self::Result {
        self.task(msg.0).map(|task| FileLocation {
            path: task.destination_path().to_path_buf(),
            folder: task.destination_dir().to_path_buf(),
            exists: task.destination_path().is_file(),
        })
    }
}

/// 统计信息
pub struct GetStats;
impl Message for GetStats { type Result = ManagerStats; }
impl Handler<GetStats> for DownloadManagerActor {
    type Result = MessageResult<GetStats>;
    fn handle(&mut self, _msg: GetStats, _ctx: &mut Self::Context) -> Self::Result {
        let mut stats = ManagerStats {
            total: self.registry.len(),
            active: self.pool.active_count(),
            queued: self.pool.queued_count(),
            workers: self.pool.worker_count(),
            ..Default::default()
        };
        for (_, entry) in self.registry.iter() {
            let counter = match entry.task.status() {
                TaskStatus::Waiting => &mut stats.waiting,
                TaskStatus::Connecting => &mut stats.connecting,
                TaskStatus::Downloading => &mut stats.downloading,
                TaskStatus::Paused => &mut stats.paused,
                TaskStatus::Completed => &mut stats.completed,
                TaskStatus::Cancelled => &mut stats.cancelled,
                TaskStatus::Error => &mut stats.error,
            };
            *counter += 1;
        }
        MessageResult(stats)
    }
}

/// 全局任务管理器 Actor
pub struct DownloadManagerActor {
    config: Config,
    registry: Registry,
    pool: TaskPool,
    observer: Option<Recipient<ProgressNotice>>,
}

impl Actor for DownloadManagerActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("下载管理器已启动，并发数: {}", self.pool.worker_count());
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        for (_, entry) in self.registry.iter() {
            entry.task.cancel();
        }
        self.pool.shutdown();
        info!("下载管理器已停止");
    }
}

impl DownloadManagerActor {
    /// 创建使用 HTTP 传输的任务管理器，必须在 actix System 内调用
    pub fn new(config: Config) -> Self {
        let transport = Arc::new(AwcTransport::from_config(&config));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        let pool = TaskPool::new(config.max_concurrent_downloads, transport);
        Self {
            config,
            registry: Registry::new(),
            pool,
            observer: None,
        }
    }

    fn task(&self, id: TaskId) -> Option<&Arc<DownloadTask>> {
        self.registry.get(id).map(|entry| &entry.task)
    }
}
