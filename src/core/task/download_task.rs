use actix::Recipient;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use url::Url;

use crate::core::registry::TaskId;
use super::control::TaskControl;
use super::progress::{ProgressNotice, TaskProgress, UNKNOWN_SIZE};
use super::state::TaskStatus;

/// 每次从响应体读出并写入文件的块大小
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// 单个下载任务：目标地址、保存位置、控制标志和进度
///
/// 任务本身不是 actor：它被线程池的工作线程执行，同时被外部线程通过
/// `pause`/`resume`/`cancel` 控制，所以所有可变状态都放在 watch 通道里。
pub struct DownloadTask {
    id: TaskId,
    url: String,
    dest_dir: PathBuf,
    file_name: String,
    dest_path: PathBuf,
    pub(super) chunk_size: usize,
    pub(super) control: TaskControl,
    progress: watch::Sender<TaskProgress>,
    observer: Option<Recipient<ProgressNotice>>,
    /// 上一次推送的 (百分比, 状态)
    last_pushed: Mutex<Option<(Option<u8>, TaskStatus)>>,
}

impl DownloadTask {
    pub fn new(id: TaskId, url: impl Into<String>, dest_dir: impl Into<PathBuf>) -> Self {
        let url = url.into();
        let dest_dir = dest_dir.into();
        let file_name = file_name_from_url(&url, id);
        let dest_path = dest_dir.join(&file_name);
        let (progress, _rx) = watch::channel(TaskProgress {
            id,
            url: url.clone(),
            file_name: file_name.clone(),
            destination: dest_path.clone(),
            status: TaskStatus::Waiting,
            downloaded: 0,
            total_size: UNKNOWN_SIZE,
            error: None,
            running: false,
        });
        Self {
            id,
            url,
            dest_dir,
            file_name,
            dest_path,
            chunk_size: DEFAULT_CHUNK_SIZE,
            control: TaskControl::new(),
            progress,
            observer: None,
            last_pushed: Mutex::new(None),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// 百分比或状态变化时向 observer 推送一条通知（不等待、不背压）
    pub fn with_observer(mut self, observer: Recipient<ProgressNotice>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn destination_dir(&self) -> &Path {
        &self.dest_dir
    }

    pub fn destination_path(&self) -> &Path {
        &self.dest_path
    }

    pub fn status(&self) -> TaskStatus {
        self.progress.borrow().status
    }

    pub fn snapshot(&self) -> TaskProgress {
        self.progress.borrow().clone()
    }

    /// 订阅进度，只保留最新值
    pub fn subscribe(&self) -> watch::Receiver<TaskProgress> {
        self.progress.subscribe()
    }

    pub fn is_paused(&self) -> bool {
        self.control.flags().paused
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.flags().cancelled
    }

    /// 已被强制中断，工作线程可能还没有退出
    pub fn is_interrupted(&self) -> bool {
        self.control.flags().interrupted
    }

    pub(crate) fn control(&self) -> &TaskControl {
        &self.control
    }

    /// 设置暂停标志；终态任务返回 false
    pub fn pause(&self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        self.control.set_paused(true);
        debug!("[task {}] 请求暂停", self.id);
        true
    }

    pub fn resume(&self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        self.control.set_paused(false);
        debug!("[task {}] 请求恢复", self.id);
        true
    }

    /// 设置取消标志（不可撤销），同时唤醒正在等待或读取的传输循环
    pub fn cancel(&self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        self.control.cancel();
        info!("[task {}] 请求取消", self.id);
        true
    }

    /// 被强制中断而停在 Paused 的任务没有存活的执行，重新入池前在这里复位
    pub(crate) fn restart(&self) -> bool {
        let mut rearmed = false;
        self.update_if(|p| {
            if p.running || p.status != TaskStatus::Paused {
                return false;
            }
            p.status = TaskStatus::Waiting;
            p.downloaded = 0;
            p.total_size = UNKNOWN_SIZE;
            p.error = None;
            rearmed = true;
            true
        });
        if rearmed {
            self.control.rearm();
            info!("[task {}] 重新排队，将从头开始下载", self.id);
        }
        rearmed
    }

    /// 还在队列中就被撤下的任务：取消优先，否则视为被中断而暂停
    pub(crate) fn abandon(&self) {
        let status = if self.is_cancelled() { TaskStatus::Cancelled } else { TaskStatus::Paused };
        self.update_if(|p| {
            if p.running || p.status.is_terminal() {
                return false;
            }
            p.status = status;
            true
        });
    }

    /// 非终态时才允许切换状态
    pub(super) fn set_status(&self, status: TaskStatus) {
        self.update_if(|p| {
            if p.status.is_terminal() || p.status == status {
                return false;
            }
            p.status = status;
            true
        });
    }

    pub(super) fn update(&self, f: impl FnOnce(&mut TaskProgress)) {
        self.progress.send_modify(f);
        self.notify_observer();
    }

    pub(super) fn update_if(&self, f: impl FnOnce(&mut TaskProgress) -> bool) -> bool {
        let modified = self.progress.send_if_modified(f);
        if modified {
            self.notify_observer();
        }
        modified
    }

    fn notify_observer(&self) {
        let Some(observer) = &self.observer else {
            return;
        };
        let (notice, status) = {
            let progress = self.progress.borrow();
            (progress.notice(), progress.status)
        };
        let key = (notice.percent, status);
        let mut last = self.last_pushed.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == Some(key) {
            return;
        }
        *last = Some(key);
        observer.do_send(notice);
    }
}

/// 从 URL 路径的最后一段提取文件名，取不到时使用 `download_<id>`
pub fn file_name_from_url(url: &str, id: TaskId) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed.path_segments()
                .and_then(|segments| segments.last().map(|s| s.to_string()))
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| format!("download_{}", id.0))
}
