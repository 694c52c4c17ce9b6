use bytes::Bytes;
use futures::StreamExt;
use log::{debug, error, info, warn};
use std::io;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::core::error::{DownloadError, DownloadResult};
use super::control::ControlWatcher;
use super::download_task::DownloadTask;
use super::progress::UNKNOWN_SIZE;
use super::state::TaskStatus;
use super::transport::{BodyStream, Transport};

impl DownloadTask {
    /// 在当前工作线程上执行一次完整的下载，返回时任务已处于最终状态
    ///
    /// 同一时刻只允许一个执行，重复调用或对终态任务调用直接返回。
    pub async fn start(&self, transport: &dyn Transport) {
        let claimed = self.update_if(|p| {
            if p.running || p.status.is_terminal() {
                return false;
            }
            p.running = true;
            true
        });
        if !claimed {
            warn!("[task {}] 任务已在执行或已结束，忽略本次启动", self.id());
            return;
        }

        info!("[task {}] 开始下载: {}", self.id(), self.url());
        let mut watcher = self.control.watch();
        let mut file = None;
        let outcome = self.transfer(transport, &mut watcher, &mut file).await;
        self.finish(outcome, file).await;
    }

    async fn transfer(
        &self,
        transport: &dyn Transport,
        watcher: &mut ControlWatcher,
        file: &mut Option<File>,
    ) -> DownloadResult<()> {
        self.set_status(TaskStatus::Connecting);

        let total = match watcher.until_halted(transport.probe(self.url())).await? {
            Ok(Some(size)) => i64::try_from(size).unwrap_or(UNKNOWN_SIZE),
            Ok(None) => UNKNOWN_SIZE,
            Err(e) => {
                warn!("[task {}] 预探测失败，按未知大小继续: {}", self.id(), e);
                UNKNOWN_SIZE
            }
        };
        self.update(|p| p.total_size = total);

        let mut body = watcher.until_halted(transport.open(self.url())).await??;

        tokio::fs::create_dir_all(self.destination_dir()).await?;
        let out = file.insert(File::create(self.destination_path()).await?);
        debug!("[task {}] 已创建文件 {}", self.id(), self.destination_path().display());

        self.set_status(TaskStatus::Downloading);
        let mut pending = Bytes::new();
        while let Some(piece) = self.next_chunk(&mut body, &mut pending, watcher).await? {
            // 写入前先检查取消，再检查暂停
            let parked = watcher
                .wait_while_paused(|| self.set_status(TaskStatus::Paused))
                .await?;
            if parked {
                self.set_status(TaskStatus::Downloading);
            }
            out.write_all(&piece).await?;
            self.record_progress(piece.len());
        }
        out.flush().await?;
        Ok(())
    }

    /// 按 chunk_size 切分响应体，流结束时返回 None
    async fn next_chunk(
        &self,
        body: &mut BodyStream,
        pending: &mut Bytes,
        watcher: &mut ControlWatcher,
    ) -> DownloadResult<Option<Bytes>> {
        while pending.is_empty() {
            match watcher.until_halted(body.next()).await? {
                Some(chunk) => *pending = chunk?,
                None => return Ok(None),
            }
        }
        let len = pending.len().min(self.chunk_size);
        Ok(Some(pending.split_to(len)))
    }

    fn record_progress(&self, written: usize) {
        self.update(|p| {
            p.downloaded += written as u64;
            // 服务器报告的大小偏小时以实际写入为准
            if p.total_known() && p.downloaded > p.total_size as u64 {
                p.total_size = p.downloaded as i64;
            }
        });
    }

    async fn finish(&self, outcome: DownloadResult<()>, file: Option<File>) {
        let created = file.is_some();
        // 最后一次写入可能还在后台线程上执行，落盘之后再决定最终状态
        let flushed = match file {
            Some(mut file) => file.flush().await,
            None => Ok(()),
        };

        let (mut status, mut error, discard) = match outcome {
            Ok(()) => (TaskStatus::Completed, None, false),
            Err(DownloadError::Cancelled) => {
                let progress = self.snapshot();
                if progress.total_known() && progress.downloaded >= progress.total_size as u64 {
                    (TaskStatus::Completed, None, false)
                } else {
                    (TaskStatus::Cancelled, None, true)
                }
            }
            Err(DownloadError::Interrupted) => (TaskStatus::Paused, None, true),
            Err(e) if self.is_cancelled() => {
                debug!("[task {}] 取消后出现错误: {}", self.id(), e);
                (TaskStatus::Cancelled, None, true)
            }
            Err(e) => (TaskStatus::Error, Some(e.to_string()), false),
        };

        if let Err(e) = flushed {
            if status == TaskStatus::Completed {
                status = TaskStatus::Error;
                error = Some(DownloadError::Io(e).to_string());
            } else {
                warn!("[task {}] 写入文件失败: {}", self.id(), e);
            }
        }

        if discard && created {
            match tokio::fs::remove_file(self.destination_path()).await {
                Ok(()) => debug!("[task {}] 已删除未完成的文件", self.id()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("[task {}] 删除未完成的文件失败: {}", self.id(), e),
            }
        }

        match (&status, &error) {
            (TaskStatus::Error, Some(msg)) => error!("[task {}] 下载失败: {}", self.id(), msg),
            _ => info!("[task {}] 下载结束: {}", self.id(), status),
        }

        self.update(|p| {
            p.status = status;
            p.error = error;
            p.running = false;
        });
    }
}
