//! 固定数量工作线程的任务池
//!
//! 每个工作槽位是一个 `Arbiter`（独立线程 + 事件循环），任务以本地 future 的形式
//! 在槽位上运行，直到 future 结束才释放槽位（暂停期间也占用）。
//! 超出槽位数的任务按到达顺序排队。

use actix_rt::{Arbiter, ArbiterHandle};
use log::{debug, info, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::task::control::TaskControl;
use crate::core::task::{DownloadTask, Transport};

/// 提交到任务池后得到的执行句柄，用于强制停止
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    ticket: u64,
    control: TaskControl,
}

impl ExecutionHandle {
    pub(crate) fn new(ticket: u64, control: TaskControl) -> Self {
        Self { ticket, control }
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }
}

struct Job {
    ticket: u64,
    task: Arc<DownloadTask>,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<usize>,
    queue: VecDeque<Job>,
    /// ticket -> 槽位
    running: HashMap<u64, usize>,
    next_ticket: u64,
}

struct PoolInner {
    workers: Vec<ArbiterHandle>,
    arbiters: Mutex<Vec<Arbiter>>,
    state: Mutex<PoolState>,
    transport: Arc<dyn Transport>,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let arbiters = self.arbiters.get_mut().unwrap_or_else(PoisonError::into_inner);
        for arbiter in arbiters.drain(..) {
            arbiter.stop();
        }
    }
}

#[derive(Clone)]
pub struct TaskPool {
    inner: Arc<PoolInner>,
}

impl TaskPool {
    /// 创建任务池，必须在 actix System 内调用
    pub fn new(workers: usize, transport: Arc<dyn Transport>) -> Self {
        let workers = workers.max(1);
        let arbiters: Vec<Arbiter> = (0..workers).map(|_| Arbiter::new()).collect();
        let handles = arbiters.iter().map(|arbiter| arbiter.handle()).collect();
        let state = PoolState {
            // 从 0 号槽位开始分配
            idle: (0..workers).rev().collect(),
            ..Default::default()
        };
        info!("任务池已启动，工作线程数: {}", workers);
        Self {
            inner: Arc::new(PoolInner {
                workers: handles,
                arbiters: Mutex::new(arbiters),
                state: Mutex::new(state),
                transport,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 提交任务：有空闲槽位立即开始，否则排队
    pub fn submit(&self, task: Arc<DownloadTask>) -> ExecutionHandle {
        let handle_control = task.control().clone();
        let (ticket, dispatch) = {
            let mut state = self.state();
            state.next_ticket += 1;
            let ticket = state.next_ticket;
            let job = Job { ticket, task };
            match state.idle.pop() {
                Some(worker) => {
                    state.running.insert(ticket, worker);
                    (ticket, Some((worker, job)))
                }
                None => {
                    debug!("[pool] 没有空闲槽位，任务 {} 排队等待", job.task.id());
                    state.queue.push_back(job);
                    (ticket, None)
                }
            }
        };
        if let Some((worker, job)) = dispatch {
            self.dispatch(worker, job);
        }
        ExecutionHandle::new(ticket, handle_control)
    }

    fn dispatch(&self, worker: usize, job: Job) {
        let Job { ticket, task } = job;
        debug!("[pool] 槽位 {} 开始执行任务 {}", worker, task.id());
        let pool = self.clone();
        let transport = self.inner.transport.clone();
        let abandoned = task.clone();
        let sent = self.inner.workers[worker].spawn_fn(move || {
            actix_rt::spawn(async move {
                task.start(transport.as_ref()).await;
                pool.finish(worker, ticket);
            });
        });
        if !sent {
            warn!("[pool] 槽位 {} 已停止，任务 {} 无法执行", worker, abandoned.id());
            self.state().running.remove(&ticket);
            abandoned.abandon();
        }
    }

    /// 任务 future 结束：槽位交给队首任务，或者回到空闲列表
    fn finish(&self, worker: usize, ticket: u64) {
        let next = {
            let mut state = self.state();
            state.running.remove(&ticket);
            match state.queue.pop_front() {
                Some(job) => {
                    state.running.insert(job.ticket, worker);
                    Some(job)
                }
                None => {
                    state.idle.push(worker);
                    None
                }
            }
        };
        if let Some(job) = next {
            self.dispatch(worker, job);
        }
    }

    /// 强制中断：正在执行的任务尽快退出，尚未开始的任务直接撤出队列
    ///
    /// 返回该执行是否仍在排队或运行。
    pub fn force_stop(&self, handle: &ExecutionHandle) -> bool {
        handle.control.interrupt();
        let running = self.state().running.contains_key(&handle.ticket);
        self.withdraw(handle) || running
    }

    /// 把尚未开始的任务撤出队列，返回是否撤出
    pub fn withdraw(&self, handle: &ExecutionHandle) -> bool {
        let job = {
            let mut state = self.state();
            let index = state.queue.iter().position(|job| job.ticket == handle.ticket);
            index.and_then(|index| state.queue.remove(index))
        };
        match job {
            Some(job) => {
                debug!("[pool] 任务 {} 已撤出队列", job.task.id());
                job.task.abandon();
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.state().running.len()
    }

    pub fn queued_count(&self) -> usize {
        self.state().queue.len()
    }

    pub fn worker_count(&self) -> usize {
        self.inner.workers.len()
    }

    /// 停止所有工作线程，排队中的任务按被中断处理
    pub fn shutdown(&self) {
        let queued: Vec<Job> = self.state().queue.drain(..).collect();
        for job in queued {
            job.task.control().interrupt();
            job.task.abandon();
        }
        let mut arbiters = self.inner.arbiters.lock().unwrap_or_else(PoisonError::into_inner);
        for arbiter in arbiters.drain(..) {
            arbiter.stop();
        }
        info!("任务池已关闭");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::TaskId;
    use crate::core::task::transport::testing::{chunk, wait_for, ScriptedTransport};
    use crate::core::task::TaskStatus;
    use std::time::Duration;

    fn task(id: u64, dir: &std::path::Path) -> Arc<DownloadTask> {
        Arc::new(DownloadTask::new(TaskId(id), format!("http://host/{}.bin", id), dir))
    }

    async fn wait_status(task: &DownloadTask, status: TaskStatus) {
        let mut rx = task.subscribe();
        wait_for(&mut rx, status.label(), |p| p.status == status).await;
    }

    #[actix_rt::test]
    async fn test_single_slot_runs_in_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        let pool = TaskPool::new(1, transport.clone());
        let tasks: Vec<_> = (1..=3).map(|id| task(id, dir.path())).collect();
        let feeds: Vec<_> = tasks.iter().map(|t| transport.body(t.url(), Some(16))).collect();
        for t in &tasks {
            pool.submit(t.clone());
        }

        wait_status(&tasks[0], TaskStatus::Downloading).await;
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.queued_count(), 2);
        assert_eq!(tasks[1].status(), TaskStatus::Waiting);
        assert_eq!(tasks[2].status(), TaskStatus::Waiting);

        for (t, feed) in tasks.iter().zip(feeds) {
            feed.unbounded_send(chunk(16, 1)).unwrap();
            drop(feed);
            wait_status(t, TaskStatus::Completed).await;
        }

        let expected: Vec<String> = tasks.iter().map(|t| t.url().to_string()).collect();
        assert_eq!(transport.opened(), expected);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.active_count(), 0);
        pool.shutdown();
    }

    #[actix_rt::test]
    async fn test_concurrency_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        let pool = TaskPool::new(2, transport.clone());
        let tasks: Vec<_> = (1..=3).map(|id| task(id, dir.path())).collect();
        let feeds: Vec<_> = tasks.iter().map(|t| transport.body(t.url(), Some(8))).collect();
        for t in &tasks {
            pool.submit(t.clone());
        }

        wait_status(&tasks[0], TaskStatus::Downloading).await;
        wait_status(&tasks[1], TaskStatus::Downloading).await;
        assert_eq!(pool.worker_count(), 2);
        assert_eq!(pool.active_count(), 2);
        assert_eq!(pool.queued_count(), 1);
        assert_eq!(tasks[2].status(), TaskStatus::Waiting);

        // 暂停的任务继续占用槽位
        tasks[0].pause();
        feeds[0].unbounded_send(chunk(8, 1)).unwrap();
        wait_status(&tasks[0], TaskStatus::Paused).await;
        assert_eq!(tasks[2].status(), TaskStatus::Waiting);

        drop(feeds);
        tasks[0].resume();
        for t in &tasks {
            wait_status(t, TaskStatus::Completed).await;
        }
        pool.shutdown();
    }

    #[actix_rt::test]
    async fn test_force_stop_withdraws_queued_task() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        let pool = TaskPool::new(1, transport.clone());
        let first = task(1, dir.path());
        let second = task(2, dir.path());
        let first_feed = transport.body(first.url(), Some(4));
        let _second_feed = transport.body(second.url(), Some(4));

        pool.submit(first.clone());
        let handle = pool.submit(second.clone());
        wait_status(&first, TaskStatus::Downloading).await;

        assert!(pool.force_stop(&handle));
        assert_eq!(second.status(), TaskStatus::Paused);
        assert_eq!(pool.queued_count(), 0);

        drop(first_feed);
        wait_status(&first, TaskStatus::Completed).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.opened(), vec![first.url().to_string()]);
        assert!(!pool.force_stop(&handle));
        pool.shutdown();
    }

    #[actix_rt::test]
    async fn test_force_stop_frees_slot_for_next_task() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        let pool = TaskPool::new(1, transport.clone());
        let first = task(1, dir.path());
        let second = task(2, dir.path());
        let first_feed = transport.body(first.url(), Some(8));
        let second_feed = transport.body(second.url(), Some(8));

        let handle = pool.submit(first.clone());
        pool.submit(second.clone());
        first_feed.unbounded_send(chunk(4, 1)).unwrap();
        wait_for(&mut first.subscribe(), "写入部分数据", |p| p.downloaded == 4).await;

        assert!(pool.force_stop(&handle));
        wait_status(&first, TaskStatus::Paused).await;
        assert!(!first.destination_path().exists());

        wait_status(&second, TaskStatus::Downloading).await;
        second_feed.unbounded_send(chunk(8, 2)).unwrap();
        drop(second_feed);
        wait_status(&second, TaskStatus::Completed).await;
        pool.shutdown();
    }
}
