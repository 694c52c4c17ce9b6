use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// 任务控制标志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlags {
    pub paused: bool,
    /// 只能从 false 变为 true
    pub cancelled: bool,
    /// 线程池强制中断
    pub interrupted: bool,
}

/// 让传输循环立即退出的原因，取消优先于中断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    Cancelled,
    Interrupted,
}

impl ControlFlags {
    pub fn halt(&self) -> Option<Halt> {
        if self.cancelled {
            Some(Halt::Cancelled)
        } else if self.interrupted {
            Some(Halt::Interrupted)
        } else {
            None
        }
    }
}

/// 控制端：由外部线程写入，写入立即对工作线程可见并唤醒等待方
#[derive(Debug, Clone)]
pub struct TaskControl {
    tx: Arc<watch::Sender<ControlFlags>>,
}

impl Default for TaskControl {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlFlags::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn flags(&self) -> ControlFlags {
        *self.tx.borrow()
    }

    pub fn set_paused(&self, paused: bool) {
        self.tx.send_if_modified(|flags| {
            let changed = flags.paused != paused;
            flags.paused = paused;
            changed
        });
    }

    pub fn cancel(&self) {
        self.tx.send_if_modified(|flags| {
            let changed = !flags.cancelled;
            flags.cancelled = true;
            changed
        });
    }

    pub fn interrupt(&self) {
        self.tx.send_if_modified(|flags| {
            let changed = !flags.interrupted;
            flags.interrupted = true;
            changed
        });
    }

    /// 重新入池前清除暂停与中断标志，取消标志保持不变
    pub fn rearm(&self) {
        self.tx.send_modify(|flags| {
            flags.paused = false;
            flags.interrupted = false;
        });
    }

    pub fn watch(&self) -> ControlWatcher {
        ControlWatcher { rx: self.tx.subscribe() }
    }
}

/// 工作线程持有的观察端
pub struct ControlWatcher {
    rx: watch::Receiver<ControlFlags>,
}

impl ControlWatcher {
    pub fn current(&mut self) -> ControlFlags {
        *self.rx.borrow_and_update()
    }

    /// 暂停等待：直到暂停解除（返回 Ok）或者被取消/中断（返回 Err）
    ///
    /// `on_park` 在第一次进入等待时调用一次，返回值表示是否真的等待过。
    pub async fn wait_while_paused(&mut self, mut on_park: impl FnMut()) -> Result<bool, Halt> {
        let mut parked = false;
        loop {
            let flags = self.current();
            if let Some(halt) = flags.halt() {
                return Err(halt);
            }
            if !flags.paused {
                return Ok(parked);
            }
            if !parked {
                parked = true;
                on_park();
            }
            if self.rx.changed().await.is_err() {
                // 控制端已释放，不会再有人恢复
                return Err(Halt::Interrupted);
            }
        }
    }

    /// 让一个阻塞操作（探测、连接、读流）与控制信号竞争，取消或中断时立即返回
    pub async fn until_halted<F: Future>(&mut self, fut: F) -> Result<F::Output, Halt> {
        tokio::pin!(fut);
        loop {
            if let Some(halt) = self.current().halt() {
                return Err(halt);
            }
            tokio::select! {
                out = &mut fut => return Ok(out),
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        return Ok(fut.await);
                    }
                }
            }
        }
    }
}
