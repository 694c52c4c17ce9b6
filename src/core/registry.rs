use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::pool::ExecutionHandle;
use crate::core::task::DownloadTask;

/// 任务标识，单调递增，永不复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 登记表中的一项：任务本身 + 它在线程池中的执行句柄
pub struct Entry {
    pub task: Arc<DownloadTask>,
    pub handle: ExecutionHandle,
}

/// 任务登记表，按 id 顺序（即创建顺序）遍历
#[derive(Default)]
pub struct Registry {
    next_id: u64,
    entries: BTreeMap<TaskId, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预留下一个 id（任务对象需要在入表前就知道自己的 id）
    pub fn reserve_id(&mut self) -> TaskId {
        self.next_id += 1;
        TaskId(self.next_id)
    }

    pub fn add(&mut self, task: Arc<DownloadTask>, handle: ExecutionHandle) -> TaskId {
        let id = task.id();
        self.next_id = self.next_id.max(id.0);
        self.entries.insert(id, Entry { task, handle });
        id
    }

    pub fn get(&self, id: TaskId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    /// 只移出登记表，不会停止执行
    pub fn remove(&mut self, id: TaskId) -> Option<Entry> {
        self.entries.remove(&id)
    }

    pub fn replace_handle(&mut self, id: TaskId, handle: ExecutionHandle) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.handle = handle;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &Entry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::control::TaskControl;

    fn entry(registry: &mut Registry, ticket: u64) -> TaskId {
        let id = registry.reserve_id();
        let task = Arc::new(DownloadTask::new(id, format!("http://host/{}.bin", ticket), "/tmp"));
        let handle = ExecutionHandle::new(ticket, TaskControl::new());
        registry.add(task, handle)
    }

    #[test]
    fn test_ids_are_monotonic_and_not_reused() {
        let mut registry = Registry::new();
        let a = entry(&mut registry, 1);
        let b = entry(&mut registry, 2);
        assert!(a < b);

        assert!(registry.remove(b).is_some());
        let c = entry(&mut registry, 3);
        assert!(c > b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_iteration_follows_creation_order() {
        let mut registry = Registry::new();
        let ids: Vec<_> = (0..5).map(|n| entry(&mut registry, n)).collect();
        let seen: Vec<_> = registry.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, seen);
    }

    #[test]
    fn test_replace_handle() {
        let mut registry = Registry::new();
        let id = entry(&mut registry, 1);
        assert!(registry.replace_handle(id, ExecutionHandle::new(9, TaskControl::new())));
        assert_eq!(registry.get(id).map(|e| e.handle.ticket()), Some(9));
        assert!(!registry.replace_handle(TaskId(99), ExecutionHandle::new(10, TaskControl::new())));
    }

    #[test]
    fn test_unknown_id() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.get(TaskId(1)).is_none());
        assert!(registry.remove(TaskId(1)).is_none());
    }
}
