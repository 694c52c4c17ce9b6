//! Core: 下载任务的执行、任务池调度、任务登记与管理器 actor

pub mod actor_manager;
pub mod error;
pub mod pool;
pub mod registry;
pub mod task;

// 只导出主流程和其它模块实际用到的类型
pub use actor_manager::{
    CancelTask, CreateDownload, DownloadManagerActor, FileLocation, GetStats, ListTasks,
    LocateFile, ManagerStats, PauseTask, QueryDestination, QueryHumanSize, QueryPercent,
    QuerySnapshot, QueryStatus, RemoveTask, ResumeTask, StopTask, Subscribe, WatchTask,
};
pub use error::{DownloadError, DownloadResult};
pub use pool::{ExecutionHandle, TaskPool};
pub use registry::{Registry, TaskId};
pub use task::{DownloadTask, ProgressNotice, SizeKind, TaskProgress, TaskStatus};
