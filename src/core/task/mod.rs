//! `task` 模块包含了与单个下载任务相关的所有逻辑
//!
//! 主要包括：
//! - `download_task`: `DownloadTask` 的定义与控制接口
//! - `download`: 实际的下载逻辑（探测、读流、分块写入、收尾）
//! - `control`: 暂停/取消/中断标志
//! - `progress`: 进度快照与推送通知
//! - `state`: 任务状态 `TaskStatus`
//! - `transport`: HTTP 传输抽象

pub mod control;
pub mod download;
pub mod download_task;
pub mod progress;
pub mod state;
pub mod transport;

// 导出核心组件，方便外部使用
pub use download_task::{DownloadTask, DEFAULT_CHUNK_SIZE};
pub use progress::{ProgressNotice, SizeKind, TaskProgress, UNKNOWN_SIZE};
pub use state::TaskStatus;
pub use transport::{AwcTransport, BodyStream, Transport};
