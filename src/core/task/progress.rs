use actix::Message;
use serde::Serialize;
use std::path::PathBuf;

use crate::core::registry::TaskId;
use crate::utils::byte_size::format_bytes;
use super::state::TaskStatus;

/// 总大小未知时的标记值
pub const UNKNOWN_SIZE: i64 = -1;

const UNKNOWN_LABEL: &str = "未知";

/// 任务进度快照（最新值覆盖旧值）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskProgress {
    pub id: TaskId,
    pub url: String,
    pub file_name: String,
    pub destination: PathBuf,
    pub status: TaskStatus,
    pub downloaded: u64,
    /// -1 表示服务器没有报告大小
    pub total_size: i64,
    pub error: Option<String>,
    /// 是否有工作线程正在执行该任务
    pub running: bool,
}

/// 查询人类可读大小时选择的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeKind {
    Total,
    Remaining,
}

impl TaskProgress {
    pub fn total_known(&self) -> bool {
        self.total_size > 0
    }

    /// `floor(downloaded * 100 / total)`，总大小未知时为 None
    pub fn percent(&self) -> Option<u8> {
        if !self.total_known() {
            return None;
        }
        let percent = (self.downloaded as u128 * 100) / self.total_size as u128;
        Some(percent.min(100) as u8)
    }

    pub fn remaining(&self) -> Option<u64> {
        if self.total_known() {
            Some((self.total_size as u64).saturating_sub(self.downloaded))
        } else {
            None
        }
    }

    pub fn human_size(&self, which: SizeKind) -> String {
        match which {
            SizeKind::Total if self.total_known() => format_bytes(self.total_size),
            SizeKind::Remaining => match self.remaining() {
                Some(remaining) => format_bytes(remaining as i64),
                None => UNKNOWN_LABEL.to_string(),
            },
            SizeKind::Total => UNKNOWN_LABEL.to_string(),
        }
    }

    pub fn notice(&self) -> ProgressNotice {
        ProgressNotice {
            id: self.id,
            percent: self.percent(),
            status_label: self.status.label().to_string(),
            remaining_label: self.human_size(SizeKind::Remaining),
        }
    }
}

/// 推送给界面的进度通知：(id, 百分比, 状态文字, 剩余大小文字)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressNotice {
    pub id: TaskId,
    pub percent: Option<u8>,
    pub status_label: String,
    pub remaining_label: String,
}
impl Message for ProgressNotice { type Result = (); }
