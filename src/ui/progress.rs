use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;

use crate::core::registry::TaskId;
use crate::core::task::{SizeKind, TaskProgress};
use crate::utils::format_bytes;

const KNOWN_TEMPLATE: &str = "{prefix:>24} [{bar:30.cyan/blue}] {percent:>3}% {msg}";
const UNKNOWN_TEMPLATE: &str = "{prefix:>24} {spinner} {msg}";

// 结构体：ProgressManager
// 每个任务一条进度条，按任务创建顺序排列
pub struct ProgressManager {
    multi: MultiProgress,
    bars: HashMap<TaskId, Bar>,
}

struct Bar {
    pb: ProgressBar,
    /// 是否已切换为百分比样式
    sized: bool,
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressManager {
    pub fn new() -> Self {
        Self { multi: MultiProgress::new(), bars: HashMap::new() }
    }

    fn style(template: &str) -> ProgressStyle {
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }

    /// 根据最新快照刷新进度条，第一次见到的任务会新建一条
    pub fn update(&mut self, progress: &TaskProgress) {
        let multi = &self.multi;
        let bar = self.bars.entry(progress.id).or_insert_with(|| {
            let pb = multi.add(ProgressBar::new(100));
            pb.set_prefix(shorten(&progress.file_name, 24));
            pb.set_style(Self::style(UNKNOWN_TEMPLATE));
            Bar { pb, sized: false }
        });
        let pb = &bar.pb;

        match progress.percent() {
            Some(percent) => {
                if !bar.sized {
                    pb.set_style(Self::style(KNOWN_TEMPLATE));
                    bar.sized = true;
                }
                pb.set_position(percent as u64);
                pb.set_message(format!(
                    "{} | 剩余 {}",
                    progress.status,
                    progress.human_size(SizeKind::Remaining)
                ));
            }
            None => {
                pb.set_message(format!("{} | 已下载 {}", progress.status, format_bytes(progress.downloaded as i64)));
                pb.tick();
            }
        }

        if progress.status.is_terminal() && !progress.running && !pb.is_finished() {
            match &progress.error {
                Some(err) => pb.abandon_with_message(format!("{}: {}", progress.status, err)),
                None => pb.finish_with_message(progress.status.to_string()),
            }
        }
    }

    /// 进度条以外的输出，避免和进度条互相覆盖
    pub fn println(&self, message: &str) {
        let _ = self.multi.println(message);
    }
}

fn shorten(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }
    let tail: String = name.chars().rev().take(max_chars - 1).collect::<Vec<_>>().into_iter().rev().collect();
    format!("…{}", tail)
}
