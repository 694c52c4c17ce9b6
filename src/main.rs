use actix::prelude::*;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use taskdown::cli::{self, Args};
use taskdown::core::{
    CancelTask, CreateDownload, DownloadManagerActor, ListTasks, LocateFile, PauseTask, QueryStatus,
    ResumeTask, StopTask, TaskId, TaskProgress, TaskStatus,
};
use taskdown::ui::{self, DownloadSummary, ProgressManager};
use taskdown::utils::logger::init_logger;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// 键盘指令
enum Command {
    PauseAll,
    ResumeAll,
    StopAll,
    CancelAll,
    Reveal,
    Quit,
}

impl Command {
    fn from_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Self> {
        if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
            return Some(Command::Quit);
        }
        match code {
            KeyCode::Char('p') => Some(Command::PauseAll),
            KeyCode::Char('r') => Some(Command::ResumeAll),
            KeyCode::Char('s') => Some(Command::StopAll),
            KeyCode::Char('c') => Some(Command::CancelAll),
            KeyCode::Char('o') => Some(Command::Reveal),
            KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
            _ => None,
        }
    }
}

/// 退出时恢复终端
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // 解析参数和配置
    let (args, config) = match Args::parse_args() {
        Ok(parsed) => parsed,
        Err(e) => {
            ui::print_error(&format!("参数解析失败: {}", e));
            std::process::exit(1);
        }
    };

    if args.edit_config {
        cli::open_config_in_editor(&args.config);
        return Ok(());
    }

    init_logger(&config.log_level, config.log_file.as_deref(), config.log_max_size)?;
    info!("{}", cli::build_info());
    info!("配置文件路径: {}", args.config);

    // 获取下载URL列表
    let urls = match args.get_urls() {
        Ok(urls) => urls,
        Err(e) => {
            error!("获取URL列表失败: {}", e);
            ui::print_error(&format!("获取URL列表失败: {}", e));
            std::process::exit(1);
        }
    };

    println!("{}", config.get_summary());

    let manager = DownloadManagerActor::new(config.clone()).start();
    let dest_dir = PathBuf::from(&config.download_dir);
    let ids = create_tasks(&manager, &urls, &dest_dir).await;
    if ids.is_empty() {
        ui::print_error("没有可下载的任务");
        System::current().stop();
        return Ok(());
    }

    println!("\n开始下载... (p 暂停, r 恢复, s 强制停止, c 取消, o 打开目录, q 退出)");
    let started = Instant::now();
    let refresh = Duration::from_millis(config.refresh_interval_ms);
    let tasks = run_download_loop(&manager, &ids, refresh).await?;

    println!("{}", DownloadSummary::from_tasks(&tasks, started.elapsed()));
    if args.json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
    }

    System::current().stop();
    Ok(())
}

/// 为每个 URL 创建下载任务
async fn create_tasks(
    manager: &Addr<DownloadManagerActor>,
    urls: &[String],
    dest_dir: &Path,
) -> Vec<TaskId> {
    let mut ids = Vec::new();
    for url in urls {
        let msg = CreateDownload { url: url.clone(), dest_dir: dest_dir.to_path_buf() };
        match manager.send(msg).await {
            Ok(Ok(id)) => {
                ui::print_success(&format!("创建下载任务 {}: {}", id, url));
                ids.push(id);
            }
            Ok(Err(e)) => ui::print_error(&format!("创建下载任务失败: {} - {}", url, e)),
            Err(e) => ui::print_error(&format!("发送创建任务消息失败: {} - {}", url, e)),
        }
    }
    ids
}

/// 对所有任务发送同一条控制消息，返回生效的任务数
async fn for_each_task<M>(
    manager: &Addr<DownloadManagerActor>,
    ids: &[TaskId],
    make: impl Fn(TaskId) -> M,
) -> usize
where
    M: Message<Result = bool> + Send + 'static,
    DownloadManagerActor: Handler<M>,
{
    let mut applied = 0;
    for id in ids {
        if let Ok(true) = manager.send(make(*id)).await {
            applied += 1;
        }
    }
    applied
}

/// 主循环：处理键盘输入和刷新进度，所有任务结束或者用户退出时返回最终快照
async fn run_download_loop(
    manager: &Addr<DownloadManagerActor>,
    ids: &[TaskId],
    refresh: Duration,
) -> anyhow::Result<Vec<TaskProgress>> {
    let mut progress = ProgressManager::new();
    let guard = RawModeGuard::enable()
        .map_err(|e| warn!("无法启用终端原始模式，按键控制不可用: {}", e))
        .ok();

    loop {
        let mut quit = false;
        while guard.is_some() && event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else { continue };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let Some(command) = Command::from_key(key.code, key.modifiers) else { continue };
            match command {
                Command::PauseAll => {
                    let n = for_each_task(manager, ids, PauseTask).await;
                    progress.println(&format!("已暂停 {} 个任务", n));
                }
                Command::ResumeAll => {
                    let n = for_each_task(manager, ids, ResumeTask).await;
                    progress.println(&format!("已恢复 {} 个任务", n));
                }
                Command::StopAll => {
                    let n = for_each_task(manager, ids, StopTask).await;
                    progress.println(&format!("已强制停止 {} 个任务（按 r 重新下载）", n));
                }
                Command::CancelAll => {
                    let n = for_each_task(manager, ids, CancelTask).await;
                    progress.println(&format!("已取消 {} 个任务", n));
                }
                Command::Reveal => reveal_completed(manager, ids, &progress).await,
                Command::Quit => quit = true,
            }
        }

        let tasks = manager.send(ListTasks).await?;
        for task in &tasks {
            progress.update(task);
        }
        if quit {
            info!("用户退出，取消未完成的任务");
            drop(guard);
            return Ok(shutdown(manager, ids, &mut progress).await);
        }
        if tasks.iter().all(|t| t.status.is_terminal() && !t.running) {
            return Ok(tasks);
        }
        tokio::time::sleep(refresh).await;
    }
}

/// 打开已完成文件所在的目录（同一目录只打开一次）
async fn reveal_completed(
    manager: &Addr<DownloadManagerActor>,
    ids: &[TaskId],
    progress: &ProgressManager,
) {
    let mut folders = BTreeSet::new();
    for id in ids {
        let completed = matches!(
            manager.send(QueryStatus(*id)).await,
            Ok(Some(TaskStatus::Completed))
        );
        if !completed {
            continue;
        }
        if let Ok(Some(location)) = manager.send(LocateFile(*id)).await {
            if location.exists {
                folders.insert(location.folder);
            }
        }
    }
    if folders.is_empty() {
        progress.println("还没有已完成的文件");
        return;
    }
    for folder in folders {
        if let Err(e) = ui::reveal_in_folder(&folder) {
            warn!("打开目录失败: {}", e);
            progress.println(&format!("打开目录失败: {}", e));
        }
    }
}

/// 取消所有未完成的任务并等待它们清理完毕
async fn shutdown(
    manager: &Addr<DownloadManagerActor>,
    ids: &[TaskId],
    progress: &mut ProgressManager,
) -> Vec<TaskProgress> {
    for_each_task(manager, ids, CancelTask).await;
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    loop {
        let tasks = manager.send(ListTasks).await.unwrap_or_default();
        for task in &tasks {
            progress.update(task);
        }
        let settled = tasks.iter().all(|t| !t.running || t.status == TaskStatus::Completed);
        if settled || Instant::now() >= deadline {
            if !settled {
                warn!("部分任务未能在 {:?} 内结束", SHUTDOWN_GRACE);
            }
            return tasks;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
