//! taskdown: 并发多文件下载管理器
//!
//! 每个任务可以独立暂停、恢复、取消，线程池限制同时进行的下载数。
//! 管理器是一个 actix actor，界面通过消息查询进度或者订阅进度推送。

pub mod cli;
pub mod config;
pub mod core;
pub mod ui;
pub mod utils;
