//! 运行日志：每次运行一个日志文件

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// 日志文件路径 `<log_dir>/<run_type>_<YYYYmmdd_HHMMSS>.log`
pub fn run_log_path(log_dir: &Path, run_type: &str) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    log_dir.join(format!("{}_{}.log", run_type, timestamp))
}

fn default_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug {
            "multi_search=debug"
        } else {
            "multi_search=info"
        })
    })
}

/// 创建本次运行的日志文件并安装tracing订阅器，返回日志文件路径。
///
/// 订阅器已安装时（例如同一进程内多次调用）只创建文件。
pub fn setup_run_logging(log_dir: &Path, run_type: &str, debug: bool) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let path = run_log_path(log_dir, run_type);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(default_filter(debug))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init();

    Ok(path)
}
