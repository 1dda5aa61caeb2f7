//! 日志初始化
//!
//! `RUST_LOG` 优先；否则按 verbose 选择 info / debug

use tracing_subscriber::EnvFilter;

/// 初始化 tracing 日志（重复调用无副作用）
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
