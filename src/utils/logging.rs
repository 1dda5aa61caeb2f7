/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{BatchSummary, ProgressEvent};

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 并行解题模式");
    if let Some(source) = &config.source {
        info!("📄 配置文件: {}", source);
    }
    info!("📁 题目目录: {} | 输出目录: {}", config.questions_dir, config.output_dir);
    info!("🤖 模型: {}", config.model_name);
    info!("📊 最大并发数: {}", config.concurrency_limit());
    info!(
        "🔁 重试: {} 次，单次超时 {}s，退避基数 {}s",
        config.max_retries, config.request_timeout_secs, config.retry_delay_secs
    );
    info!("{}", "=".repeat(60));
}

/// 记录题目加载信息
///
/// # 参数
/// - `total`: 题目总数
/// - `max_concurrent`: 最大并发数
pub fn log_units_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 道待处理的题目", total);
    info!("📋 最多同时处理 {} 道\n", max_concurrent);
}

/// 观察者输出单个进度事件
pub fn log_progress_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::Snapshot {
            status,
            completed,
            total,
            ..
        } => info!("📡 已订阅批次进度 ({:?} {}/{})", status, completed, total),
        ProgressEvent::Progress {
            completed,
            total,
            latest,
        } => {
            let mark = if latest.success { "✅" } else { "❌" };
            info!(
                "{} [{}/{}] {} ({:.1}s) {}",
                mark,
                completed,
                total,
                latest.identity,
                latest.elapsed.as_secs_f64(),
                latest.label.as_deref().unwrap_or("-")
            );
        }
        ProgressEvent::Completed { summary, .. } => {
            info!("🏁 批次完成: 成功 {}/{}", summary.succeeded, summary.total)
        }
        ProgressEvent::Error { message } => warn!("❌ 批次异常: {}", message),
    }
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 批次汇总
/// - `report_ref`: 报告路径（生成失败时为 None）
pub fn print_final_stats(summary: &BatchSummary, report_ref: Option<&str>) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.succeeded, summary.total);
    info!("❌ 失败: {}", summary.failed);
    info!("📈 成功率: {:.1}%", summary.success_rate);
    info!(
        "⏱️ 总耗时: {:.1}s，平均 {:.1}s/题",
        summary.total_elapsed.as_secs_f64(),
        summary.avg_elapsed.as_secs_f64()
    );
    info!("{}", "=".repeat(60));
    match report_ref {
        Some(path) => info!("\n报告已保存至: {}", path),
        None => warn!("\n⚠️ 报告未生成"),
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的单行文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() > max_len {
        single_line.chars().take(max_len).collect::<String>() + "..."
    } else {
        single_line
    }
}
