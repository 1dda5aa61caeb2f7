//! 结果汇总 - 编排层

use std::time::Duration;

use crate::models::{BatchSummary, Outcome};

/// 按 index 排序并计算汇总统计
///
/// 成功率为百分比，保留一位小数；空批次的成功率与平均耗时均为 0
pub fn assemble(mut outcomes: Vec<Outcome>) -> (Vec<Outcome>, BatchSummary) {
    outcomes.sort_by_key(Outcome::index);

    let total = outcomes.len();
    let succeeded = outcomes.iter().filter(|o| o.success()).count();
    let total_elapsed: Duration = outcomes.iter().map(Outcome::elapsed).sum();

    let (success_rate, avg_elapsed) = if total == 0 {
        (0.0, Duration::ZERO)
    } else {
        let rate = (succeeded as f64 / total as f64 * 1000.0).round() / 10.0;
        (rate, total_elapsed.div_f64(total as f64))
    };

    let summary = BatchSummary {
        total,
        succeeded,
        failed: total - succeeded,
        success_rate,
        total_elapsed,
        avg_elapsed,
    };

    (outcomes, summary)
}
