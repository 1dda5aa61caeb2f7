//! 题目处理流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整处理流程
//!
//! 流程顺序：
//! 1. 带重试地调用推理服务
//! 2. 成功时对解答分类
//! 3. 失败直接作为结果返回，不中断批次

use std::sync::Arc;

use tracing::{info, warn};

use crate::models::{BatchId, Outcome, UnitOfWork};
use crate::services::{RetryingInvoker, TopicClassifier};
use crate::utils::logging::truncate_text;
use crate::workflow::unit_ctx::UnitCtx;

/// 题目处理流程
///
/// - 编排单道题目的调用与分类
/// - 不持有批次状态
/// - 只依赖业务能力（services）
pub struct UnitFlow {
    invoker: RetryingInvoker,
    classifier: Arc<dyn TopicClassifier>,
}

impl UnitFlow {
    pub fn new(invoker: RetryingInvoker, classifier: Arc<dyn TopicClassifier>) -> Self {
        Self { invoker, classifier }
    }

    /// 批次开始前检查推理服务是否可用
    pub async fn probe(&self) -> anyhow::Result<()> {
        self.invoker.solver().probe().await
    }

    pub async fn run(&self, batch_id: BatchId, total: usize, unit: UnitOfWork) -> Outcome {
        let ctx = UnitCtx::new(batch_id, unit.index(), unit.identity(), total);
        info!("{} 🔍 开始求解", ctx);

        let outcome = self.invoker.invoke(&unit).await;

        let Some(solution) = outcome.value() else {
            warn!(
                "{} ✗ 求解失败: {}",
                ctx,
                outcome.error().unwrap_or_default()
            );
            return outcome;
        };

        let (label, sublabel) = self.classifier.classify(solution);
        info!(
            "{} ✓ 求解成功 ({:.1}s) 分类: {} | {}",
            ctx,
            outcome.elapsed().as_secs_f64(),
            label,
            truncate_text(solution, 40)
        );
        outcome.with_label(label, sublabel)
    }
}
