//! 批次驱动 - 编排层
//!
//! 把一个已创建的批次从 pending 推进到终态：
//! 探测 → 并发执行 → 汇总 → 存储与报告 → 广播 completed

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{AppResult, BatchError};
use crate::models::{BatchId, Outcome, OutcomeRecord, ProgressEvent};
use crate::orchestrator::assembler::assemble;
use crate::orchestrator::executor::BoundedExecutor;
use crate::orchestrator::session::{BatchRegistry, BatchResult, BatchSession};
use crate::services::{BatchReporter, OutcomeStore};
use crate::workflow::UnitFlow;

/// 批次驱动
pub struct BatchDriver {
    registry: Arc<BatchRegistry>,
    flow: Arc<UnitFlow>,
    concurrency_limit: usize,
    reporter: Option<Arc<dyn BatchReporter>>,
    store: Option<Arc<dyn OutcomeStore>>,
}

impl BatchDriver {
    pub fn new(registry: Arc<BatchRegistry>, flow: Arc<UnitFlow>, concurrency_limit: usize) -> Self {
        Self {
            registry,
            flow,
            concurrency_limit,
            reporter: None,
            store: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn BatchReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn OutcomeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn registry(&self) -> &Arc<BatchRegistry> {
        &self.registry
    }

    /// 运行批次直到结束
    ///
    /// 单题失败不会让这里返回错误；只有启动失败或编排异常才返回 Err，
    /// 此时批次状态为 errored，并已向订阅者广播 error 事件
    pub async fn run(&self, batch_id: BatchId) -> AppResult<BatchResult> {
        let session = self
            .registry
            .lookup(&batch_id)
            .ok_or(BatchError::NotFound { batch_id })?;
        let units = session
            .take_units()
            .ok_or(BatchError::AlreadyStarted { batch_id })?;

        if let Err(e) = self.flow.probe().await {
            let message = format!("推理服务不可用: {}", e);
            self.fail(&session, &message);
            return Err(BatchError::SetupFailed { batch_id, message }.into());
        }

        session.progress().mark_running();
        let total = units.len();
        info!(
            "[批次 {}] 🚀 开始处理 {} 道题目，并发上限 {}",
            batch_id.short(),
            total,
            self.concurrency_limit
        );

        let executor = BoundedExecutor::new(self.concurrency_limit).with_abort_flag(session.abort_flag());
        let flow = self.flow.clone();
        let job = move |unit| {
            let flow = flow.clone();
            async move { flow.run(batch_id, total, unit).await }
        };

        let hub = self.registry.hub();
        let progress = session.progress();
        let on_outcome = |outcome: &Outcome| {
            let snapshot = progress.record(outcome.clone());
            hub.publish(&batch_id, &ProgressEvent::progress(&snapshot, outcome));
        };

        let outcomes = match executor.run(units, job, on_outcome).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.fail(&session, &e.to_string());
                return Err(e);
            }
        };

        let (outcomes, summary) = assemble(outcomes);

        if let Some(store) = &self.store {
            let records: Vec<OutcomeRecord> = outcomes
                .iter()
                .map(|o| OutcomeRecord::from_outcome(o, batch_id))
                .collect();
            if let Err(e) = store.store(&records) {
                error!("[批次 {}] ❌ 结果记录写入失败: {}", batch_id.short(), e);
            }
        }

        let report_ref = self.reporter.as_ref().and_then(|reporter| {
            reporter
                .report(&batch_id, &outcomes, &summary)
                .map_err(|e| warn!("[批次 {}] ⚠️ 报告生成失败: {}", batch_id.short(), e))
                .ok()
        });

        session.progress().finalize();
        let result = BatchResult {
            outcomes,
            summary,
            report_ref,
        };
        session.set_result(result.clone());
        session.mark_finished();

        hub.publish(
            &batch_id,
            &ProgressEvent::Completed {
                outcomes: result.outcomes.clone(),
                summary: result.summary.clone(),
                report_ref: result.report_ref.clone(),
            },
        );

        info!(
            "[批次 {}] ✓ 处理完成: 成功 {}/{}",
            batch_id.short(),
            result.summary.succeeded,
            result.summary.total
        );
        Ok(result)
    }

    fn fail(&self, session: &BatchSession, message: &str) {
        let batch_id = session.id();
        error!("[批次 {}] ❌ {}", batch_id.short(), message);
        session.progress().mark_errored(message);
        session.mark_finished();
        self.registry
            .hub()
            .publish(&batch_id, &ProgressEvent::error(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::{RemoteSolver, SolveRequest};
    use crate::models::{BatchStatus, UnitOfWork};
    use crate::orchestrator::hub::BroadcastHub;
    use crate::services::{KeywordClassifier, RetryPolicy, RetryingInvoker};
    use futures::future::BoxFuture;
    use std::time::Duration;

    struct EchoSolver {
        reachable: bool,
    }

    impl RemoteSolver for EchoSolver {
        fn name(&self) -> &str {
            "echo"
        }

        fn solve<'a>(&'a self, request: SolveRequest<'a>) -> BoxFuture<'a, anyhow::Result<String>> {
            Box::pin(async move { Ok(format!("integral çözümü {}", request.identity)) })
        }

        fn probe(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                if self.reachable {
                    Ok(())
                } else {
                    anyhow::bail!("connection refused")
                }
            })
        }
    }

    fn driver(reachable: bool) -> BatchDriver {
        let registry = Arc::new(BatchRegistry::new(Arc::new(BroadcastHub::new()), Duration::from_secs(60)));
        let invoker = RetryingInvoker::new(
            Arc::new(EchoSolver { reachable }),
            RetryPolicy::default(),
            "solve",
        );
        let flow = Arc::new(UnitFlow::new(invoker, Arc::new(KeywordClassifier)));
        BatchDriver::new(registry, flow, 2)
    }

    fn units(n: usize) -> Vec<UnitOfWork> {
        UnitOfWork::from_inputs((0..n).map(|i| (format!("q{}.png", i), vec![1], "image/png".to_string())))
    }

    #[tokio::test]
    async fn test_run_completes_batch() {
        let driver = driver(true);
        let id = driver.registry().create(units(3));

        let result = driver.run(id).await.unwrap();

        assert_eq!(result.summary.total, 3);
        assert_eq!(result.summary.success_rate, 100.0);
        assert!(result.report_ref.is_none());
        assert!(result.outcomes.iter().all(|o| o.label() == Some("Matematik")));

        let session = driver.registry().lookup(&id).unwrap();
        assert_eq!(session.progress().status(), BatchStatus::Completed);
        assert_eq!(session.result(), Some(result));
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let driver = driver(true);
        let id = driver.registry().create(units(1));

        driver.run(id).await.unwrap();
        let err = driver.run(id).await.unwrap_err();
        assert!(matches!(err, AppError::Batch(BatchError::AlreadyStarted { .. })));
    }

    #[tokio::test]
    async fn test_unknown_batch() {
        let err = driver(true).run(BatchId::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Batch(BatchError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_setup_failure_marks_errored() {
        let driver = driver(false);
        let id = driver.registry().create(units(2));
        let (_, mut rx) = driver.registry().attach(&id).unwrap();

        let err = driver.run(id).await.unwrap_err();
        assert!(matches!(err, AppError::Batch(BatchError::SetupFailed { .. })));

        let snapshot = driver.registry().lookup(&id).unwrap().progress().snapshot();
        assert_eq!(snapshot.status, BatchStatus::Errored);
        assert_eq!(snapshot.completed, 0);
        assert!(snapshot.outcomes.is_empty());

        assert!(matches!(rx.recv().await, Some(ProgressEvent::Snapshot { .. })));
        assert!(matches!(rx.recv().await, Some(ProgressEvent::Error { .. })));
    }
}
