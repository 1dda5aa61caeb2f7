use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use question_solver::infrastructure::{RemoteSolver, SolveRequest};
use question_solver::models::{BatchStatus, ProgressEvent, UnitOfWork};
use question_solver::orchestrator::{BatchDriver, BatchRegistry, BroadcastHub};
use question_solver::services::{KeywordClassifier, RecordWriter, ReportWriter, RetryPolicy, RetryingInvoker};
use question_solver::workflow::UnitFlow;
use tokio_test::{assert_err, assert_ok};

/// 记录并发峰值的模拟推理服务；指定的题目永远失败
struct InstrumentedSolver {
    failing_identity: Option<&'static str>,
    reachable: bool,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl InstrumentedSolver {
    fn new(failing_identity: Option<&'static str>, reachable: bool) -> Self {
        Self {
            failing_identity,
            reachable,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

impl RemoteSolver for InstrumentedSolver {
    fn name(&self) -> &str {
        "instrumented"
    }

    fn solve<'a>(&'a self, request: SolveRequest<'a>) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(200)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if Some(request.identity) == self.failing_identity {
                anyhow::bail!("503 Service Unavailable");
            }
            Ok(format!("{} için türev ve integral adımları", request.identity))
        })
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

fn units(n: usize) -> Vec<UnitOfWork> {
    UnitOfWork::from_inputs((0..n).map(|i| (format!("q{}.png", i), vec![0x89, b'P', b'N', b'G'], "image/png".to_string())))
}

fn build_driver(solver: Arc<InstrumentedSolver>, limit: usize) -> BatchDriver {
    let registry = Arc::new(BatchRegistry::new(Arc::new(BroadcastHub::new()), Duration::from_secs(60)));
    let invoker = RetryingInvoker::new(solver, RetryPolicy::default(), "Soruyu çöz");
    let flow = Arc::new(UnitFlow::new(invoker, Arc::new(KeywordClassifier)));
    BatchDriver::new(registry, flow, limit)
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_batch_with_one_failing_unit() {
    let dir = std::env::temp_dir().join(format!("pipeline-{}", uuid::Uuid::now_v7()));
    let solver = Arc::new(InstrumentedSolver::new(Some("q3.png"), true));
    let driver = build_driver(solver.clone(), 2)
        .with_reporter(Arc::new(ReportWriter::new(&dir)))
        .with_store(Arc::new(RecordWriter::with_path(dir.join("records.jsonl"))));

    let batch_id = driver.registry().create(units(5));
    let (_, mut events) = assert_ok!(driver.registry().attach(&batch_id));

    let result = assert_ok!(driver.run(batch_id).await);

    // 汇总
    let summary = &result.summary;
    assert_eq!((summary.total, summary.succeeded, summary.failed), (5, 4, 1));
    assert_eq!(summary.success_rate, 80.0);

    // 顺序与结果不变量
    let indices: Vec<usize> = result.outcomes.iter().map(|o| o.index()).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    for outcome in &result.outcomes {
        assert_eq!(outcome.success(), outcome.value().is_some());
        assert_eq!(outcome.success(), outcome.error().is_none());
    }
    assert_eq!(result.outcomes[3].error(), Some("failed after 3 attempts"));
    assert_eq!(result.outcomes[0].label(), Some("Matematik"));

    // 并发上限；失败题目尝试 3 次
    assert!(solver.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(solver.calls.load(Ordering::SeqCst), 4 + 3);

    // 订阅者事件：快照 → 5 个 progress → completed
    assert!(matches!(events.recv().await, Some(ProgressEvent::Snapshot { completed: 0, .. })));
    let mut last_completed = 0;
    for _ in 0..5 {
        match events.recv().await {
            Some(ProgressEvent::Progress { completed, total, .. }) => {
                assert_eq!(total, 5);
                assert!(completed > last_completed);
                last_completed = completed;
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
    match events.recv().await {
        Some(ProgressEvent::Completed { outcomes, summary, report_ref }) => {
            assert_eq!(outcomes.len(), 5);
            assert_eq!(summary.success_rate, 80.0);
            assert_eq!(report_ref, result.report_ref);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // 聚合器最终状态
    let state = driver.registry().lookup(&batch_id).unwrap().progress().snapshot();
    assert_eq!(state.status, BatchStatus::Completed);
    assert_eq!(state.completed, state.succeeded + state.failed);

    // 报告与记录
    let report_ref = result.report_ref.clone().unwrap();
    let report = std::fs::read_to_string(&report_ref).unwrap();
    assert!(report.contains("| **Başarı Oranı** | 80.0% |"));
    let records = std::fs::read_to_string(dir.join("records.jsonl")).unwrap();
    assert_eq!(records.lines().count(), 5);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_service_errors_batch() {
    let solver = Arc::new(InstrumentedSolver::new(None, false));
    let driver = build_driver(solver.clone(), 2);

    let batch_id = driver.registry().create(units(3));
    let (_, mut events) = assert_ok!(driver.registry().attach(&batch_id));

    assert_err!(driver.run(batch_id).await);

    let state = driver.registry().lookup(&batch_id).unwrap().progress().snapshot();
    assert_eq!(state.status, BatchStatus::Errored);
    assert!(state.outcomes.is_empty());
    assert!(state.error.is_some());
    assert_eq!(solver.calls.load(Ordering::SeqCst), 0);

    assert!(matches!(events.recv().await, Some(ProgressEvent::Snapshot { .. })));
    assert!(matches!(events.recv().await, Some(ProgressEvent::Error { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_late_subscriber_gets_snapshot_only() {
    let solver = Arc::new(InstrumentedSolver::new(None, true));
    let driver = build_driver(solver, 3);

    let batch_id = driver.registry().create(units(4));
    assert_ok!(driver.run(batch_id).await);

    let (_, mut events) = assert_ok!(driver.registry().attach(&batch_id));
    match events.recv().await {
        Some(ProgressEvent::Snapshot { status, completed, total, succeeded, failed }) => {
            assert_eq!(status, BatchStatus::Completed);
            assert_eq!((completed, total, succeeded, failed), (4, 4, 4, 0));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_abort_before_run_accounts_every_unit() {
    let solver = Arc::new(InstrumentedSolver::new(None, true));
    let driver = build_driver(solver.clone(), 2);

    let batch_id = driver.registry().create(units(3));
    driver.registry().lookup(&batch_id).unwrap().request_abort();

    let result = assert_ok!(driver.run(batch_id).await);

    assert_eq!(result.outcomes.len(), 3);
    assert_eq!(result.summary.failed, 3);
    assert_eq!(result.summary.success_rate, 0.0);
    assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_evicted_batch_is_gone() {
    let solver = Arc::new(InstrumentedSolver::new(None, true));
    let driver = build_driver(solver, 2);

    let batch_id = driver.registry().create(units(1));
    assert_ok!(driver.run(batch_id).await);

    assert!(driver.registry().evict(&batch_id));
    assert!(driver.registry().is_empty());
    assert_err!(driver.run(batch_id).await);
}
