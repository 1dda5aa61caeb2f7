//! 有界并发执行器 - 编排层
//!
//! ## 执行模型
//!
//! - 单独的派发任务按提交顺序获取 Semaphore 许可，拿到许可后才 spawn 题目任务
//! - 许可在题目任务内部持有，覆盖整个重试过程
//! - 题目任务把结果通过 mpsc 通道发回调用方任务，由调用方依次回调 `on_outcome`
//! - 全部结束后按 index 排序一次
//!
//! 单个题目失败（甚至 panic）不会取消其他题目；每道题目恰好产生一个结果。

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, warn};

use crate::error::{AppError, AppResult};
use crate::models::{Outcome, UnitOfWork};

/// 中止后未派发题目的错误信息
pub const ABORTED_BEFORE_ADMISSION: &str = "aborted before admission";

/// 有界并发执行器
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    concurrency_limit: usize,
    abort: Option<Arc<AtomicBool>>,
}

impl BoundedExecutor {
    /// concurrency_limit 为 0 时按 1 处理
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            concurrency_limit: concurrency_limit.max(1),
            abort: None,
        }
    }

    /// 中止标志：置位后不再派发新题目，已在执行的题目不受影响
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// 执行所有题目，返回按 index 排序的结果
    ///
    /// `on_outcome` 在调用方任务中按完成顺序被调用，每个结果一次。
    /// 只有派发任务本身异常时才返回错误，此前已回调的结果不受影响。
    pub async fn run<F, Fut, C>(
        &self,
        units: Vec<UnitOfWork>,
        job: F,
        mut on_outcome: C,
    ) -> AppResult<Vec<Outcome>>
    where
        F: Fn(UnitOfWork) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
        C: FnMut(&Outcome),
    {
        if units.is_empty() {
            return Ok(Vec::new());
        }

        let total = units.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let (tx, mut rx) = mpsc::unbounded_channel::<Outcome>();
        let job = Arc::new(job);
        let abort = self.abort.clone();

        debug!("派发 {} 道题目，并发上限 {}", total, self.concurrency_limit);

        // 派发任务：按提交顺序获取许可
        let admission = tokio::spawn(async move {
            let mut handles = Vec::with_capacity(total);

            for unit in units {
                let index = unit.index();
                let identity = unit.identity().to_string();

                if is_aborted(&abort) {
                    let _ = tx.send(Outcome::failed(index, identity, ABORTED_BEFORE_ADMISSION, Duration::ZERO));
                    continue;
                }

                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::orchestration(format!("admission gate closed: {}", e)))?;

                // 等待许可期间可能已被中止
                if is_aborted(&abort) {
                    drop(permit);
                    let _ = tx.send(Outcome::failed(index, identity, ABORTED_BEFORE_ADMISSION, Duration::ZERO));
                    continue;
                }

                let job = job.clone();
                let tx = tx.clone();
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = (*job)(unit).await;
                    let _ = tx.send(outcome);
                });
                handles.push((index, identity, handle));
            }

            Ok::<_, AppError>(handles)
        });

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = rx.recv().await {
            on_outcome(&outcome);
            outcomes.push(outcome);
        }

        let handles = match admission.await {
            Ok(result) => result?,
            Err(e) => {
                error!("❌ 派发任务异常终止: {}", e);
                return Err(e.into());
            }
        };

        // 没有发回结果的题目任务（panic）也要记一个失败结果
        for (index, identity, handle) in handles {
            if let Err(e) = handle.await {
                if outcomes.iter().any(|o| o.index() == index) {
                    continue;
                }
                warn!("⚠️ 题目任务异常终止 {}: {}", identity, e);
                let outcome = Outcome::failed(index, identity, format!("unit task aborted: {}", e), Duration::ZERO);
                on_outcome(&outcome);
                outcomes.push(outcome);
            }
        }

        outcomes.sort_by_key(Outcome::index);
        Ok(outcomes)
    }
}

fn is_aborted(flag: &Option<Arc<AtomicBool>>) -> bool {
    flag.as_ref().is_some_and(|f| f.load(Ordering::SeqCst))
}
