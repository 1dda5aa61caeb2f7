//! 重试调用器 - 业务能力层
//!
//! 把一次不可靠的远程调用包装成"一定返回 Outcome"的操作：
//! 每次尝试有独立超时，失败后线性退避，用尽次数后返回失败结果

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::error::RemoteError;
use crate::infrastructure::{RemoteSolver, SolveRequest};
use crate::models::{Outcome, UnitOfWork};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempt_budget: usize,
    per_attempt_timeout: Duration,
    backoff_base: Duration,
}

impl RetryPolicy {
    /// attempt_budget 为 0 时按 1 处理
    pub fn new(attempt_budget: usize, per_attempt_timeout: Duration, backoff_base: Duration) -> Self {
        Self {
            attempt_budget: attempt_budget.max(1),
            per_attempt_timeout,
            backoff_base,
        }
    }

    pub fn attempt_budget(&self) -> usize {
        self.attempt_budget
    }

    pub fn per_attempt_timeout(&self) -> Duration {
        self.per_attempt_timeout
    }

    /// 第 attempt 次（从 1 开始）失败后的等待时间
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        self.backoff_base
            .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(60), Duration::from_secs(2))
    }
}

/// 重试调用器
///
/// 职责：
/// - 对单道题目发起最多 attempt_budget 次调用
/// - 超时与远程错误都视为可重试
/// - 不向外抛出预期内的失败，统一转换为 Outcome
pub struct RetryingInvoker {
    solver: Arc<dyn RemoteSolver>,
    policy: RetryPolicy,
    prompt: String,
}

impl RetryingInvoker {
    pub fn new(solver: Arc<dyn RemoteSolver>, policy: RetryPolicy, prompt: impl Into<String>) -> Self {
        Self {
            solver,
            policy,
            prompt: prompt.into(),
        }
    }

    pub fn solver(&self) -> &Arc<dyn RemoteSolver> {
        &self.solver
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 执行调用；elapsed 从第一次尝试开始计时，包含失败的尝试与退避
    pub async fn invoke(&self, unit: &UnitOfWork) -> Outcome {
        let budget = self.policy.attempt_budget;
        let started = Instant::now();

        for attempt in 1..=budget {
            let request = SolveRequest {
                payload: unit.payload(),
                payload_kind: unit.payload_kind(),
                identity: unit.identity(),
                prompt: &self.prompt,
            };

            let failure = match timeout(self.policy.per_attempt_timeout, self.solver.solve(request)).await {
                Ok(Ok(text)) => {
                    debug!("✓ {} 第 {}/{} 次尝试成功", unit.identity(), attempt, budget);
                    return Outcome::succeeded(unit.index(), unit.identity(), text, started.elapsed());
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => RemoteError::Timeout {
                    attempt,
                    timeout_secs: self.policy.per_attempt_timeout.as_secs(),
                }
                .to_string(),
            };

            warn!(
                "⚠️ {} 调用失败: {}，尝试 {}/{}",
                unit.identity(),
                failure,
                attempt,
                budget
            );

            if attempt < budget {
                sleep(self.policy.backoff_for(attempt)).await;
            }
        }

        Outcome::failed(
            unit.index(),
            unit.identity(),
            format!("failed after {} attempts", budget),
            started.elapsed(),
        )
    }
}
