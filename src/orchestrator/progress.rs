//! 进度聚合器 - 编排层
//!
//! 一把 `std::sync::Mutex` 保护整个 `BatchState`；锁内不 await、不嵌套加锁

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::models::{BatchState, BatchStatus, Outcome};

/// 进度聚合器
///
/// 计数只增不减，`completed == succeeded + failed` 在每次快照中都成立
#[derive(Debug)]
pub struct ProgressAggregator {
    state: Mutex<BatchState>,
}

impl ProgressAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            state: Mutex::new(BatchState::new(total)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 记录一个结果，返回记录后的快照
    ///
    /// 同一 index 重复记录会被忽略
    pub fn record(&self, outcome: Outcome) -> BatchState {
        let mut state = self.lock();
        let index = outcome.index();

        if state.outcomes.contains_key(&index) {
            warn!("⚠️ 题目 {} 的结果重复记录，已忽略", index);
            return state.clone();
        }
        if state.completed >= state.total {
            warn!("⚠️ 题目 {} 超出批次总数 {}，已忽略", index, state.total);
            return state.clone();
        }

        if state.status == BatchStatus::Pending {
            state.status = BatchStatus::Running;
        }

        if outcome.success() {
            state.succeeded += 1;
        } else {
            state.failed += 1;
        }
        state.completed += 1;
        state.outcomes.insert(index, outcome);

        if state.is_done() && state.status == BatchStatus::Running {
            state.status = BatchStatus::Completed;
        }

        state.clone()
    }

    /// pending → running
    pub fn mark_running(&self) -> bool {
        transition(&mut self.lock(), BatchStatus::Running)
    }

    /// 进入 errored；已处于终态时返回 false
    pub fn mark_errored(&self, message: impl Into<String>) -> bool {
        let mut state = self.lock();
        if !transition(&mut state, BatchStatus::Errored) {
            return false;
        }
        state.error = Some(message.into());
        true
    }

    /// 批次结束时调用；空批次经 running 直接进入 completed
    pub fn finalize(&self) -> BatchState {
        let mut state = self.lock();
        if state.is_done() {
            transition(&mut state, BatchStatus::Running);
            transition(&mut state, BatchStatus::Completed);
        }
        state.clone()
    }

    pub fn snapshot(&self) -> BatchState {
        self.lock().clone()
    }

    pub fn status(&self) -> BatchStatus {
        self.lock().status
    }
}

fn transition(state: &mut BatchState, next: BatchStatus) -> bool {
    if state.status.can_transition_to(next) {
        state.status = next;
        true
    } else {
        false
    }
}
