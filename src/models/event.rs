//! 推送给订阅者的进度事件

use std::time::Duration;

use serde::Serialize;

use crate::models::work::duration_secs;
use crate::models::{BatchState, BatchStatus, BatchSummary, Outcome};

/// 最近完成的题目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestOutcome {
    pub identity: String,
    pub success: bool,
    pub label: Option<String>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

/// 进度事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// 订阅时立即下发的状态快照
    Snapshot {
        status: BatchStatus,
        completed: usize,
        total: usize,
        succeeded: usize,
        failed: usize,
    },
    Progress {
        completed: usize,
        total: usize,
        latest: LatestOutcome,
    },
    Completed {
        outcomes: Vec<Outcome>,
        summary: BatchSummary,
        report_ref: Option<String>,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn snapshot(state: &BatchState) -> Self {
        ProgressEvent::Snapshot {
            status: state.status,
            completed: state.completed,
            total: state.total,
            succeeded: state.succeeded,
            failed: state.failed,
        }
    }

    pub fn progress(state: &BatchState, latest: &Outcome) -> Self {
        ProgressEvent::Progress {
            completed: state.completed,
            total: state.total,
            latest: LatestOutcome {
                identity: latest.identity().to_string(),
                success: latest.success(),
                label: latest.label().map(str::to_string),
                elapsed: latest.elapsed(),
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }

    /// 是否为终态事件
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed { .. } | ProgressEvent::Error { .. }
        )
    }
}
