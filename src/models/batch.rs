//! 批次标识、批次状态与汇总统计

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::work::duration_secs;
use crate::models::Outcome;

/// 批次标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// 日志用短标识
    pub fn short(&self) -> String {
        self.0.simple().to_string().chars().take(8).collect()
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// 批次状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Errored,
}

impl BatchStatus {
    /// 只允许 pending → running → {completed | errored}，以及 pending → errored
    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Pending, BatchStatus::Running)
                | (BatchStatus::Pending, BatchStatus::Errored)
                | (BatchStatus::Running, BatchStatus::Completed)
                | (BatchStatus::Running, BatchStatus::Errored)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Errored)
    }
}

/// 批次运行时状态
///
/// 不变量：`completed == succeeded + failed`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchState {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub status: BatchStatus,
    /// index -> Outcome；completed == total 之前是部分结果
    pub outcomes: BTreeMap<usize, Outcome>,
    pub error: Option<String>,
}

impl BatchState {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            succeeded: 0,
            failed: 0,
            status: BatchStatus::Pending,
            outcomes: BTreeMap::new(),
            error: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed == self.total
    }
}

/// 批次汇总统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 百分比，保留一位小数
    pub success_rate: f64,
    #[serde(with = "duration_secs")]
    pub total_elapsed: Duration,
    #[serde(with = "duration_secs")]
    pub avg_elapsed: Duration,
}
