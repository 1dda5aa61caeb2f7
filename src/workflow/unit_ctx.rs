//! 题目处理上下文
//!
//! 封装"我正在处理哪个批次的第几题"这一信息

use std::fmt::Display;

use crate::models::BatchId;

/// 题目处理上下文
#[derive(Debug, Clone)]
pub struct UnitCtx {
    pub batch_id: BatchId,

    /// 题目索引（从0开始，显示时加1）
    pub index: usize,

    /// 文件名
    pub identity: String,

    /// 批次题目总数（仅用于日志显示）
    pub total: usize,
}

impl UnitCtx {
    pub fn new(batch_id: BatchId, index: usize, identity: impl Into<String>, total: usize) -> Self {
        Self {
            batch_id,
            index,
            identity: identity.into(),
            total,
        }
    }
}

impl Display for UnitCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[批次 {} 题目 {}/{} {}]",
            self.batch_id.short(),
            self.index + 1,
            self.total,
            self.identity
        )
    }
}
