//! 远程推理调用 - 基础设施层
//!
//! 只暴露"把一张图片交给推理服务并拿回文本"这一能力，
//! 超时、重试和结果归一化都由上层负责

use futures::future::BoxFuture;

/// 一次推理请求
#[derive(Debug, Clone, Copy)]
pub struct SolveRequest<'a> {
    pub payload: &'a [u8],
    pub payload_kind: &'a str,
    pub identity: &'a str,
    pub prompt: &'a str,
}

/// 远程推理服务
///
/// 职责：
/// - 发起单次调用，返回解答文本或错误
/// - 不重试、不计时
/// - 不认识批次 / 进度
pub trait RemoteSolver: Send + Sync {
    /// 服务名称（日志用）
    fn name(&self) -> &str;

    /// 单次推理调用
    fn solve<'a>(&'a self, request: SolveRequest<'a>) -> BoxFuture<'a, anyhow::Result<String>>;

    /// 批次开始前的可达性检查
    ///
    /// 失败时批次直接进入 errored，不会产生任何题目结果；
    /// 默认实现总是成功（内存实现无需检查）
    fn probe(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}
