//! # Question Solver
//!
//! 一个并行求解题目图片的 Rust 应用程序：
//! 在并发上限内把题目图片发给视觉推理服务，带重试地收集解答，
//! 实时广播进度，最后生成 markdown 报告
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 远程推理能力的抽象
//! - `RemoteSolver` - 可替换的推理接口（测试中使用内存实现）
//! - `clients/VisionClient` - 基于 async-openai 的具体实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单道题目或单个批次的输出
//! - `RetryingInvoker` - 超时与线性退避重试
//! - `KeywordClassifier` - 解答文本的学科分类
//! - `ReportWriter` / `RecordWriter` - 报告与记录输出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的完整处理流程
//! - `UnitCtx` - 上下文封装（batch_id + index）
//! - `UnitFlow` - 流程编排（invoke → classify）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/executor` - 有界并发执行器
//! - `orchestrator/driver` - 批次生命周期
//! - `orchestrator/batch_processor` - 应用入口
//!
//! ## 模块结构

pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{RemoteSolver, SolveRequest};
pub use models::{BatchId, BatchState, BatchStatus, BatchSummary, Outcome, ProgressEvent, UnitOfWork};
pub use orchestrator::{App, BatchDriver, BatchRegistry, BatchResult, BoundedExecutor, BroadcastHub};
pub use services::{RetryPolicy, RetryingInvoker};
pub use workflow::{UnitCtx, UnitFlow};
