//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次的并发调度、进度汇总与广播，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 应用入口
//! - 管理应用生命周期（初始化、运行、清理）
//! - 加载题目图片并创建批次
//! - 输出全局统计信息
//!
//! ### `driver` - 批次驱动
//! - 探测推理服务、启动执行器、汇总结果
//! - 写入记录与报告，广播 completed / error
//!
//! ### `executor` - 有界并发执行器
//! - Semaphore 控制同时进行的远程调用数量
//! - mpsc 通道把结果发回驱动任务
//!
//! ### `progress` / `hub` / `session`
//! - 进度计数、按批次广播、批次注册表
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理一个目录)
//!     ↓
//! driver (处理一个批次) ── progress / hub / session
//!     ↓
//! executor (并发调度 Vec<UnitOfWork>)
//!     ↓
//! workflow::UnitFlow (处理单个 UnitOfWork)
//!     ↓
//! services (能力层：retry / classify / report / record)
//!     ↓
//! infrastructure (基础设施：RemoteSolver)
//! ```

pub mod assembler;
pub mod batch_processor;
pub mod driver;
pub mod executor;
pub mod hub;
pub mod progress;
pub mod session;

// 重新导出主要类型
pub use assembler::assemble;
pub use batch_processor::App;
pub use driver::BatchDriver;
pub use executor::BoundedExecutor;
pub use hub::{BroadcastHub, EventSink, SubscriberId};
pub use progress::ProgressAggregator;
pub use session::{BatchRegistry, BatchResult, BatchSession};
