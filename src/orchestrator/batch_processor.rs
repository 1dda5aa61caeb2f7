//! 批量题目处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责把一个目录的题目图片作为一个批次处理完。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：创建推理客户端（缺少 API key 时立即失败）、注册表与驱动
//! 2. **批量加载**：扫描并加载所有题目图片
//! 3. **进度观察**：订阅批次进度并输出到日志
//! 4. **中断处理**：Ctrl+C 时停止派发新题目，已在执行的题目照常完成
//! 5. **全局统计**：输出最终统计并移除批次

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::clients::VisionClient;
use crate::config::Config;
use crate::models::{load_all_images, LoadedImage, UnitOfWork};
use crate::orchestrator::driver::BatchDriver;
use crate::orchestrator::hub::BroadcastHub;
use crate::orchestrator::session::BatchRegistry;
use crate::services::{KeywordClassifier, RecordWriter, ReportWriter, RetryingInvoker};
use crate::utils::logging::{log_progress_event, log_startup, log_units_loaded, print_final_stats};
use crate::workflow::UnitFlow;

/// 应用主结构
pub struct App {
    config: Config,
    driver: BatchDriver,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let client = VisionClient::new(&config)?;
        let invoker = RetryingInvoker::new(
            Arc::new(client),
            config.retry_policy(),
            config.question_prompt.clone(),
        );
        let flow = Arc::new(UnitFlow::new(invoker, Arc::new(KeywordClassifier)));

        let registry = Arc::new(BatchRegistry::new(
            Arc::new(BroadcastHub::new()),
            Duration::from_secs(config.session_ttl_secs),
        ));

        let reporter = ReportWriter::new(&config.output_dir)
            .with_file_name(&config.report_file)
            .with_source_dir(&config.questions_dir);
        let store = RecordWriter::with_path(&config.records_file);

        let driver = BatchDriver::new(registry, flow, config.concurrency_limit())
            .with_reporter(Arc::new(reporter))
            .with_store(Arc::new(store));

        Ok(Self { config, driver })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let images = self.load_images().await?;

        if images.is_empty() {
            warn!("⚠️ 没有找到待处理的题目图片，程序结束");
            return Ok(());
        }

        log_units_loaded(images.len(), self.config.concurrency_limit());

        let units = UnitOfWork::from_inputs(images.into_iter().map(LoadedImage::into_input));
        let registry = self.driver.registry().clone();
        let batch_id = registry.create(units);

        // 控制台观察者
        let (_, mut events) = registry.attach(&batch_id)?;
        let observer = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                log_progress_event(&event);
                if event.is_terminal() {
                    break;
                }
            }
        });

        let interrupt = registry.lookup(&batch_id).map(|session| {
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("⚠️ 收到中断信号，停止派发新题目，等待进行中的题目完成");
                    session.request_abort();
                }
            })
        });

        let result = self.driver.run(batch_id).await;

        if let Some(handle) = interrupt {
            handle.abort();
        }
        registry.evict(&batch_id);
        let _ = observer.await;

        let result = result?;
        print_final_stats(&result.summary, result.report_ref.as_deref());

        Ok(())
    }

    /// 加载题目图片
    async fn load_images(&self) -> Result<Vec<LoadedImage>> {
        info!("\n📁 正在扫描待处理的题目图片: {}", self.config.questions_dir);
        Ok(load_all_images(&self.config.questions_dir).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProgressEvent;

    #[tokio::test]
    async fn test_initialize_fails_without_api_key() {
        let config = Config {
            gemini_api_key: String::new(),
            ..Default::default()
        };
        let err = App::initialize(config).await.err().unwrap();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn test_missing_questions_dir_is_an_error() {
        let config = Config {
            gemini_api_key: "test-key".to_string(),
            questions_dir: format!("/nonexistent-{}", uuid::Uuid::now_v7()),
            ..Default::default()
        };
        let app = App::initialize(config).await.unwrap();
        assert!(app.run().await.is_err());
    }

    #[test]
    fn test_progress_event_is_terminal() {
        assert!(ProgressEvent::error("x").is_terminal());
    }
}
