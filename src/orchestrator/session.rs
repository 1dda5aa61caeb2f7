//! 批次会话与注册表 - 编排层
//!
//! 每个批次对应一个 `BatchSession`，由 `BatchRegistry` 统一持有；
//! 批次结束后由调用方显式移除，或按 TTL 批量清理

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{AppResult, BatchError, DeliveryError};
use crate::models::{BatchId, BatchSummary, Outcome, ProgressEvent, UnitOfWork};
use crate::orchestrator::hub::{BroadcastHub, EventSink, SubscriberId};
use crate::orchestrator::progress::ProgressAggregator;

/// 批次最终结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub outcomes: Vec<Outcome>,
    pub summary: BatchSummary,
    pub report_ref: Option<String>,
}

/// 单个批次的会话
#[derive(Debug)]
pub struct BatchSession {
    id: BatchId,
    created_at: DateTime<Local>,
    units: Mutex<Option<Vec<UnitOfWork>>>,
    progress: ProgressAggregator,
    abort: Arc<AtomicBool>,
    result: Mutex<Option<BatchResult>>,
    finished_at: Mutex<Option<Instant>>,
}

impl BatchSession {
    fn new(id: BatchId, units: Vec<UnitOfWork>) -> Self {
        Self {
            id,
            created_at: Local::now(),
            progress: ProgressAggregator::new(units.len()),
            units: Mutex::new(Some(units)),
            abort: Arc::new(AtomicBool::new(false)),
            result: Mutex::new(None),
            finished_at: Mutex::new(None),
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn progress(&self) -> &ProgressAggregator {
        &self.progress
    }

    /// 取走题目；只能成功一次，用于防止同一批次被重复启动
    pub fn take_units(&self) -> Option<Vec<UnitOfWork>> {
        self.units.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// 请求中止：不再派发新题目
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn result(&self) -> Option<BatchResult> {
        self.result.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn set_result(&self, result: BatchResult) {
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
    }

    pub(crate) fn mark_finished(&self) {
        self.finished_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(Instant::now);
    }

    /// 结束时间超过 ttl 视为过期；未结束的批次永不过期
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.finished_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|finished| now.saturating_duration_since(finished) >= ttl)
    }
}

/// 批次注册表
pub struct BatchRegistry {
    sessions: RwLock<HashMap<BatchId, Arc<BatchSession>>>,
    hub: Arc<BroadcastHub>,
    ttl: Duration,
}

impl BatchRegistry {
    pub fn new(hub: Arc<BroadcastHub>, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            hub,
            ttl,
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// 创建批次，返回批次标识
    pub fn create(&self, units: Vec<UnitOfWork>) -> BatchId {
        let id = BatchId::new();
        let total = units.len();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(BatchSession::new(id, units)));
        info!("📦 创建批次 {}，共 {} 道题目", id.short(), total);
        id
    }

    pub fn lookup(&self, batch_id: &BatchId) -> Option<Arc<BatchSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(batch_id)
            .cloned()
    }

    /// 移除批次并关闭其全部订阅
    pub fn evict(&self, batch_id: &BatchId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(batch_id)
            .is_some();
        if removed {
            let closed = self.hub.close(batch_id);
            debug!("[批次 {}] 已移除，关闭 {} 个订阅", batch_id.short(), closed);
        }
        removed
    }

    /// 清理已结束且超过 TTL 的批次，返回清理数量
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<BatchId> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|session| session.is_expired(now, self.ttl))
            .map(|session| session.id())
            .collect();

        expired.iter().filter(|id| self.evict(id)).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 订阅批次进度；订阅后立即收到一个状态快照
    pub fn attach(
        &self,
        batch_id: &BatchId,
    ) -> AppResult<(SubscriberId, mpsc::UnboundedReceiver<ProgressEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.attach_sink(batch_id, Box::new(tx))?;
        Ok((id, rx))
    }

    pub fn attach_sink(&self, batch_id: &BatchId, sink: Box<dyn EventSink>) -> AppResult<SubscriberId> {
        let session = self
            .lookup(batch_id)
            .ok_or(BatchError::NotFound { batch_id: *batch_id })?;

        let id = self
            .hub
            .subscribe_with(*batch_id, sink, || {
                ProgressEvent::snapshot(&session.progress().snapshot())
            })
            .map_err(|e: DeliveryError| BatchError::Orchestration {
                message: format!("快照投递失败: {}", e),
            })?;
        Ok(id)
    }

    pub fn detach(&self, batch_id: &BatchId, subscriber: SubscriberId) -> bool {
        self.hub.unsubscribe(batch_id, subscriber)
    }
}
