//! 进度广播 - 编排层
//!
//! 按批次管理订阅者；某个订阅者投递失败只会移除它自己，不影响其他订阅者。
//! 不做补发：订阅之前发布的事件不会再投递。

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::DeliveryError;
use crate::models::{BatchId, ProgressEvent};

/// 事件接收端
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &ProgressEvent) -> Result<(), DeliveryError>;
}

impl EventSink for mpsc::UnboundedSender<ProgressEvent> {
    fn deliver(&self, event: &ProgressEvent) -> Result<(), DeliveryError> {
        self.send(event.clone()).map_err(|_| DeliveryError::Disconnected)
    }
}

/// 订阅句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Subscribers = Vec<(SubscriberId, Box<dyn EventSink>)>;

/// 进度广播中心
pub struct BroadcastHub {
    subscribers: RwLock<HashMap<BatchId, Subscribers>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// 以 mpsc 通道订阅
    pub fn subscribe(&self, batch_id: BatchId) -> (SubscriberId, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.subscribe_sink(batch_id, Box::new(tx)), rx)
    }

    pub fn subscribe_sink(&self, batch_id: BatchId, sink: Box<dyn EventSink>) -> SubscriberId {
        let id = self.next_id();
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        subscribers.entry(batch_id).or_default().push((id, sink));
        debug!("[批次 {}] 新订阅者 {}", batch_id.short(), id);
        id
    }

    /// 订阅并立即投递一个初始事件
    ///
    /// 初始事件在写锁内生成并投递，之后发布的事件一定排在它后面
    pub fn subscribe_with<F>(
        &self,
        batch_id: BatchId,
        sink: Box<dyn EventSink>,
        initial: F,
    ) -> Result<SubscriberId, DeliveryError>
    where
        F: FnOnce() -> ProgressEvent,
    {
        let id = self.next_id();
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        sink.deliver(&initial())?;
        subscribers.entry(batch_id).or_default().push((id, sink));
        debug!("[批次 {}] 新订阅者 {}（已下发快照）", batch_id.short(), id);
        Ok(id)
    }

    pub fn unsubscribe(&self, batch_id: &BatchId, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = subscribers.get_mut(batch_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sub_id, _)| *sub_id != id);
        let removed = list.len() < before;
        if list.is_empty() {
            subscribers.remove(batch_id);
        }
        removed
    }

    /// 向批次的全部订阅者发布事件，返回成功投递的数量
    pub fn publish(&self, batch_id: &BatchId, event: &ProgressEvent) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();

        {
            let subscribers = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
            let Some(list) = subscribers.get(batch_id) else {
                return 0;
            };
            for (id, sink) in list {
                match sink.deliver(event) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        warn!("[批次 {}] 订阅者 {} 投递失败，移除: {}", batch_id.short(), id, e);
                        failed.push(*id);
                    }
                }
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(list) = subscribers.get_mut(batch_id) {
                list.retain(|(id, _)| !failed.contains(id));
                if list.is_empty() {
                    subscribers.remove(batch_id);
                }
            }
        }

        delivered
    }

    pub fn subscriber_count(&self, batch_id: &BatchId) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(batch_id)
            .map_or(0, Vec::len)
    }

    /// 移除批次的全部订阅者，返回移除数量
    pub fn close(&self, batch_id: &BatchId) -> usize {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(batch_id)
            .map_or(0, |list| list.len())
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
