//! 工作单元与结果
//!
//! `UnitOfWork` 创建后不可变；`Outcome` 只能通过 `succeeded` / `failed` 构造，
//! 以保证 success 与 value / error 的一致性

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::BatchId;

/// 一道题目（一张图片）
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    index: usize,
    identity: String,
    payload: Vec<u8>,
    payload_kind: String,
}

impl UnitOfWork {
    pub fn new(
        index: usize,
        identity: impl Into<String>,
        payload: Vec<u8>,
        payload_kind: impl Into<String>,
    ) -> Self {
        Self {
            index,
            identity: identity.into(),
            payload,
            payload_kind: payload_kind.into(),
        }
    }

    /// 按输入顺序分配索引 0..n
    pub fn from_inputs<I>(inputs: I) -> Vec<Self>
    where
        I: IntoIterator<Item = (String, Vec<u8>, String)>,
    {
        inputs
            .into_iter()
            .enumerate()
            .map(|(index, (identity, payload, kind))| Self::new(index, identity, payload, kind))
            .collect()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// 标识（通常为文件名）
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// 类 MIME 标签，如 `image/png`
    pub fn payload_kind(&self) -> &str {
        &self.payload_kind
    }
}

/// 单个工作单元的处理结果
///
/// 反序列化经过 `OutcomeRaw` 校验，不满足 success/value/error 一致性的输入会被拒绝
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OutcomeRaw")]
pub struct Outcome {
    index: usize,
    identity: String,
    success: bool,
    value: Option<String>,
    error: Option<String>,
    #[serde(with = "duration_secs")]
    elapsed: Duration,
    label: Option<String>,
    sublabel: Option<String>,
}

impl Outcome {
    /// 成功结果
    pub fn succeeded(
        index: usize,
        identity: impl Into<String>,
        value: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            index,
            identity: identity.into(),
            success: true,
            value: Some(value.into()),
            error: None,
            elapsed,
            label: None,
            sublabel: None,
        }
    }

    /// 失败结果
    pub fn failed(
        index: usize,
        identity: impl Into<String>,
        error: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            index,
            identity: identity.into(),
            success: false,
            value: None,
            error: Some(error.into()),
            elapsed,
            label: None,
            sublabel: None,
        }
    }

    /// 附加分类标签
    pub fn with_label(mut self, label: impl Into<String>, sublabel: Option<String>) -> Self {
        self.label = Some(label.into());
        self.sublabel = sublabel;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// 解答文本（仅成功时存在）
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// 错误信息（仅失败时存在）
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// 自第一次尝试开始的总耗时
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn sublabel(&self) -> Option<&str> {
        self.sublabel.as_deref()
    }
}

/// 未经校验的反序列化形态
#[derive(Deserialize)]
struct OutcomeRaw {
    index: usize,
    identity: String,
    success: bool,
    value: Option<String>,
    error: Option<String>,
    #[serde(with = "duration_secs")]
    elapsed: Duration,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    sublabel: Option<String>,
}

impl TryFrom<OutcomeRaw> for Outcome {
    type Error = String;

    fn try_from(raw: OutcomeRaw) -> Result<Self, Self::Error> {
        let outcome = match (raw.success, raw.value, raw.error) {
            (true, Some(value), None) => Self::succeeded(raw.index, raw.identity, value, raw.elapsed),
            (false, None, Some(error)) => Self::failed(raw.index, raw.identity, error, raw.elapsed),
            (success, value, error) => {
                return Err(format!(
                    "结果不一致 (题目 {}): success={} value={} error={}",
                    raw.index,
                    success,
                    if value.is_some() { "有" } else { "无" },
                    if error.is_some() { "有" } else { "无" },
                ))
            }
        };
        Ok(match raw.label {
            Some(label) => outcome.with_label(label, raw.sublabel),
            None => outcome,
        })
    }
}

/// 交给存储层的记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeRecord {
    pub identity: String,
    pub success: bool,
    pub solution: Option<String>,
    pub error: Option<String>,
    pub elapsed: f64,
    pub label: Option<String>,
    pub sublabel: Option<String>,
    pub batch_id: BatchId,
}

impl OutcomeRecord {
    pub fn from_outcome(outcome: &Outcome, batch_id: BatchId) -> Self {
        Self {
            identity: outcome.identity.clone(),
            success: outcome.success,
            solution: outcome.value.clone(),
            error: outcome.error.clone(),
            elapsed: outcome.elapsed.as_secs_f64(),
            label: outcome.label.clone(),
            sublabel: outcome.sublabel.clone(),
            batch_id,
        }
    }
}

/// 以秒（f64）序列化 Duration
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
