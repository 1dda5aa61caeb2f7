use thiserror::Error;

use crate::models::BatchId;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 推理服务错误
    #[error("推理服务错误: {0}")]
    Remote(#[from] RemoteError),
    /// 批次编排错误
    #[error("批次错误: {0}")]
    Batch(#[from] BatchError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 缺少凭证（构造推理客户端时检查）
    #[error("缺少凭证: 环境变量 {var_name} 未设置")]
    MissingCredentials { var_name: String },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值非法
    #[error("配置项 {field} 非法: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 推理服务错误
///
/// 单次调用失败只会出现在重试调用器内部，不会越过它的边界
#[derive(Debug, Error)]
pub enum RemoteError {
    /// 单次调用超时
    #[error("第 {attempt} 次调用超时 ({timeout_secs} 秒)")]
    Timeout { attempt: usize, timeout_secs: u64 },
    /// 调用失败
    #[error("调用失败 ({model}): {message}")]
    CallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("返回内容为空 ({model})")]
    EmptyContent { model: String },
    /// 服务不可达
    #[error("推理服务不可达: {message}")]
    Unreachable { message: String },
}

/// 批次编排错误
#[derive(Debug, Error)]
pub enum BatchError {
    /// 批次不存在
    #[error("批次不存在: {batch_id}")]
    NotFound { batch_id: BatchId },
    /// 批次已经启动过
    #[error("批次已启动: {batch_id}")]
    AlreadyStarted { batch_id: BatchId },
    /// 启动前的准备失败（例如推理服务不可达）
    #[error("批次 {batch_id} 启动失败: {message}")]
    SetupFailed { batch_id: BatchId, message: String },
    /// 编排过程中的意外错误
    #[error("批次编排异常: {message}")]
    Orchestration { message: String },
}

/// 事件投递错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// 订阅者已断开
    #[error("订阅者已断开")]
    Disconnected,
    /// 订阅者拒绝接收
    #[error("订阅者拒绝接收: {0}")]
    Rejected(String),
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Batch(BatchError::Orchestration {
            message: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON序列化失败: {}", err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建缺少凭证错误
    pub fn missing_credentials(var_name: impl Into<String>) -> Self {
        AppError::Config(ConfigError::MissingCredentials {
            var_name: var_name.into(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建编排异常
    pub fn orchestration(message: impl Into<String>) -> Self {
        AppError::Batch(BatchError::Orchestration {
            message: message.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_message() {
        let err = AppError::missing_credentials("GEMINI_API_KEY");
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        assert!(matches!(
            err,
            AppError::Config(ConfigError::MissingCredentials { .. })
        ));
    }

    #[test]
    fn test_file_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = AppError::file_read_failed("a.png", io);
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("读取文件失败 (a.png): gone"));
    }
}
