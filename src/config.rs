use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, AppResult, ConfigError};
use crate::services::RetryPolicy;

/// 默认配置文件
const DEFAULT_CONFIG_FILE: &str = "solver.toml";

/// 默认解题提示词
pub const DEFAULT_QUESTION_PROMPT: &str = "Bu soruyu çöz.

Lütfen şu formatta cevapla:
1. **Soru Analizi**: Sorunun ne istediğini kısaca açıkla
2. **Çözüm Adımları**: Adım adım çözümü göster
3. **Cevap**: Net ve kesin cevabı belirt

Türkçe açıklama yap. Matematiksel ifadeleri açık şekilde yaz.";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 推理服务配置 ---
    pub gemini_api_key: String,
    pub api_base_url: String,
    pub model_name: String,
    /// 同时在途的推理请求数量
    pub max_concurrent_requests: usize,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 每道题的最大尝试次数
    pub max_retries: usize,
    /// 线性退避基数（秒）
    pub retry_delay_secs: u64,
    /// 题目图片目录
    pub questions_dir: String,
    /// 输出目录
    pub output_dir: String,
    /// 报告文件名（位于 output_dir 下）
    pub report_file: String,
    /// 结果记录文件（JSON Lines）
    pub records_file: String,
    /// 已结束批次在注册表中的保留时间（秒）
    pub session_ttl_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    pub question_prompt: String,
    /// 实际读取的配置文件（未读取文件时为 None）
    #[serde(skip)]
    pub source: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model_name: "gemini-3-pro-preview".to_string(),
            max_concurrent_requests: 10,
            request_timeout_secs: 60,
            max_retries: 3,
            retry_delay_secs: 2,
            questions_dir: "questions".to_string(),
            output_dir: "output".to_string(),
            report_file: "rapor.md".to_string(),
            records_file: "output/records.jsonl".to_string(),
            session_ttl_secs: 3600,
            verbose_logging: false,
            question_prompt: DEFAULT_QUESTION_PROMPT.to_string(),
            source: None,
        }
    }
}

impl Config {
    /// 加载配置：配置文件（可选）+ 环境变量覆盖
    ///
    /// 此时日志尚未初始化，读取了哪个文件记录在 `source` 中，由启动日志输出
    pub fn load() -> AppResult<Self> {
        let path = std::env::var("SOLVER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = if Path::new(&path).exists() {
            Self {
                source: Some(path.clone()),
                ..Self::from_file(&path)?
            }
        } else {
            Self::default()
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| AppError::file_read_failed(path, e))?;
        Self::from_toml_str(&content, path)
    }

    /// 解析 TOML 文本，未出现的字段使用默认值
    pub fn from_toml_str(content: &str, path: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|source| {
            AppError::Config(ConfigError::TomlParseFailed {
                path: path.to_string(),
                source,
            })
        })
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(self) -> AppResult<Self> {
        Ok(Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY").unwrap_or(self.gemini_api_key),
            api_base_url: std::env::var("GEMINI_API_BASE_URL").unwrap_or(self.api_base_url),
            model_name: std::env::var("GEMINI_MODEL").unwrap_or(self.model_name),
            max_concurrent_requests: parse_env("MAX_CONCURRENT_REQUESTS", "usize")?
                .unwrap_or(self.max_concurrent_requests),
            request_timeout_secs: parse_env("REQUEST_TIMEOUT", "u64")?
                .unwrap_or(self.request_timeout_secs),
            max_retries: parse_env("MAX_RETRIES", "usize")?.unwrap_or(self.max_retries),
            retry_delay_secs: parse_env("RETRY_DELAY", "u64")?.unwrap_or(self.retry_delay_secs),
            questions_dir: std::env::var("QUESTIONS_DIR").unwrap_or(self.questions_dir),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(self.output_dir),
            report_file: std::env::var("REPORT_FILE").unwrap_or(self.report_file),
            records_file: std::env::var("RECORDS_FILE").unwrap_or(self.records_file),
            session_ttl_secs: parse_env("SESSION_TTL", "u64")?.unwrap_or(self.session_ttl_secs),
            verbose_logging: parse_env("VERBOSE_LOGGING", "bool")?.unwrap_or(self.verbose_logging),
            question_prompt: self.question_prompt,
            source: self.source,
        })
    }

    /// 校验配置；并发数为 0 时按 1 处理
    pub fn validate(&self) -> AppResult<()> {
        if self.max_concurrent_requests == 0 {
            warn!("⚠️ max_concurrent_requests 为 0，将按 1 处理");
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::Config(ConfigError::InvalidValue {
                field: "request_timeout_secs".to_string(),
                reason: "必须大于 0".to_string(),
            }));
        }
        if self.question_prompt.trim().is_empty() {
            return Err(AppError::Config(ConfigError::InvalidValue {
                field: "question_prompt".to_string(),
                reason: "提示词不能为空".to_string(),
            }));
        }
        Ok(())
    }

    /// 创建题目目录与输出目录（已存在时不做任何事）
    pub fn ensure_dirs(&self) -> AppResult<()> {
        for dir in [&self.questions_dir, &self.output_dir] {
            std::fs::create_dir_all(dir).map_err(|e| AppError::file_write_failed(dir.as_str(), e))?;
        }
        Ok(())
    }

    /// 实际使用的并发上限（至少为 1）
    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrent_requests.max(1)
    }

    /// 构建重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_secs(self.request_timeout_secs),
            Duration::from_secs(self.retry_delay_secs),
        )
    }
}

fn parse_env<T: std::str::FromStr>(var_name: &str, expected_type: &str) -> AppResult<Option<T>> {
    match std::env::var(var_name) {
        Ok(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            AppError::Config(ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            })
        }),
        Err(_) => Ok(None),
    }
}
