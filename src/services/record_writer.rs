//! 结果记录服务 - 业务能力层
//!
//! 只负责"把记录追加写入 jsonl 文件"能力

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::OutcomeRecord;

/// 结果存储接口
pub trait OutcomeStore: Send + Sync {
    fn store(&self, records: &[OutcomeRecord]) -> AppResult<()>;
}

/// 结果记录服务
///
/// 每条记录一行 JSON，追加写入
pub struct RecordWriter {
    records_file_path: PathBuf,
}

impl RecordWriter {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            records_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.records_file_path
    }
}

impl OutcomeStore for RecordWriter {
    fn store(&self, records: &[OutcomeRecord]) -> AppResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let path_str = self.records_file_path.display().to_string();
        debug!("写入结果记录: {} | 条数: {}", path_str, records.len());

        if let Some(parent) = self.records_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| AppError::file_write_failed(parent.display().to_string(), e))?;
            }
        }

        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.records_file_path)
            .map_err(|e| AppError::file_write_failed(&path_str, e))?;
        file.write_all(buf.as_bytes())
            .map_err(|e| AppError::file_write_failed(&path_str, e))?;

        Ok(())
    }
}

impl Default for RecordWriter {
    fn default() -> Self {
        Self::with_path("output/records.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchId, Outcome};
    use std::time::Duration;

    #[test]
    fn test_records_are_appended_as_json_lines() {
        let dir = std::env::temp_dir().join(format!("records-{}", uuid::Uuid::now_v7()));
        let writer = RecordWriter::with_path(dir.join("nested").join("records.jsonl"));
        let batch_id = BatchId::new();

        let ok = Outcome::succeeded(0, "a.png", "42", Duration::from_millis(1500))
            .with_label("Matematik", None);
        let bad = Outcome::failed(1, "b.png", "failed after 3 attempts", Duration::from_secs(2));

        writer
            .store(&[OutcomeRecord::from_outcome(&ok, batch_id)])
            .unwrap();
        writer
            .store(&[OutcomeRecord::from_outcome(&bad, batch_id)])
            .unwrap();

        let content = fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["identity"], "a.png");
        assert_eq!(lines[0]["solution"], "42");
        assert_eq!(lines[0]["elapsed"], 1.5);
        assert_eq!(lines[0]["batch_id"], batch_id.to_string());
        assert_eq!(lines[1]["success"], false);
        assert!(lines[1]["solution"].is_null());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_empty_store_creates_nothing() {
        let dir = std::env::temp_dir().join(format!("records-{}", uuid::Uuid::now_v7()));
        let writer = RecordWriter::with_path(dir.join("records.jsonl"));
        writer.store(&[]).unwrap();
        assert!(!writer.path().exists());
    }
}
