//! 报告写入服务 - 业务能力层
//!
//! 只负责"把一个批次的结果写成 markdown 报告"，不关心流程

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{BatchId, BatchSummary, Outcome};

/// 报告输出接口
///
/// 返回值是报告引用（文件路径），随 completed 事件一起下发
pub trait BatchReporter: Send + Sync {
    fn report(
        &self,
        batch_id: &BatchId,
        outcomes: &[Outcome],
        summary: &BatchSummary,
    ) -> AppResult<String>;
}

/// 报告写入服务
///
/// 职责：
/// - 汇总统计表
/// - 按题目顺序输出每道题的解答或错误
/// - 列出失败题目
pub struct ReportWriter {
    output_dir: PathBuf,
    file_name: Option<String>,
    source_dir: Option<PathBuf>,
}

impl ReportWriter {
    /// 文件名按批次生成：`rapor_<短标识>.md`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_name: None,
            source_dir: None,
        }
    }

    /// 使用固定文件名
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// 题目图片所在目录，存在时在报告里插入图片引用
    pub fn with_source_dir(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(source_dir.into());
        self
    }

    fn target_path(&self, batch_id: &BatchId) -> PathBuf {
        let name = self
            .file_name
            .clone()
            .unwrap_or_else(|| format!("rapor_{}.md", batch_id.short()));
        self.output_dir.join(name)
    }
}

impl BatchReporter for ReportWriter {
    fn report(
        &self,
        batch_id: &BatchId,
        outcomes: &[Outcome],
        summary: &BatchSummary,
    ) -> AppResult<String> {
        let path = self.target_path(batch_id);
        let path_str = path.display().to_string();
        debug!("写入报告: {} | 题目数: {}", path_str, outcomes.len());

        fs::create_dir_all(&self.output_dir).map_err(|e| {
            AppError::file_write_failed(self.output_dir.display().to_string(), e)
        })?;

        let content = render_report(outcomes, summary, self.source_dir.as_deref());
        fs::write(&path, content).map_err(|e| AppError::file_write_failed(&path_str, e))?;

        info!("📄 报告已生成: {}", path_str);
        Ok(path_str)
    }
}

/// 生成报告正文
pub fn render_report(outcomes: &[Outcome], summary: &BatchSummary, source_dir: Option<&Path>) -> String {
    const RULE: &str = "---";
    let mut lines: Vec<String> = vec![
        "# 📝 Soru Çözüm Raporu".to_string(),
        String::new(),
        format!(
            "**Oluşturulma Tarihi**: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ),
    ];
    if let Some(dir) = source_dir {
        lines.push(format!("**Kaynak Klasör**: `{}`", dir.display()));
    }

    lines.extend([
        String::new(),
        RULE.to_string(),
        String::new(),
        "## 📊 Özet İstatistikler".to_string(),
        String::new(),
        "| Metrik | Değer |".to_string(),
        "|--------|-------|".to_string(),
        format!("| **Toplam Soru** | {} |", summary.total),
        format!("| **Başarılı** | {} ✅ |", summary.succeeded),
        format!("| **Başarısız** | {} ❌ |", summary.failed),
        format!("| **Başarı Oranı** | {:.1}% |", summary.success_rate),
        format!("| **Toplam Süre** | {:.1} saniye |", summary.total_elapsed.as_secs_f64()),
        format!("| **Ortalama Süre** | {:.1} saniye/soru |", summary.avg_elapsed.as_secs_f64()),
        String::new(),
        RULE.to_string(),
        String::new(),
        "## 📋 Çözümler".to_string(),
        String::new(),
    ]);

    for (i, outcome) in outcomes.iter().enumerate() {
        lines.push(format!("### Soru {}: `{}`", i + 1, outcome.identity()));
        lines.push(String::new());

        if let Some(dir) = source_dir {
            let image_path = dir.join(outcome.identity());
            if image_path.exists() {
                lines.push(format!("![{}]({})", outcome.identity(), image_path.display()));
                lines.push(String::new());
            }
        }

        match outcome.value() {
            Some(solution) => {
                if let Some(label) = outcome.label() {
                    lines.push(match outcome.sublabel() {
                        Some(sub) => format!("**🏷️ Konu**: {} / {}", label, sub),
                        None => format!("**🏷️ Konu**: {}", label),
                    });
                    lines.push(String::new());
                }
                lines.extend([
                    format!("**⏱️ Çözüm Süresi**: {:.1}s", outcome.elapsed().as_secs_f64()),
                    String::new(),
                    "#### 💡 Çözüm:".to_string(),
                    String::new(),
                    solution.to_string(),
                    String::new(),
                ]);
            }
            None => {
                lines.push(format!(
                    "**❌ Hata**: {}",
                    outcome.error().unwrap_or("bilinmeyen hata")
                ));
                lines.push(String::new());
            }
        }
        lines.push(RULE.to_string());
        lines.push(String::new());
    }

    let failed: Vec<&Outcome> = outcomes.iter().filter(|o| !o.success()).collect();
    if !failed.is_empty() {
        lines.push("## ⚠️ Başarısız Sorular".to_string());
        lines.push(String::new());
        lines.extend(failed.iter().map(|o| {
            format!("- `{}`: {}", o.identity(), o.error().unwrap_or("bilinmeyen hata"))
        }));
        lines.extend([String::new(), RULE.to_string(), String::new()]);
    }

    lines.push(String::new());
    lines.push("*Bu rapor paralel soru çözücü tarafından otomatik oluşturulmuştur.*".to_string());

    let mut report = lines.join("\n");
    report.push('\n');
    report
}
