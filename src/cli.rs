//! 命令行参数
//!
//! 命令行参数优先级最高：配置文件 < 环境变量 < 命令行

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::Config;

/// 并行解题：把题目图片交给视觉推理服务并生成报告
#[derive(Debug, Parser)]
#[command(name = "question_solver", version)]
pub struct CliArgs {
    /// 题目图片所在目录
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// 报告文件路径，例如 ./output/rapor.md
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 同时处理的最大题目数
    #[arg(short, long)]
    pub concurrent: Option<usize>,
}

impl CliArgs {
    /// 用命令行参数覆盖配置
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(input) = self.input {
            config.questions_dir = input.display().to_string();
        }
        if let Some(output) = self.output {
            match output.file_name() {
                Some(name) => {
                    let parent = output.parent().filter(|p| !p.as_os_str().is_empty());
                    config.output_dir = parent.unwrap_or(Path::new(".")).display().to_string();
                    config.report_file = name.to_string_lossy().into_owned();
                }
                None => config.output_dir = output.display().to_string(),
            }
        }
        if let Some(concurrent) = self.concurrent {
            config.max_concurrent_requests = concurrent;
        }
        config
    }
}
