use anyhow::Result;
use clap::Parser;
use question_solver::{cli::CliArgs, logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // 加载配置：配置文件 < 环境变量 < 命令行
    let config = Config::load().map(|config| args.apply(config));

    // 初始化日志（配置加载失败时按默认级别输出错误）
    logger::init(config.as_ref().is_ok_and(|c| c.verbose_logging));
    let config = config?;
    config.ensure_dirs()?;

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
