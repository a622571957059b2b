//! srvmon 主程序入口

use anyhow::{Context, Result};
use srvmon::cli::{command_for, Args};
use srvmon::logging::LoggingSystem;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse_args();

    // 初始化日志系统
    let _logging_system =
        LoggingSystem::setup_logging(args.log_config()).context("初始化日志系统失败")?;

    // 执行命令
    if let Err(e) = command_for(&args.command).execute(&args).await {
        error!("命令执行失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
