//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{Config, ConfigLoader, FileConfigLoader, SiteConfig};
use crate::error::{ConfigError, Result};
use crate::health::{build_checker, ProbeOutcome, ProbeSettings};
use crate::service::MonitorService;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 按子命令选择处理器
pub fn command_for(command: &Commands) -> Box<dyn Command> {
    match command {
        Commands::Start { .. } => Box::new(StartCommand),
        Commands::Check { .. } => Box::new(CheckCommand),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    }
}

async fn load_config(args: &Args) -> Result<Config> {
    let config_path = args.get_config_path();
    info!("加载配置文件: {}", config_path.display());
    FileConfigLoader::default().load_from_file(config_path).await
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate { verbose } = &args.command {
            let config = load_config(args).await?;
            Self::print_summary(&config, *verbose);
        }
        Ok(())
    }
}

impl ValidateCommand {
    fn print_summary(config: &Config, verbose: bool) {
        println!("✓ 配置文件验证通过");
        println!("✓ 找到 {} 个站点配置", config.sites.len());

        if verbose {
            println!("全局配置:");
            println!("  探测间隔: {}秒", config.global.interval_seconds);
            println!("  超时时间: {}秒", config.global.timeout_seconds);
            println!(
                "  Web监听: {}:{}",
                config.global.web.bind_address, config.global.web.port
            );
            println!("  徽章服务: {}", config.global.web.badge_base_url);

            println!("站点配置:");
            for (i, site) in config.sites.iter().enumerate() {
                println!("  {}. {} [{}] {}", i + 1, site.identifier, site.mode, site.url);
                println!(
                    "     间隔: {}秒, 超时: {}秒",
                    site.interval(&config.global).as_secs(),
                    site.timeout(&config.global).as_secs()
                );
                if let Some(proxy) = &site.proxy {
                    println!("     代理: {proxy}");
                }
                if site.insecure_skip_verify {
                    println!("     跳过证书校验");
                }
            }
        }
    }
}

/// 单个站点的一次性探测结果
#[derive(Debug, Serialize)]
pub struct CheckReport {
    /// 站点标识
    pub identifier: String,
    /// 探测模式
    pub mode: String,
    /// 探测目标
    pub target: String,
    /// 探测结果，被动模式站点为空
    pub outcome: Option<ProbeOutcome>,
}

/// 检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Check { site, format } = &args.command {
            let config = load_config(args).await?;
            let reports = Self::run_checks(&config, site.as_deref()).await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
                OutputFormat::Text => Self::print_text_reports(&reports),
            }
        }
        Ok(())
    }
}

impl CheckCommand {
    /// 对选中的站点各探测一次
    pub async fn run_checks(config: &Config, only: Option<&str>) -> Result<Vec<CheckReport>> {
        let sites: Vec<&SiteConfig> = config
            .sites
            .iter()
            .filter(|site| only.is_none_or(|id| site.identifier == id))
            .collect();

        if let (Some(id), true) = (only, sites.is_empty()) {
            return Err(ConfigError::ValidationError(format!("未找到站点: {id}")).into());
        }

        let probes = sites.into_iter().map(|site| async move {
            let settings = ProbeSettings::from_site(site, &config.global);
            let outcome = match build_checker(site.mode, &site.url, &settings)? {
                Some(checker) => Some(checker.probe().await),
                None => None,
            };
            Ok::<_, crate::error::SrvmonError>(CheckReport {
                identifier: site.identifier.clone(),
                mode: site.mode.to_string(),
                target: site.url.clone(),
                outcome,
            })
        });

        futures::future::join_all(probes).await.into_iter().collect()
    }

    fn print_text_reports(reports: &[CheckReport]) {
        for report in reports {
            match &report.outcome {
                Some(outcome) => {
                    let status_icon = if outcome.success { "✓" } else { "✗" };
                    println!(
                        "{} {} [{}] {} - code {} - {}ms",
                        status_icon,
                        report.identifier,
                        report.mode,
                        report.target,
                        outcome.code(),
                        outcome.elapsed_ms()
                    );
                    if let Some(error) = &outcome.error_message {
                        println!("  错误: {error}");
                    }
                }
                None => println!("- {} [{}] 被动模式，跳过", report.identifier, report.mode),
            }
        }
    }
}

/// 启动命令
pub struct StartCommand;

#[async_trait]
impl Command for StartCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Start { bind, port } = &args.command {
            let mut config = load_config(args).await?;

            if let Some(bind) = bind {
                config.global.web.bind_address = bind.clone();
            }
            if let Some(port) = port {
                config.global.web.port = *port;
            }
            let service = MonitorService::new(config)?;

            info!("{} v{} 启动", crate::APP_NAME, crate::VERSION);
            service.run(shutdown_signal()).await?;
        }
        Ok(())
    }
}

/// 等待 Ctrl+C
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("收到中断信号，正在关闭..."),
        Err(e) => {
            tracing::error!("监听中断信号失败: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalConfig, ProbeMode};
    use clap::Parser;
    use tokio::net::TcpListener;

    fn site(identifier: &str, url: &str, mode: ProbeMode) -> SiteConfig {
        SiteConfig {
            identifier: identifier.to_string(),
            url: url.to_string(),
            mode,
            interval_seconds: None,
            timeout_seconds: Some(2),
            proxy: None,
            insecure_skip_verify: false,
        }
    }

    #[tokio::test]
    async fn test_run_checks_all_sites() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = Config {
            global: GlobalConfig::default(),
            sites: vec![
                site("db", &addr.to_string(), ProbeMode::Tcp),
                site("cron", "", ProbeMode::Passive),
            ],
        };

        let reports = CheckCommand::run_checks(&config, None).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].outcome.as_ref().unwrap().success);
        assert!(reports[1].outcome.is_none());
        drop(listener);
    }

    #[tokio::test]
    async fn test_run_checks_unknown_site() {
        let config = Config {
            global: GlobalConfig::default(),
            sites: vec![site("cron", "", ProbeMode::Passive)],
        };

        assert!(CheckCommand::run_checks(&config, Some("nope")).await.is_err());
        let reports = CheckCommand::run_checks(&config, Some("cron")).await.unwrap();
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn test_version_command() {
        let args = Args::try_parse_from(["srvmon", "version", "--format", "json"]).unwrap();
        assert!(command_for(&args.command).execute(&args).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_missing_file() {
        let args = Args::try_parse_from([
            "srvmon",
            "--config",
            "/nonexistent/srvmon.toml",
            "validate",
        ])
        .unwrap();
        assert!(command_for(&args.command).execute(&args).await.is_err());
    }
}
