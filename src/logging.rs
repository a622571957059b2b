//! 日志系统模块
//!
//! 基于 tracing 的结构化日志，`log` 记录经 LogTracer 转入 tracing。

use log::LevelFilter;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::{filter::Directive, fmt, prelude::*, registry, EnvFilter, Layer};

/// 进程内日志是否已初始化
static LOGGING_INITIALIZED: OnceLock<Mutex<bool>> = OnceLock::new();

/// 日志配置结构
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径（可选）
    pub file_path: Option<PathBuf>,
    /// 是否输出到控制台，为 false 且设置了文件路径时只写文件
    pub console: bool,
    /// 是否使用JSON格式
    pub json_format: bool,
    /// 模块级别日志控制
    pub module_levels: HashMap<String, LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        // HTTP 栈的连接级日志在 trace 级别下过于嘈杂
        let module_levels = ["hyper", "hyper_util", "reqwest", "h2", "rustls"]
            .into_iter()
            .map(|module| (module.to_string(), LevelFilter::Warn))
            .collect();

        Self {
            level: LevelFilter::Info,
            file_path: None,
            console: true,
            json_format: false,
            module_levels,
        }
    }
}

impl LogConfig {
    /// 以指定级别创建默认配置
    pub fn with_level(level: LevelFilter) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// 改为只写入指定文件
    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self.console = false;
        self
    }
}

/// 日志系统管理器
#[derive(Debug)]
pub struct LoggingSystem {
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 进程内只真正初始化一次，重复调用直接返回。
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        let mut initialized = LOGGING_INITIALIZED
            .get_or_init(|| Mutex::new(false))
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if !*initialized {
            Self::init_log_tracer()?;
            Self::init_tracing_subscriber(&config)?;
            *initialized = true;
        }

        Ok(Self { config })
    }

    /// 本实例使用的配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// 初始化 LogTracer（log crate 到 tracing 的桥接）
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

        LOG_TRACER_INIT
            .get_or_init(|| LogTracer::init().map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;
        Ok(())
    }

    fn build_filter(config: &LogConfig) -> EnvFilter {
        let mut env_filter =
            EnvFilter::from_default_env().add_directive(Self::level_directive(config.level));

        for (module, level) in &config.module_levels {
            match format!("{}={}", module, Self::level_to_string(*level)).parse::<Directive>() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(e) => eprintln!("忽略无效的模块日志级别 {module}: {e}"),
            }
        }

        env_filter
    }

    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let env_filter = Self::build_filter(config);

        let fmt_layer = if config.json_format {
            fmt::layer()
                .json()
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_ansi(true)
                .with_target(true)
                .boxed()
        };

        let result = match (config.console, &config.file_path) {
            (false, Some(file_path)) => {
                let file = Self::open_log_file(file_path)?;
                let file_layer = fmt::layer()
                    .with_writer(file)
                    .with_timer(fmt::time::ChronoUtc::rfc_3339())
                    .with_ansi(false);
                registry().with(env_filter).with(file_layer).try_init()
            }
            _ => registry().with(env_filter).with(fmt_layer).try_init(),
        };

        match result {
            Ok(()) => {
                tracing::debug!("日志配置: {:?}", config);
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                // 其他组件（如测试框架）已设置全局 subscriber
                if error_msg.contains("already been set")
                    || error_msg.contains("already initialized")
                {
                    Ok(())
                } else {
                    Err(anyhow::anyhow!(
                        "tracing subscriber初始化失败: {}",
                        error_msg
                    ))
                }
            }
        }
    }

    /// 以追加方式打开日志文件，必要时创建父目录
    fn open_log_file(path: &Path) -> anyhow::Result<File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("创建日志目录失败 {}: {}", parent.display(), e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow::anyhow!("创建日志文件失败 {}: {}", path.display(), e))
    }

    fn level_directive(level: LevelFilter) -> Directive {
        match level.to_level() {
            Some(level) => Directive::from(match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            }),
            None => Directive::from(tracing_subscriber::filter::LevelFilter::OFF),
        }
    }

    fn level_to_string(level: LevelFilter) -> &'static str {
        match level {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        }
    }
}
