//! 服务管理模块
//!
//! 负责组件初始化和生命周期：构建注册表 → 启动探测任务 → 提供 Web 服务。

use crate::config::{validate_config, Config};
use crate::health::{ProbeScheduler, Scheduler, SiteContext};
use crate::status::{Registry, StatusReporter};
use crate::web::WebServer;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// 监控服务
pub struct MonitorService {
    /// 已验证的配置
    config: Config,
    /// 站点注册表
    registry: Arc<Registry>,
    /// 待启动的站点任务
    contexts: Vec<SiteContext>,
    /// 任务调度器
    scheduler: ProbeScheduler,
}

impl MonitorService {
    /// 校验配置并创建服务，此时尚未启动任何任务
    pub fn new(config: Config) -> crate::error::Result<Self> {
        validate_config(&config)?;
        let (registry, contexts) = Registry::build(&config);
        info!("初始化完成，共 {} 个站点", registry.len());

        Ok(Self {
            config,
            registry: Arc::new(registry),
            contexts,
            scheduler: ProbeScheduler::new(),
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn reporter(&self) -> StatusReporter {
        StatusReporter::new(self.registry())
    }

    /// 绑定配置中的地址并运行，直到 `shutdown` 完成
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let web = WebServer::new(self.config.global.web.clone(), self.registry());
        let listener = web.bind().await.context("绑定Web服务器地址失败")?;
        self.run_with_listener(listener, shutdown).await
    }

    /// 在已绑定的监听器上运行
    pub async fn run_with_listener<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            config,
            registry,
            contexts,
            scheduler,
        } = self;

        scheduler.start(contexts).await.context("启动探测任务失败")?;

        let web = WebServer::new(config.global.web, registry);
        let served = web.serve(listener, shutdown).await;

        scheduler.stop().await?;
        info!("监控服务已停止");
        served
    }
}
