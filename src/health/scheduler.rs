//! 任务调度器模块
//!
//! 每个站点一个独立任务：HTTP/TCP 站点按间隔循环探测，被动站点等待心跳。
//! 任务各自运行直到调度器停止。

use crate::config::{GlobalConfig, SiteConfig};
use crate::health::checker::{build_checker, Checker};
use crate::health::passive::{HeartbeatReceiver, PassiveMonitor};
use crate::health::result::ProbeOutcome;
use crate::status::{SiteState, Transition};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// 单个站点生效的探测参数
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    /// 探测间隔
    pub interval: Duration,
    /// 单次探测超时，被动模式下为心跳超时
    pub timeout: Duration,
    /// 上游代理
    pub proxy: Option<String>,
    /// 是否跳过 TLS 证书校验
    pub insecure_skip_verify: bool,
}

impl ProbeSettings {
    /// 合并站点配置与全局默认值
    pub fn from_site(site: &SiteConfig, global: &GlobalConfig) -> Self {
        Self {
            interval: site.interval(global),
            timeout: site.timeout(global),
            proxy: site.proxy.clone(),
            insecure_skip_verify: site.insecure_skip_verify,
        }
    }
}

/// 启动一个站点任务所需的全部内容
#[derive(Debug)]
pub struct SiteContext {
    /// 站点状态，与注册表共享
    pub state: Arc<SiteState>,
    /// 探测参数
    pub settings: ProbeSettings,
    /// 心跳接收端，仅被动模式站点有
    pub heartbeats: Option<HeartbeatReceiver>,
}

/// 记录一次探测结果并输出日志
///
/// 只有状态翻转时才输出 info/warn 级别日志。
pub async fn record_outcome(state: &SiteState, outcome: &ProbeOutcome) -> Option<Transition> {
    let transition = state.record_at(outcome.success, outcome.timestamp).await;

    if outcome.success {
        trace!(
            identifier = %state.identifier(),
            code = outcome.code(),
            elapsed_ms = outcome.elapsed_ms(),
            "site is up"
        );
    } else {
        trace!(
            identifier = %state.identifier(),
            code = outcome.code(),
            err = outcome.error_message.as_deref().unwrap_or("N/A"),
            "site is down"
        );
    }

    match transition {
        Some(Transition::Restored) => info!(
            identifier = %state.identifier(),
            mode = %state.mode(),
            target = %state.target(),
            "site restored"
        ),
        Some(Transition::WentDown) => warn!(
            identifier = %state.identifier(),
            mode = %state.mode(),
            target = %state.target(),
            code = outcome.code(),
            err = outcome.error_message.as_deref().unwrap_or("N/A"),
            "site went down"
        ),
        None => {}
    }

    transition
}

/// 主动探测循环，永不返回
///
/// 单次探测卡住只会推迟下一次探测。
pub async fn run_active(checker: Arc<dyn Checker>, state: Arc<SiteState>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let outcome = checker.probe().await;
        record_outcome(&state, &outcome).await;
    }
}

/// 调度器状态
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    /// 运行中的任务数量
    pub running_tasks: usize,
    /// 调度器是否运行中
    pub is_running: bool,
    /// 最后更新时间
    pub last_update: Instant,
}

/// 任务调度器trait，定义调度接口
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// 为每个站点启动任务
    ///
    /// 任一探测器构建失败时不启动任何任务。
    async fn start(&self, sites: Vec<SiteContext>) -> Result<()>;

    /// 停止所有任务
    async fn stop(&self) -> Result<()>;

    /// 获取调度器状态
    async fn get_status(&self) -> SchedulerStatus;
}

/// 准备好待启动的任务
enum PreparedTask {
    Active {
        checker: Arc<dyn Checker>,
        state: Arc<SiteState>,
        interval: Duration,
    },
    Passive(PassiveMonitor),
}

impl PreparedTask {
    fn prepare(context: SiteContext) -> Result<Self> {
        let SiteContext {
            state,
            settings,
            heartbeats,
        } = context;

        if settings.interval.is_zero() || settings.timeout.is_zero() {
            anyhow::bail!("探测间隔和超时不能为0: {}", state.identifier());
        }

        let checker = build_checker(state.mode(), state.target(), &settings)
            .with_context(|| format!("创建探测器失败: {}", state.identifier()))?;

        match (checker, heartbeats) {
            (Some(checker), _) => Ok(PreparedTask::Active {
                checker,
                state,
                interval: settings.interval,
            }),
            (None, Some(heartbeats)) => Ok(PreparedTask::Passive(PassiveMonitor::new(
                state,
                settings.timeout,
                heartbeats,
            ))),
            (None, None) => anyhow::bail!("被动模式站点缺少心跳通道: {}", state.identifier()),
        }
    }

    fn spawn(self) -> JoinHandle<()> {
        match self {
            PreparedTask::Active {
                checker,
                state,
                interval,
            } => tokio::spawn(run_active(checker, state, interval)),
            PreparedTask::Passive(monitor) => tokio::spawn(monitor.run()),
        }
    }
}

/// 任务调度器实现
#[derive(Default)]
pub struct ProbeScheduler {
    /// 运行中的任务，按站点标识索引
    tasks: RwLock<HashMap<String, JoinHandle<()>>>,
}

impl ProbeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 运行中的任务数量
    pub async fn running_tasks(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[async_trait]
impl Scheduler for ProbeScheduler {
    async fn start(&self, sites: Vec<SiteContext>) -> Result<()> {
        info!("启动任务调度器，站点数量: {}", sites.len());

        let mut prepared = Vec::with_capacity(sites.len());
        for context in sites {
            let identifier = context.state.identifier().to_string();
            prepared.push((identifier, PreparedTask::prepare(context)?));
        }

        let mut tasks = self.tasks.write().await;
        for (identifier, task) in prepared {
            debug!("启动站点任务: {}", identifier);
            if let Some(old) = tasks.insert(identifier, task.spawn()) {
                old.abort();
            }
        }

        info!("任务调度器启动完成");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("停止任务调度器");

        let mut tasks = self.tasks.write().await;
        for (identifier, task) in tasks.drain() {
            task.abort();
            debug!("停止任务: {}", identifier);
        }

        info!("任务调度器已停止");
        Ok(())
    }

    async fn get_status(&self) -> SchedulerStatus {
        let running_tasks = self.running_tasks().await;
        SchedulerStatus {
            running_tasks,
            is_running: running_tasks > 0,
            last_update: Instant::now(),
        }
    }
}

impl Drop for ProbeScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.get_mut().drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ProbeMode};
    use crate::status::Registry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 按预设序列返回结果的探测器
    struct ScriptedChecker {
        script: Vec<bool>,
        calls: AtomicUsize,
    }

    impl ScriptedChecker {
        fn new(script: Vec<bool>) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Checker for ScriptedChecker {
        fn mode(&self) -> ProbeMode {
            ProbeMode::Http
        }

        fn target(&self) -> &str {
            "scripted"
        }

        async fn probe(&self) -> ProbeOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.script.get(n).copied().unwrap_or(false) {
                ProbeOutcome::up().with_status_code(200)
            } else {
                ProbeOutcome::down("scripted failure")
            }
        }
    }

    fn create_test_state(mode: ProbeMode) -> Arc<SiteState> {
        Arc::new(SiteState::with_parts(
            "test".to_string(),
            "scripted".to_string(),
            mode,
        ))
    }

    fn site(identifier: &str, url: &str, mode: ProbeMode, proxy: Option<&str>) -> SiteConfig {
        SiteConfig {
            identifier: identifier.to_string(),
            url: url.to_string(),
            mode,
            interval_seconds: Some(60),
            timeout_seconds: Some(1),
            proxy: proxy.map(str::to_string),
            insecure_skip_verify: false,
        }
    }

    #[test]
    fn test_settings_fall_back_to_global() {
        let global = GlobalConfig::default();
        let mut config = site("a", "https://example.com", ProbeMode::Http, None);
        config.interval_seconds = None;

        let settings = ProbeSettings::from_site(&config, &global);
        assert_eq!(settings.interval, Duration::from_secs(global.interval_seconds));
        assert_eq!(settings.timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_record_outcome_reports_edges() {
        let state = create_test_state(ProbeMode::Http);

        assert_eq!(
            record_outcome(&state, &ProbeOutcome::up()).await,
            Some(Transition::Restored)
        );
        assert_eq!(record_outcome(&state, &ProbeOutcome::up()).await, None);
        assert_eq!(
            record_outcome(&state, &ProbeOutcome::down("boom")).await,
            Some(Transition::WentDown)
        );
        assert_eq!(record_outcome(&state, &ProbeOutcome::down("boom")).await, None);
    }

    /// 收集格式化后的日志输出
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_edge_events_logged_once_per_transition() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let state = create_test_state(ProbeMode::Http);
        record_outcome(&state, &ProbeOutcome::up()).await;
        for _ in 0..5 {
            record_outcome(&state, &ProbeOutcome::down("boom")).await;
        }

        let text = logs.text();
        assert_eq!(text.matches("site is up").count(), 1);
        assert_eq!(text.matches("site is down").count(), 5);
        assert_eq!(text.matches("site restored").count(), 1);
        assert_eq!(text.matches("site went down").count(), 1);
        assert!(text.contains("identifier=test"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_loop_counts() {
        let state = create_test_state(ProbeMode::Http);
        let checker = Arc::new(ScriptedChecker::new(vec![true, true, false, true, false]));

        let handle = tokio::spawn(run_active(
            checker.clone(),
            Arc::clone(&state),
            Duration::from_secs(10),
        ));

        // 探测发生在 0s、10s、20s、30s、40s
        tokio::time::sleep(Duration::from_secs(45)).await;
        handle.abort();

        let snapshot = state.snapshot().await;
        assert_eq!(checker.calls.load(Ordering::SeqCst), 5);
        assert_eq!(snapshot.probe_count, 5);
        assert_eq!(snapshot.success_count, 3);
        assert_eq!(snapshot.availability, Some(0.6));
        assert!(!snapshot.up);
    }

    #[tokio::test]
    async fn test_scheduler_start_and_stop() {
        let config = Config {
            global: GlobalConfig::default(),
            sites: vec![
                site("web", "http://127.0.0.1:1/", ProbeMode::Http, None),
                site("job", "", ProbeMode::Passive, None),
            ],
        };
        let (registry, contexts) = Registry::build(&config);
        let scheduler = ProbeScheduler::new();

        scheduler.start(contexts).await.unwrap();
        assert_eq!(scheduler.running_tasks().await, 2);
        assert!(scheduler.get_status().await.is_running);

        registry.heartbeat("job").unwrap();

        scheduler.stop().await.unwrap();
        let status = scheduler.get_status().await;
        assert_eq!(status.running_tasks, 0);
        assert!(!status.is_running);
    }

    #[tokio::test]
    async fn test_zero_interval_spawns_nothing() {
        let mut web = site("web", "https://example.com", ProbeMode::Http, None);
        web.interval_seconds = Some(0);
        let config = Config {
            global: GlobalConfig::default(),
            sites: vec![site("job", "", ProbeMode::Passive, None), web],
        };
        let (_registry, contexts) = Registry::build(&config);
        let scheduler = ProbeScheduler::new();

        let err = scheduler.start(contexts).await.unwrap_err();
        assert!(err.to_string().contains("web"));
        assert_eq!(scheduler.running_tasks().await, 0);
    }

    #[tokio::test]
    async fn test_bad_proxy_spawns_nothing() {
        let config = Config {
            global: GlobalConfig::default(),
            sites: vec![
                site("web", "https://example.com", ProbeMode::Http, None),
                site("db", "db:5432", ProbeMode::Tcp, Some("https://proxy:443")),
            ],
        };
        let (_registry, contexts) = Registry::build(&config);
        let scheduler = ProbeScheduler::new();

        let err = scheduler.start(contexts).await.unwrap_err();
        assert!(err.to_string().contains("db"));
        assert_eq!(scheduler.running_tasks().await, 0);
    }
}
