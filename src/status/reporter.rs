//! 状态查询
//!
//! 供 Web 层调用的只读查询，所有读取都经过对应站点的锁。

use crate::error::StatusError;
use crate::status::registry::Registry;
use crate::status::site::SiteSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 可用率等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityTier {
    /// 可用率 > 0.9
    Healthy,
    /// 0.6 < 可用率 <= 0.9
    Degraded,
    /// 可用率 <= 0.6
    Critical,
}

impl AvailabilityTier {
    /// 由可用率计算等级
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.9 {
            AvailabilityTier::Healthy
        } else if ratio > 0.6 {
            AvailabilityTier::Degraded
        } else {
            AvailabilityTier::Critical
        }
    }

    /// 徽章颜色
    pub fn color(&self) -> &'static str {
        match self {
            AvailabilityTier::Healthy => "green",
            AvailabilityTier::Degraded => "yellow",
            AvailabilityTier::Critical => "red",
        }
    }
}

impl std::fmt::Display for AvailabilityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AvailabilityTier::Healthy => write!(f, "healthy"),
            AvailabilityTier::Degraded => write!(f, "degraded"),
            AvailabilityTier::Critical => write!(f, "critical"),
        }
    }
}

/// 状态报告器
#[derive(Debug, Clone)]
pub struct StatusReporter {
    registry: Arc<Registry>,
}

impl StatusReporter {
    /// 创建新的状态报告器
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// 当前是否在线
    pub async fn is_up(&self, identifier: &str) -> Result<bool, StatusError> {
        Ok(self.registry.state(identifier)?.is_up().await)
    }

    /// 最近一次成功时间
    pub async fn last_seen(&self, identifier: &str) -> Result<Option<DateTime<Utc>>, StatusError> {
        Ok(self.registry.state(identifier)?.last_seen().await)
    }

    /// 可用率，尚未探测时为 `None`
    pub async fn availability(&self, identifier: &str) -> Result<Option<f64>, StatusError> {
        Ok(self.registry.state(identifier)?.availability().await)
    }

    /// 单个站点的完整快照
    pub async fn snapshot(&self, identifier: &str) -> Result<SiteSnapshot, StatusError> {
        Ok(self.registry.state(identifier)?.snapshot().await)
    }

    /// 按配置顺序列出所有站点快照
    pub async fn snapshots(&self) -> Vec<SiteSnapshot> {
        let mut snapshots = Vec::with_capacity(self.registry.len());
        for state in self.registry.states() {
            snapshots.push(state.snapshot().await);
        }
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, GlobalConfig, ProbeMode, SiteConfig};

    fn create_test_registry() -> Arc<Registry> {
        let config = Config {
            global: GlobalConfig::default(),
            sites: vec![SiteConfig {
                identifier: "blog".to_string(),
                url: "https://example.com".to_string(),
                mode: ProbeMode::Http,
                interval_seconds: None,
                timeout_seconds: None,
                proxy: None,
                insecure_skip_verify: false,
            }],
        };
        let (registry, _contexts) = Registry::build(&config);
        Arc::new(registry)
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(AvailabilityTier::from_ratio(1.0), AvailabilityTier::Healthy);
        assert_eq!(AvailabilityTier::from_ratio(0.91), AvailabilityTier::Healthy);
        assert_eq!(AvailabilityTier::from_ratio(0.9), AvailabilityTier::Degraded);
        assert_eq!(AvailabilityTier::from_ratio(0.61), AvailabilityTier::Degraded);
        assert_eq!(AvailabilityTier::from_ratio(0.6), AvailabilityTier::Critical);
        assert_eq!(AvailabilityTier::from_ratio(0.0), AvailabilityTier::Critical);
    }

    #[test]
    fn test_tier_color() {
        assert_eq!(AvailabilityTier::Healthy.color(), "green");
        assert_eq!(AvailabilityTier::Degraded.color(), "yellow");
        assert_eq!(AvailabilityTier::Critical.color(), "red");
        assert_eq!(AvailabilityTier::Degraded.to_string(), "degraded");
    }

    #[tokio::test]
    async fn test_queries_on_known_site() {
        let registry = create_test_registry();
        let reporter = StatusReporter::new(Arc::clone(&registry));

        assert!(!reporter.is_up("blog").await.unwrap());
        assert!(reporter.last_seen("blog").await.unwrap().is_none());
        assert!(reporter.availability("blog").await.unwrap().is_none());

        let state = registry.state("blog").unwrap();
        state.record(true).await;
        state.record(false).await;

        assert!(!reporter.is_up("blog").await.unwrap());
        assert!(reporter.last_seen("blog").await.unwrap().is_some());
        assert_eq!(reporter.availability("blog").await.unwrap(), Some(0.5));
        assert_eq!(reporter.snapshots().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_identifier_is_not_found() {
        let reporter = StatusReporter::new(create_test_registry());
        let expected = StatusError::NotFound {
            identifier: "missing".to_string(),
        };

        assert_eq!(reporter.is_up("missing").await, Err(expected.clone()));
        assert_eq!(reporter.last_seen("missing").await, Err(expected.clone()));
        assert_eq!(reporter.availability("missing").await, Err(expected.clone()));
        assert_eq!(reporter.snapshot("missing").await, Err(expected));
    }
}
