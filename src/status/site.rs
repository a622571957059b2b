//! 站点状态记录
//!
//! 每个站点一份状态，由该站点唯一的探测任务写入，报告层并发读取。
//! 所有字段只能经由加锁的访问方法读写。

use crate::config::{ProbeMode, SiteConfig};
use crate::status::reporter::AvailabilityTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// 状态翻转事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// down -> up
    Restored,
    /// up -> down
    WentDown,
}

/// 受锁保护的可变部分
#[derive(Debug, Clone, Default, PartialEq)]
struct SiteRecord {
    up: bool,
    last_seen: Option<DateTime<Utc>>,
    probe_count: u64,
    success_count: u64,
}

impl SiteRecord {
    fn availability(&self) -> Option<f64> {
        if self.probe_count == 0 {
            None
        } else {
            Some(self.success_count as f64 / self.probe_count as f64)
        }
    }
}

/// 站点状态快照，整条记录在同一把锁内读出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSnapshot {
    /// 站点标识
    pub identifier: String,
    /// 探测目标
    pub target: String,
    /// 探测模式
    pub mode: ProbeMode,
    /// 当前是否在线
    pub up: bool,
    /// 最近一次探测成功的时间
    pub last_seen: Option<DateTime<Utc>>,
    /// 探测总次数
    pub probe_count: u64,
    /// 成功次数
    pub success_count: u64,
    /// 可用率（尚未探测时为空）
    pub availability: Option<f64>,
    /// 可用率等级
    pub tier: Option<AvailabilityTier>,
}

/// 站点状态
#[derive(Debug)]
pub struct SiteState {
    identifier: String,
    target: String,
    mode: ProbeMode,
    record: RwLock<SiteRecord>,
}

impl SiteState {
    /// 根据站点配置创建零值状态
    pub fn new(site: &SiteConfig) -> Self {
        Self::with_parts(site.identifier.clone(), site.url.clone(), site.mode)
    }

    /// 直接由各字段创建零值状态
    pub fn with_parts(identifier: String, target: String, mode: ProbeMode) -> Self {
        Self {
            identifier,
            target,
            mode,
            record: RwLock::new(SiteRecord::default()),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn mode(&self) -> ProbeMode {
        self.mode
    }

    /// 记录一次探测结果
    ///
    /// 读取旧状态、更新计数和写入新状态在同一个临界区内完成，
    /// 返回值仅在 `up` 翻转时为 `Some`。
    pub async fn record(&self, success: bool) -> Option<Transition> {
        self.record_at(success, Utc::now()).await
    }

    /// 以指定时间记录一次探测结果
    pub async fn record_at(&self, success: bool, now: DateTime<Utc>) -> Option<Transition> {
        let mut record = self.record.write().await;
        let was_up = record.up;

        record.probe_count += 1;
        if success {
            record.success_count += 1;
            record.last_seen = Some(now);
        }
        record.up = success;

        match (was_up, success) {
            (false, true) => Some(Transition::Restored),
            (true, false) => Some(Transition::WentDown),
            _ => None,
        }
    }

    /// 当前是否在线
    pub async fn is_up(&self) -> bool {
        self.record.read().await.up
    }

    /// 最近一次成功时间
    pub async fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.record.read().await.last_seen
    }

    /// 可用率 = 成功次数 / 探测次数
    pub async fn availability(&self) -> Option<f64> {
        self.record.read().await.availability()
    }

    /// 读取完整快照
    pub async fn snapshot(&self) -> SiteSnapshot {
        let record = self.record.read().await.clone();
        let availability = record.availability();

        SiteSnapshot {
            identifier: self.identifier.clone(),
            target: self.target.clone(),
            mode: self.mode,
            up: record.up,
            last_seen: record.last_seen,
            probe_count: record.probe_count,
            success_count: record.success_count,
            availability,
            tier: availability.map(AvailabilityTier::from_ratio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn create_test_state() -> SiteState {
        SiteState::with_parts(
            "blog".to_string(),
            "https://example.com".to_string(),
            ProbeMode::Http,
        )
    }

    #[tokio::test]
    async fn test_initial_state_is_zero() {
        let state = create_test_state();
        let snapshot = state.snapshot().await;

        assert!(!snapshot.up);
        assert!(snapshot.last_seen.is_none());
        assert_eq!(snapshot.probe_count, 0);
        assert_eq!(snapshot.success_count, 0);
        assert!(snapshot.availability.is_none());
        assert!(snapshot.tier.is_none());
    }

    #[tokio::test]
    async fn test_success_sets_last_seen_and_counters() {
        let state = create_test_state();
        let now = Utc::now();

        let transition = state.record_at(true, now).await;
        assert_eq!(transition, Some(Transition::Restored));

        let snapshot = state.snapshot().await;
        assert!(snapshot.up);
        assert_eq!(snapshot.last_seen, Some(now));
        assert_eq!(snapshot.probe_count, 1);
        assert_eq!(snapshot.success_count, 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_last_seen() {
        let state = create_test_state();
        let seen = Utc::now() - Duration::seconds(30);

        state.record_at(true, seen).await;
        let transition = state.record(false).await;

        assert_eq!(transition, Some(Transition::WentDown));
        assert!(!state.is_up().await);
        assert_eq!(state.last_seen().await, Some(seen));
        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.probe_count, 2);
        assert_eq!(snapshot.success_count, 1);
    }

    #[tokio::test]
    async fn test_transition_fires_once_per_edge() {
        let state = create_test_state();
        state.record(true).await;

        let mut transitions = Vec::new();
        for _ in 0..5 {
            if let Some(t) = state.record(false).await {
                transitions.push(t);
            }
        }
        assert_eq!(transitions, vec![Transition::WentDown]);

        let mut transitions = Vec::new();
        for _ in 0..3 {
            if let Some(t) = state.record(true).await {
                transitions.push(t);
            }
        }
        assert_eq!(transitions, vec![Transition::Restored]);
    }

    #[tokio::test]
    async fn test_initial_failures_do_not_transition() {
        let state = create_test_state();
        for _ in 0..3 {
            assert_eq!(state.record(false).await, None);
        }
        assert_eq!(state.snapshot().await.probe_count, 3);
    }

    #[tokio::test]
    async fn test_availability_three_of_five() {
        let state = create_test_state();
        for success in [true, true, true, false, false] {
            state.record(success).await;
        }

        let availability = state.availability().await.unwrap();
        assert!((availability - 0.6).abs() < f64::EPSILON);
        assert_eq!(
            state.snapshot().await.tier,
            Some(AvailabilityTier::Degraded)
        );
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_consistent_records() {
        let state = Arc::new(create_test_state());

        let writer = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                for i in 0..500 {
                    state.record(i % 3 != 0).await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let state = Arc::clone(&state);
            readers.push(tokio::spawn(async move {
                for _ in 0..200 {
                    let snapshot = state.snapshot().await;
                    assert!(snapshot.success_count <= snapshot.probe_count);
                    if snapshot.up {
                        assert!(snapshot.last_seen.is_some());
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.probe_count, 500);
        assert_eq!(snapshot.success_count, 333);
    }
}
