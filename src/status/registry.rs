//! 站点注册表
//!
//! 启动时根据配置一次性构建，运行期间不增删站点。

use crate::config::Config;
use crate::error::StatusError;
use crate::health::passive::{heartbeat_channel, HeartbeatSender};
use crate::health::scheduler::{ProbeSettings, SiteContext};
use crate::status::site::SiteState;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// 注册表中的一个站点
#[derive(Debug)]
struct SiteEntry {
    state: Arc<SiteState>,
    /// 仅被动模式站点持有
    heartbeat: Option<HeartbeatSender>,
}

/// 站点注册表
#[derive(Debug, Default)]
pub struct Registry {
    sites: HashMap<String, SiteEntry>,
    /// 配置中的站点顺序
    order: Vec<String>,
}

impl Registry {
    /// 根据已验证的配置构建注册表
    ///
    /// 同时为每个站点生成探测任务上下文，被动模式站点的心跳通道在此时创建，
    /// 因此探测任务开始等待之前投递的心跳不会丢失。
    pub fn build(config: &Config) -> (Self, Vec<SiteContext>) {
        let mut registry = Registry::default();
        let mut contexts = Vec::with_capacity(config.sites.len());

        for site in &config.sites {
            if registry.sites.contains_key(&site.identifier) {
                warn!(identifier = %site.identifier, "站点标识重复，忽略后出现的配置");
                continue;
            }

            let state = Arc::new(SiteState::new(site));
            let (heartbeat, heartbeats) = if site.mode.is_passive() {
                let (tx, rx) = heartbeat_channel();
                (Some(tx), Some(rx))
            } else {
                (None, None)
            };

            info!(
                identifier = %site.identifier,
                mode = %site.mode,
                target = %site.url,
                "monitor initialized"
            );

            contexts.push(SiteContext {
                state: Arc::clone(&state),
                settings: ProbeSettings::from_site(site, &config.global),
                heartbeats,
            });
            registry.order.push(site.identifier.clone());
            registry
                .sites
                .insert(site.identifier.clone(), SiteEntry { state, heartbeat });
        }

        (registry, contexts)
    }

    /// 查找站点状态
    pub fn get(&self, identifier: &str) -> Option<&Arc<SiteState>> {
        self.sites.get(identifier).map(|entry| &entry.state)
    }

    /// 查找站点状态，不存在时返回 NotFound
    pub fn state(&self, identifier: &str) -> Result<&Arc<SiteState>, StatusError> {
        self.get(identifier).ok_or_else(|| StatusError::NotFound {
            identifier: identifier.to_string(),
        })
    }

    /// 是否包含指定站点
    pub fn contains(&self, identifier: &str) -> bool {
        self.sites.contains_key(identifier)
    }

    /// 向被动模式站点投递心跳，不会阻塞调用方
    ///
    /// 被动监控任务已退出时返回 `HeartbeatDropped`。
    pub fn heartbeat(&self, identifier: &str) -> Result<(), StatusError> {
        let entry = self
            .sites
            .get(identifier)
            .ok_or_else(|| StatusError::NotFound {
                identifier: identifier.to_string(),
            })?;

        match entry.heartbeat {
            Some(ref sender) if sender.beat() => Ok(()),
            Some(_) => Err(StatusError::HeartbeatDropped {
                identifier: identifier.to_string(),
            }),
            None => Err(StatusError::NotPassive {
                identifier: identifier.to_string(),
            }),
        }
    }

    /// 按配置顺序遍历站点状态
    pub fn states(&self) -> impl Iterator<Item = &Arc<SiteState>> {
        self.order.iter().filter_map(|id| self.get(id))
    }

    /// 按配置顺序遍历站点标识
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
