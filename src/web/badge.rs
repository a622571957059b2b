//! 徽章地址生成
//!
//! 路由键形如 `{id}`、`{id}-lastseen`、`{id}-sla`，分别对应在线状态、
//! 最近在线时间和可用率徽章。

use crate::status::{AvailabilityTier, Registry};
use chrono::{DateTime, Utc};

const LAST_SEEN_SUFFIX: &str = "-lastseen";
const SLA_SUFFIX: &str = "-sla";

/// 徽章种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeKind {
    Status,
    LastSeen,
    Sla,
}

impl BadgeKind {
    /// 把路由键解析为站点标识和徽章种类
    ///
    /// 与某个站点标识完全相同的键优先，其次才按后缀拆分。
    pub fn resolve<'a>(key: &'a str, registry: &Registry) -> Option<(&'a str, BadgeKind)> {
        if registry.contains(key) {
            return Some((key, BadgeKind::Status));
        }

        [
            (LAST_SEEN_SUFFIX, BadgeKind::LastSeen),
            (SLA_SUFFIX, BadgeKind::Sla),
        ]
        .into_iter()
        .find_map(|(suffix, kind)| {
            key.strip_suffix(suffix)
                .filter(|identifier| registry.contains(identifier))
                .map(|identifier| (identifier, kind))
        })
    }
}

/// 徽章地址生成器
#[derive(Debug, Clone)]
pub struct BadgeRenderer {
    base_url: String,
}

impl BadgeRenderer {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 在线状态徽章
    pub fn status(&self, up: bool) -> String {
        if up {
            format!("{}/status-up-success.svg", self.base_url)
        } else {
            format!("{}/status-down-critical.svg", self.base_url)
        }
    }

    /// 最近在线时间徽章，时间按 UTC 显示
    pub fn last_seen(&self, last_seen: Option<DateTime<Utc>>) -> String {
        match last_seen {
            // 徽章语法中 "-" 需写作 "--"
            Some(ts) => format!(
                "{}/last%20seen-{}-blue.svg",
                self.base_url,
                ts.format("%Y--%m--%d%%20%H:%M:%S")
            ),
            None => format!("{}/last%20seen-n%2Fa-blue.svg", self.base_url),
        }
    }

    /// 可用率徽章
    pub fn sla(&self, availability: Option<f64>) -> String {
        match availability {
            Some(ratio) => format!(
                "{}/sla-{:.1}%25-{}.svg",
                self.base_url,
                ratio * 100.0,
                AvailabilityTier::from_ratio(ratio).color()
            ),
            None => format!("{}/sla-n%2Fa-blue.svg", self.base_url),
        }
    }
}
