//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::error::ConfigError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// 保留的路由前缀，站点标识不能与之重名
pub const RESERVED_IDENTIFIERS: &[&str] = &["api"];

/// 主配置结构，包含全局配置和站点列表
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 全局配置项
    #[serde(default)]
    pub global: GlobalConfig,
    /// 站点配置列表
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 默认探测间隔（秒）
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// 默认单次探测超时（秒）
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Web 服务器配置
    #[serde(default)]
    pub web: WebConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            timeout_seconds: default_timeout(),
            web: WebConfig::default(),
        }
    }
}

/// 探测模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProbeMode {
    /// HTTP GET 探测
    #[default]
    Http,
    /// TCP 建连探测
    Tcp,
    /// 被动心跳
    Passive,
}

impl ProbeMode {
    /// 模式名称
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMode::Http => "HTTP",
            ProbeMode::Tcp => "TCP",
            ProbeMode::Passive => "Passive",
        }
    }

    /// 是否为被动模式
    pub fn is_passive(&self) -> bool {
        matches!(self, ProbeMode::Passive)
    }
}

impl From<String> for ProbeMode {
    /// 无法识别的模式回退到 HTTP
    fn from(value: String) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("tcp") {
            ProbeMode::Tcp
        } else if value.eq_ignore_ascii_case("passive") {
            ProbeMode::Passive
        } else {
            if !value.is_empty() && !value.eq_ignore_ascii_case("http") {
                tracing::warn!("无法识别的探测模式 {:?}，按 HTTP 处理", value);
            }
            ProbeMode::Http
        }
    }
}

impl From<ProbeMode> for String {
    fn from(mode: ProbeMode) -> Self {
        mode.as_str().to_string()
    }
}

impl std::fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 站点配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteConfig {
    /// 站点标识，同时作为路由键
    pub identifier: String,
    /// 探测目标：HTTP 模式为 URL，TCP 模式为 host:port
    #[serde(default)]
    pub url: String,
    /// 探测模式
    #[serde(default)]
    pub mode: ProbeMode,
    /// 站点特定的探测间隔（秒）
    pub interval_seconds: Option<u64>,
    /// 站点特定的超时时间（秒）
    pub timeout_seconds: Option<u64>,
    /// 上游代理（URL 形式）
    pub proxy: Option<String>,
    /// 是否跳过 TLS 证书校验
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

impl SiteConfig {
    /// 生效的探测间隔
    pub fn interval(&self, global: &GlobalConfig) -> Duration {
        Duration::from_secs(self.interval_seconds.unwrap_or(global.interval_seconds))
    }

    /// 生效的单次探测超时
    pub fn timeout(&self, global: &GlobalConfig) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(global.timeout_seconds))
    }
}

/// Web 服务器配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// 绑定地址
    #[serde(default = "default_web_bind_address")]
    pub bind_address: String,
    /// 监听端口
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// 徽章服务地址
    #[serde(default = "default_badge_base_url")]
    pub badge_base_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: default_web_bind_address(),
            port: default_web_port(),
            badge_base_url: default_badge_base_url(),
        }
    }
}

impl WebConfig {
    /// 组合监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bind_address.parse().map_err(|_| {
            ConfigError::ValidationError(format!("无效的绑定地址: {}", self.bind_address))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

// 默认值函数
fn default_interval() -> u64 {
    30
}
fn default_timeout() -> u64 {
    5
}
fn default_web_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_web_port() -> u16 {
    8080
}
fn default_badge_base_url() -> String {
    "https://img.shields.io/badge".to_string()
}

/// 解析并校验代理地址
///
/// # 参数
/// * `proxy` - 代理地址字符串
/// * `mode` - 使用该代理的探测模式
///
/// # 返回
/// * `Result<Url, ConfigError>` - 解析后的代理URL
pub fn parse_proxy_url(proxy: &str, mode: ProbeMode) -> Result<Url, ConfigError> {
    let url = Url::parse(proxy).map_err(|e| ConfigError::InvalidProxy {
        proxy: proxy.to_string(),
        reason: e.to_string(),
    })?;

    let supported: &[&str] = match mode {
        ProbeMode::Http => &["http", "https", "socks5", "socks5h"],
        ProbeMode::Tcp => &["http", "socks5", "socks5h"],
        ProbeMode::Passive => &[],
    };

    if !supported.contains(&url.scheme()) {
        return Err(ConfigError::InvalidProxy {
            proxy: proxy.to_string(),
            reason: format!("{} 模式不支持代理协议 {}", mode, url.scheme()),
        });
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidProxy {
            proxy: proxy.to_string(),
            reason: "缺少代理主机".to_string(),
        });
    }

    Ok(url)
}

/// 校验 TCP 目标是否为 host:port 形式
fn is_host_port(target: &str) -> bool {
    match target.rsplit_once(':') {
        Some((host, port)) => {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            !host.is_empty() && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), ConfigError>` - 验证结果
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

    if config.global.interval_seconds == 0 {
        return invalid("探测间隔不能为0".to_string());
    }

    if config.global.timeout_seconds == 0 {
        return invalid("超时时间不能为0".to_string());
    }

    if config.global.web.port == 0 {
        return invalid("Web服务器端口不能为0".to_string());
    }
    config.global.web.socket_addr()?;

    if config.sites.is_empty() {
        return invalid("至少需要配置一个站点".to_string());
    }

    let mut seen = HashSet::new();
    for site in &config.sites {
        let id = site.identifier.trim();
        if id.is_empty() {
            return invalid("站点标识不能为空".to_string());
        }
        if id != site.identifier || site.identifier.contains('/') {
            return invalid(format!("站点标识 {:?} 含有非法字符", site.identifier));
        }
        if RESERVED_IDENTIFIERS.contains(&id) {
            return invalid(format!("站点标识 {} 为保留字", id));
        }
        if !seen.insert(id) {
            return invalid(format!("站点标识 {} 重复", id));
        }

        if site.interval_seconds == Some(0) {
            return invalid(format!("站点 {} 的探测间隔不能为0", id));
        }
        if site.timeout_seconds == Some(0) {
            return invalid(format!("站点 {} 的超时时间不能为0", id));
        }

        match site.mode {
            ProbeMode::Http => {
                if !site.url.starts_with("http://") && !site.url.starts_with("https://") {
                    return invalid(format!("站点 {} 的URL格式无效", id));
                }
            }
            ProbeMode::Tcp => {
                if !is_host_port(&site.url) {
                    return invalid(format!("站点 {} 的目标必须为 host:port 形式", id));
                }
            }
            ProbeMode::Passive => {}
        }

        if let Some(ref proxy) = site.proxy {
            if site.mode.is_passive() {
                return invalid(format!("被动模式站点 {} 不能配置代理", id));
            }
            parse_proxy_url(proxy, site.mode)?;
        }
    }

    Ok(())
}
