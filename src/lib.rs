//! srvmon - 轻量级站点可用性监控
//!
//! 周期性探测一组站点并通过 HTTP 暴露状态：
//! - HTTP GET / TCP 连接两种主动探测，支持上游代理
//! - 被动模式，由外部推送心跳
//! - shields 风格的状态、最近在线时间和可用率徽章
//! - JSON 状态 API

pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod service;
pub mod status;
pub mod web;

// 重新导出主要类型
pub use config::{Config, GlobalConfig, ProbeMode, SiteConfig};
pub use error::SrvmonError;
pub use service::MonitorService;
pub use status::{Registry, SiteState, StatusReporter};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
