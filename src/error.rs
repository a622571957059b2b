//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// srvmon 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum SrvmonError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 状态查询相关错误
    #[error("状态查询错误: {0}")]
    Status(#[from] StatusError),

    /// 探测相关错误
    #[error("探测错误: {0}")]
    Probe(#[from] ProbeError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },

    /// 代理地址无法解析
    #[error("无法解析代理地址 {proxy}: {reason}")]
    InvalidProxy { proxy: String, reason: String },
}

/// 状态查询错误类型
///
/// 由报告层映射为 404 / 405 / 503 响应。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// 站点标识不存在
    #[error("站点不存在: {identifier}")]
    NotFound { identifier: String },

    /// 对非被动模式站点投递心跳
    #[error("站点 {identifier} 不是被动模式")]
    NotPassive { identifier: String },

    /// 被动监控任务已退出，心跳无法送达
    #[error("站点 {identifier} 的被动监控任务已退出")]
    HeartbeatDropped { identifier: String },
}

/// 探测错误类型
#[derive(Error, Debug)]
pub enum ProbeError {
    /// HTTP客户端错误
    #[error("HTTP客户端错误: {0}")]
    Client(#[from] reqwest::Error),

    /// 代理握手失败
    #[error("代理握手失败: {0}")]
    Proxy(String),

    /// 不支持的代理协议
    #[error("不支持的代理协议: {scheme}")]
    UnsupportedProxy { scheme: String },

    /// 连接错误
    #[error("连接失败: {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// 超时
    #[error("探测超时")]
    Timeout,
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, SrvmonError>;
