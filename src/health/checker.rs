//! 主动探测器实现
//!
//! HTTP 模式发起 GET 请求，只有 200 视为成功；TCP 模式只建立连接随即关闭。
//! 代理和证书校验在构造时固定。

use crate::config::{parse_proxy_url, ProbeMode};
use crate::error::ProbeError;
use crate::health::result::ProbeOutcome;
use crate::health::scheduler::ProbeSettings;
use crate::health::tunnel::{connect_via_proxy, guard_tunnel};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// 经代理建立隧道后二次确认的最长等待
const MAX_GUARD_WINDOW: Duration = Duration::from_millis(300);

/// 探测器trait，定义单次探测接口
///
/// 探测期间的网络错误都折算为失败结果，不会向调用方返回错误。
#[async_trait]
pub trait Checker: Send + Sync {
    /// 探测模式
    fn mode(&self) -> ProbeMode;

    /// 探测目标
    fn target(&self) -> &str;

    /// 执行一次探测
    async fn probe(&self) -> ProbeOutcome;
}

/// 按模式构建探测器，被动模式没有主动探测器
///
/// # 参数
/// * `mode` - 探测模式
/// * `target` - 探测目标
/// * `settings` - 探测参数
///
/// # 返回
/// * `Result<Option<Arc<dyn Checker>>, ProbeError>` - 探测器实例
pub fn build_checker(
    mode: ProbeMode,
    target: &str,
    settings: &ProbeSettings,
) -> Result<Option<Arc<dyn Checker>>, ProbeError> {
    let checker: Arc<dyn Checker> = match mode {
        ProbeMode::Http => Arc::new(HttpChecker::new(target, settings)?),
        ProbeMode::Tcp => Arc::new(TcpChecker::new(target, settings)?),
        ProbeMode::Passive => return Ok(None),
    };
    Ok(Some(checker))
}

fn proxy_error(err: crate::error::ConfigError) -> ProbeError {
    ProbeError::Proxy(err.to_string())
}

/// HTTP探测器实现
#[derive(Debug)]
pub struct HttpChecker {
    /// HTTP客户端
    client: Client,
    /// 目标URL
    target: String,
    /// 单次请求超时
    timeout: Duration,
}

impl HttpChecker {
    /// 创建新的HTTP探测器
    ///
    /// # 参数
    /// * `target` - 目标URL
    /// * `settings` - 超时、代理和证书校验设置
    ///
    /// # 返回
    /// * `Result<Self, ProbeError>` - 探测器实例
    pub fn new(target: &str, settings: &ProbeSettings) -> Result<Self, ProbeError> {
        let mut builder = Client::builder()
            .timeout(settings.timeout)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .danger_accept_invalid_certs(settings.insecure_skip_verify);

        if let Some(proxy) = settings.proxy.as_deref() {
            let url = parse_proxy_url(proxy, ProbeMode::Http).map_err(proxy_error)?;
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }

        Ok(Self {
            client: builder.build()?,
            target: target.to_string(),
            timeout: settings.timeout,
        })
    }

    /// 格式化请求错误信息，使其更加清晰易读
    fn format_request_error(error: &reqwest::Error) -> String {
        if error.is_timeout() {
            "Request timeout".to_string()
        } else if error.is_connect() {
            "Connection refused".to_string()
        } else if error.is_request() {
            "Invalid request".to_string()
        } else if error.is_redirect() {
            "Too many redirects".to_string()
        } else {
            let error_str = error.to_string();
            if error_str.contains("dns") || error_str.contains("DNS") {
                "DNS resolution failed".to_string()
            } else if error_str.contains("certificate")
                || error_str.contains("tls")
                || error_str.contains("ssl")
            {
                "SSL/TLS certificate error".to_string()
            } else {
                format!("Request failed: {}", error_str)
            }
        }
    }
}

#[async_trait]
impl Checker for HttpChecker {
    fn mode(&self) -> ProbeMode {
        ProbeMode::Http
    }

    fn target(&self) -> &str {
        &self.target
    }

    async fn probe(&self) -> ProbeOutcome {
        let start_time = Instant::now();
        let response = timeout(self.timeout, self.client.get(&self.target).send()).await;
        let elapsed = start_time.elapsed();

        let outcome = match response {
            Ok(Ok(response)) => {
                let status = response.status();
                let outcome = if status == StatusCode::OK {
                    ProbeOutcome::up()
                } else {
                    ProbeOutcome::down(format!(
                        "HTTP {} {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("Unknown")
                    ))
                };
                outcome.with_status_code(status.as_u16())
            }
            Ok(Err(e)) => ProbeOutcome::down(Self::format_request_error(&e)),
            Err(_) => ProbeOutcome::down("Request timeout"),
        };

        outcome.with_elapsed(elapsed)
    }
}

/// TCP探测器实现
#[derive(Debug)]
pub struct TcpChecker {
    /// host:port
    target: String,
    /// 单次连接超时
    timeout: Duration,
    /// 上游代理
    proxy: Option<Url>,
}

impl TcpChecker {
    /// 创建新的TCP探测器
    pub fn new(target: &str, settings: &ProbeSettings) -> Result<Self, ProbeError> {
        let proxy = settings
            .proxy
            .as_deref()
            .map(|proxy| parse_proxy_url(proxy, ProbeMode::Tcp))
            .transpose()
            .map_err(proxy_error)?;

        Ok(Self {
            target: target.to_string(),
            timeout: settings.timeout,
            proxy,
        })
    }

    fn guard_window(&self) -> Duration {
        (self.timeout / 4).min(MAX_GUARD_WINDOW)
    }

    async fn dial(&self) -> Result<(), ProbeError> {
        match self.proxy {
            Some(ref proxy) => {
                let mut stream = connect_via_proxy(proxy, &self.target).await?;
                guard_tunnel(&mut stream, self.guard_window()).await
            }
            None => TcpStream::connect(&self.target)
                .await
                .map(drop)
                .map_err(|source| ProbeError::Connect {
                    target: self.target.clone(),
                    source,
                }),
        }
    }
}

#[async_trait]
impl Checker for TcpChecker {
    fn mode(&self) -> ProbeMode {
        ProbeMode::Tcp
    }

    fn target(&self) -> &str {
        &self.target
    }

    async fn probe(&self) -> ProbeOutcome {
        let start_time = Instant::now();
        // 连接在 dial 返回前即被丢弃，失败路径同样如此
        let result = match timeout(self.timeout, self.dial()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        };
        let elapsed = start_time.elapsed();

        let outcome = match result {
            Ok(()) => ProbeOutcome::up(),
            Err(e) => ProbeOutcome::down(e.to_string()),
        };
        outcome.with_elapsed(elapsed)
    }
}
