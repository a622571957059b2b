//! Web服务器实现
//!
//! 提供HTTP服务器和路由管理

use super::handlers::{self, AppState};
use crate::config::WebConfig;
use crate::status::Registry;
use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Web服务器
#[derive(Debug, Clone)]
pub struct WebServer {
    /// 配置
    config: WebConfig,
    /// 路由共享状态
    state: AppState,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(config: WebConfig, registry: Arc<Registry>) -> Self {
        let state = AppState::new(registry, &config.badge_base_url);
        Self { config, state }
    }

    /// 创建路由
    ///
    /// 固定路径优先于 `/{key}` 匹配。
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handlers::health_check))
            .route("/api/v1/sites", get(handlers::list_sites))
            .route("/api/v1/sites/{identifier}", get(handlers::get_site))
            .route("/{key}", get(handlers::badge).put(handlers::heartbeat))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// 绑定配置中的监听地址
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let addr: SocketAddr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        Ok(listener)
    }

    /// 在给定监听器上提供服务，`shutdown` 完成后优雅退出
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!("Web服务器已启动: http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Web服务器已关闭");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, GlobalConfig, ProbeMode, SiteConfig};
    use crate::health::SiteContext;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn site(identifier: &str, mode: ProbeMode) -> SiteConfig {
        SiteConfig {
            identifier: identifier.to_string(),
            url: "https://example.com".to_string(),
            mode,
            interval_seconds: None,
            timeout_seconds: None,
            proxy: None,
            insecure_skip_verify: false,
        }
    }

    /// 返回的站点上下文持有心跳接收端，测试期间需保持存活
    fn build_app_with_contexts() -> (Router, Arc<Registry>, Vec<SiteContext>) {
        let config = Config {
            global: GlobalConfig::default(),
            sites: vec![site("blog", ProbeMode::Http), site("cron", ProbeMode::Passive)],
        };
        let (registry, contexts) = Registry::build(&config);
        let registry = Arc::new(registry);
        let server = WebServer::new(config.global.web.clone(), Arc::clone(&registry));
        (server.router(), registry, contexts)
    }

    fn build_app() -> (Router, Arc<Registry>) {
        let (app, registry, _contexts) = build_app_with_contexts();
        (app, registry)
    }

    async fn send(app: Router, method: Method, uri: &str) -> axum::response::Response {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(response: &axum::response::Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = build_app();
        let response = send(app, Method::GET, "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["running"], "yes");
    }

    #[tokio::test]
    async fn test_status_badge_follows_state() {
        let (app, registry) = build_app();

        let response = send(app.clone(), Method::GET, "/blog").await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert!(location(&response).ends_with("/status-down-critical.svg"));

        registry.get("blog").unwrap().record(true).await;
        let response = send(app, Method::GET, "/blog").await;
        assert!(location(&response).ends_with("/status-up-success.svg"));
    }

    #[tokio::test]
    async fn test_lastseen_and_sla_badges() {
        let (app, registry) = build_app();

        let response = send(app.clone(), Method::GET, "/blog-lastseen").await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert!(location(&response).ends_with("/last%20seen-n%2Fa-blue.svg"));

        let response = send(app.clone(), Method::GET, "/blog-sla").await;
        assert!(location(&response).ends_with("/sla-n%2Fa-blue.svg"));

        let state = registry.get("blog").unwrap();
        for success in [true, true, true, false, false] {
            state.record(success).await;
        }
        let response = send(app.clone(), Method::GET, "/blog-sla").await;
        assert!(location(&response).ends_with("/sla-60.0%25-red.svg"));

        let response = send(app, Method::GET, "/blog-lastseen").await;
        assert!(!location(&response).contains("n%2Fa"));
    }

    #[tokio::test]
    async fn test_unknown_badge_is_not_found() {
        let (app, _) = build_app();
        let response = send(app, Method::GET, "/wiki-sla").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_heartbeat_ingress() {
        let (app, _, _contexts) = build_app_with_contexts();

        let response = send(app.clone(), Method::PUT, "/cron").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");

        let response = send(app.clone(), Method::PUT, "/blog").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(response).await["error"], "mode is not passive");

        let response = send(app, Method::PUT, "/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_heartbeat_without_monitor_is_unavailable() {
        let (app, _, contexts) = build_app_with_contexts();
        drop(contexts);

        let response = send(app, Method::PUT, "/cron").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_sites_api() {
        let (app, registry) = build_app();
        registry.get("blog").unwrap().record(true).await;

        let response = send(app.clone(), Method::GET, "/api/v1/sites").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        let sites = body["data"].as_array().unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0]["identifier"], "blog");
        assert_eq!(sites[0]["tier"], "healthy");
        assert_eq!(sites[1]["availability"], Value::Null);

        let response = send(app.clone(), Method::GET, "/api/v1/sites/blog").await;
        let body = body_json(response).await;
        assert_eq!(body["data"]["probe_count"], 1);
        assert_eq!(body["data"]["up"], true);

        let response = send(app, Method::GET, "/api/v1/sites/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let (_, registry) = build_app();
        let mut web = GlobalConfig::default().web;
        web.bind_address = "127.0.0.1".to_string();
        let server = WebServer::new(web, registry);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }
}
