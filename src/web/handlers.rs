//! Web 路由处理函数
//!
//! 徽章查询只读取站点状态，心跳推送是 Web 层唯一会影响状态的入口。

use super::{ApiError, ApiResponse, BadgeKind, BadgeRenderer};
use crate::error::StatusError;
use crate::status::{Registry, SiteSnapshot, StatusReporter};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Redirect, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// 路由共享状态
#[derive(Debug, Clone)]
pub struct AppState {
    /// 站点注册表
    pub registry: Arc<Registry>,
    /// 状态查询
    pub reporter: StatusReporter,
    /// 徽章地址生成器
    pub badges: Arc<BadgeRenderer>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, badge_base_url: &str) -> Self {
        Self {
            reporter: StatusReporter::new(Arc::clone(&registry)),
            registry,
            badges: Arc::new(BadgeRenderer::new(badge_base_url)),
        }
    }
}

/// 进程存活检查
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "running": "yes" }))
}

/// 徽章重定向
pub async fn badge(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let (identifier, kind) =
        BadgeKind::resolve(&key, &state.registry).ok_or_else(|| StatusError::NotFound {
            identifier: key.clone(),
        })?;

    let location = match kind {
        BadgeKind::Status => state.badges.status(state.reporter.is_up(identifier).await?),
        BadgeKind::LastSeen => state
            .badges
            .last_seen(state.reporter.last_seen(identifier).await?),
        BadgeKind::Sla => state
            .badges
            .sla(state.reporter.availability(identifier).await?),
    };

    Ok(Redirect::temporary(&location).into_response())
}

/// 被动模式心跳推送
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.registry.heartbeat(&identifier)?;
    debug!(identifier = %identifier, "收到心跳");
    Ok(Json(json!({ "status": "ok" })))
}

/// 列出所有站点状态
pub async fn list_sites(State(state): State<AppState>) -> Json<ApiResponse<Vec<SiteSnapshot>>> {
    Json(ApiResponse::success(state.reporter.snapshots().await))
}

/// 查询单个站点状态
pub async fn get_site(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<ApiResponse<SiteSnapshot>>, ApiError> {
    let snapshot = state.reporter.snapshot(&identifier).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}
