//! Web接口模块
//!
//! 提供徽章重定向、心跳推送和 JSON 状态 API

use crate::error::StatusError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

pub mod badge;
pub mod handlers;
pub mod server;

pub use badge::{BadgeKind, BadgeRenderer};
pub use handlers::AppState;
pub use server::WebServer;

/// API响应包装器
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// 是否成功
    pub success: bool,
    /// 响应数据
    pub data: Option<T>,
    /// 错误信息
    pub error: Option<String>,
    /// 时间戳
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// 创建错误响应
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Axum用的错误响应类型
#[derive(Debug)]
pub struct ApiError(pub StatusError);

impl From<StatusError> for ApiError {
    fn from(err: StatusError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    /// 对外的状态码和错误信息
    pub fn parts(&self) -> (StatusCode, String) {
        match &self.0 {
            StatusError::NotFound { identifier } => {
                (StatusCode::NOT_FOUND, format!("site {identifier} not found"))
            }
            StatusError::NotPassive { .. } => (
                StatusCode::METHOD_NOT_ALLOWED,
                "mode is not passive".to_string(),
            ),
            StatusError::HeartbeatDropped { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "heartbeat monitor is not running".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.parts();
        (status, Json(json!({ "error": message }))).into_response()
    }
}
