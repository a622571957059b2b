//! 探测结果数据结构
//!
//! 定义单次探测的结果类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 无响应时日志中使用的状态码
pub const UNKNOWN_STATUS_CODE: i32 = -1;

/// 单次探测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// 是否成功
    pub success: bool,
    /// 探测完成时间
    pub timestamp: DateTime<Utc>,
    /// HTTP状态码（如果有响应）
    pub status_code: Option<u16>,
    /// 耗时
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
    /// 错误信息（如果有）
    pub error_message: Option<String>,
}

impl ProbeOutcome {
    /// 成功结果
    pub fn up() -> Self {
        Self::new(true)
    }

    /// 失败结果
    pub fn down(error_message: impl Into<String>) -> Self {
        Self::new(false).with_error(error_message.into())
    }

    fn new(success: bool) -> Self {
        Self {
            success,
            timestamp: Utc::now(),
            status_code: None,
            elapsed: Duration::ZERO,
            error_message: None,
        }
    }

    /// 设置HTTP状态码
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// 设置耗时
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// 设置错误信息
    pub fn with_error(mut self, error_message: String) -> Self {
        self.error_message = Some(error_message);
        self
    }

    /// 日志用状态码，无响应时为 -1
    pub fn code(&self) -> i32 {
        self.status_code
            .map(i32::from)
            .unwrap_or(UNKNOWN_STATUS_CODE)
    }

    /// 耗时（毫秒）
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Duration序列化模块
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
