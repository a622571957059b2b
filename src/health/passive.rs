//! 被动模式
//!
//! 站点不被主动探测，而是由外部推送心跳。任务在“超时”和“收到心跳”之间竞速：
//! 心跳先到记为成功，超时先到记为失败，随后重新开始等待。

use crate::health::result::ProbeOutcome;
use crate::health::scheduler::record_outcome;
use crate::status::SiteState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::timeout;
use tracing::{debug, warn};

/// 心跳通道容量
///
/// 探测任务尚未开始等待时到达的心跳会留在通道中；
/// 通道已满时再到达的心跳与之合并。
pub const HEARTBEAT_BUFFER: usize = 1;

/// 创建心跳通道
pub fn heartbeat_channel() -> (HeartbeatSender, HeartbeatReceiver) {
    let (tx, rx) = mpsc::channel(HEARTBEAT_BUFFER);
    (HeartbeatSender { tx }, HeartbeatReceiver { rx })
}

/// 心跳发送端，由 Web 层持有
#[derive(Debug, Clone)]
pub struct HeartbeatSender {
    tx: mpsc::Sender<()>,
}

impl HeartbeatSender {
    /// 投递一次心跳，从不阻塞
    ///
    /// 接收端已关闭时返回 `false`。
    pub fn beat(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("已有未处理的心跳，本次心跳合并");
                true
            }
            Err(TrySendError::Closed(())) => {
                warn!("被动监控任务已退出，心跳被丢弃");
                false
            }
        }
    }
}

/// 心跳接收端，由被动监控任务持有
#[derive(Debug)]
pub struct HeartbeatReceiver {
    rx: mpsc::Receiver<()>,
}

/// 被动监控任务
#[derive(Debug)]
pub struct PassiveMonitor {
    state: Arc<SiteState>,
    timeout: Duration,
    heartbeats: HeartbeatReceiver,
}

impl PassiveMonitor {
    pub fn new(state: Arc<SiteState>, timeout: Duration, heartbeats: HeartbeatReceiver) -> Self {
        Self {
            state,
            timeout,
            heartbeats,
        }
    }

    /// 等待下一次结果
    ///
    /// 每次调用都从当前时刻重新计时。发送端全部关闭时返回 `None`。
    pub async fn next_outcome(&mut self) -> Option<ProbeOutcome> {
        match timeout(self.timeout, self.heartbeats.rx.recv()).await {
            Ok(Some(())) => Some(ProbeOutcome::up()),
            Ok(None) => None,
            Err(_) => Some(
                ProbeOutcome::down(format!("{}秒内未收到心跳", self.timeout.as_secs()))
                    .with_elapsed(self.timeout),
            ),
        }
    }

    /// 持续运行直到心跳通道关闭
    pub async fn run(mut self) {
        while let Some(outcome) = self.next_outcome().await {
            record_outcome(&self.state, &outcome).await;
        }
        debug!(identifier = %self.state.identifier(), "心跳通道已关闭，被动监控任务退出");
    }
}
