//! 探测模块
//!
//! 提供 HTTP/TCP 主动探测、被动心跳监控和任务调度功能

pub mod checker;
pub mod passive;
pub mod result;
pub mod scheduler;
pub mod tunnel;

// 重新导出主要类型
pub use checker::{build_checker, Checker, HttpChecker, TcpChecker};
pub use passive::{heartbeat_channel, HeartbeatReceiver, HeartbeatSender, PassiveMonitor};
pub use result::ProbeOutcome;
pub use scheduler::{
    record_outcome, run_active, ProbeScheduler, ProbeSettings, Scheduler, SchedulerStatus,
    SiteContext,
};
