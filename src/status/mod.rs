//! 站点状态模块
//!
//! 站点状态记录、注册表和只读查询

pub mod registry;
pub mod reporter;
pub mod site;

// 重新导出主要类型
pub use registry::Registry;
pub use reporter::{AvailabilityTier, StatusReporter};
pub use site::{SiteSnapshot, SiteState, Transition};
