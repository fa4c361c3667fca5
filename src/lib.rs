//! Grafana Notifier - Grafana注解通知适配器
//!
//! 将通用通知消息转换为Grafana注解并通过HTTP发送，支持：
//! - 静态 Bearer API Key 认证
//! - GCP服务账号身份令牌（IAP）认证
//! - TOML配置与环境变量替换
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod notification;

// 重新导出主要类型
pub use config::{Config, GlobalConfig, GrafanaOptions};
pub use error::{GrafanaNotifierError, NotificationError};
pub use notification::{Destination, GrafanaService, Notification, NotificationService};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
