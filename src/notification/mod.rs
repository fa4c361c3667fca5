//! 通知模块
//!
//! 提供通用通知接口和Grafana注解通知实现

pub mod annotation;
pub mod auth;
pub mod grafana;
pub mod service;
pub mod transport;

// 重新导出主要类型
pub use annotation::GrafanaAnnotation;
pub use auth::{AuthMode, IdentityTokenClient, ServiceAccountKey};
pub use grafana::GrafanaService;
pub use service::{Destination, NoOpService, Notification, NotificationService};
