//! 通知服务接口
//!
//! 定义外层分发逻辑调用的通用通知接口

use crate::error::NotificationError;
use async_trait::async_trait;

/// 通知消息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notification {
    /// 消息内容，可以为空
    pub message: String,
}

impl Notification {
    /// 创建新的通知消息
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 通知目标
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Destination {
    /// 通知服务名称
    pub service: String,
    /// 接收者，Grafana服务中为 `|` 分隔的标签列表
    pub recipient: String,
}

impl Destination {
    /// 创建新的通知目标
    pub fn new(service: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            recipient: recipient.into(),
        }
    }
}

/// 通知服务trait
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// 发送通知
    ///
    /// # 参数
    /// * `notification` - 通知消息
    /// * `destination` - 通知目标
    ///
    /// # 返回
    /// * `Result<(), NotificationError>` - 发送结果
    async fn send(
        &self,
        notification: &Notification,
        destination: &Destination,
    ) -> Result<(), NotificationError>;
}

/// 空的通知服务实现（用于测试或禁用通知）
pub struct NoOpService;

#[async_trait]
impl NotificationService for NoOpService {
    async fn send(
        &self,
        _notification: &Notification,
        _destination: &Destination,
    ) -> Result<(), NotificationError> {
        Ok(())
    }
}
