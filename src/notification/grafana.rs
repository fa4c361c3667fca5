//! Grafana注解通知服务
//!
//! 将通知转换为Grafana注解并通过HTTP发送到 `<apiUrl>/annotations`

use crate::config::GrafanaOptions;
use crate::error::NotificationError;
use crate::logging::{NotifierLogger, TracingLogger};
use crate::notification::annotation::{annotations_endpoint, GrafanaAnnotation};
use crate::notification::auth::{AuthMode, IdentityTokenClient};
use crate::notification::service::{Destination, Notification, NotificationService};
use crate::notification::transport::{build_client, LoggingTransport};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use std::sync::Arc;

/// 日志中使用的服务名称
pub const SERVICE_NAME: &str = "grafana";

/// Grafana注解通知服务
///
/// 配置在构造后只读，HTTP客户端在每次发送时重新创建，可在多个任务间共享。
pub struct GrafanaService {
    /// 服务配置
    opts: GrafanaOptions,
    /// 日志接口
    logger: Arc<dyn NotifierLogger>,
}

impl GrafanaService {
    /// 创建新的Grafana通知服务，日志输出到 tracing
    pub fn new(opts: GrafanaOptions) -> Self {
        Self::with_logger(opts, Arc::new(TracingLogger))
    }

    /// 使用指定日志接口创建Grafana通知服务
    pub fn with_logger(opts: GrafanaOptions, logger: Arc<dyn NotifierLogger>) -> Self {
        Self { opts, logger }
    }

    /// 按认证模式创建身份令牌客户端
    ///
    /// 静态 API Key 模式下返回 `None`。
    fn identity_client(&self) -> Result<Option<IdentityTokenClient>, NotificationError> {
        match AuthMode::resolve(&self.opts) {
            AuthMode::StaticBearer => Ok(None),
            AuthMode::ServiceAccountIdentity => {
                IdentityTokenClient::new(&self.opts.gcp_sa_key, self.opts.audience())
                    .map(Some)
                    .inspect_err(|e| {
                        self.logger
                            .error(SERVICE_NAME, &format!("GCP IAP客户端初始化失败: {}", e));
                    })
            }
        }
    }
}

#[async_trait]
impl NotificationService for GrafanaService {
    async fn send(
        &self,
        notification: &Notification,
        destination: &Destination,
    ) -> Result<(), NotificationError> {
        let annotation = GrafanaAnnotation::new(notification, destination);

        if notification.message.is_empty() {
            self.logger.warn(
                SERVICE_NAME,
                "Message is an empty string or not provided in the notifications template",
            );
        }

        let identity = self.identity_client()?;
        let transport = LoggingTransport::new(
            build_client(self.opts.insecure_skip_verify)?,
            self.logger.as_ref(),
            SERVICE_NAME,
        );

        let body = annotation.to_json()?;
        let endpoint = annotations_endpoint(&self.opts.api_url)?;

        let mut request = transport
            .client()
            .post(endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.opts.api_key))
            .body(body);

        if let Some(identity) = &identity {
            request = identity.authorize(request).await?;
        }

        let response = transport.execute(request.build()?).await?;
        let status = response.status();

        // 读取完整响应体后连接才会归还
        let data = response
            .bytes()
            .await
            .map_err(NotificationError::ResponseRead)?;

        if status != StatusCode::OK {
            return Err(NotificationError::Delivery {
                url: endpoint.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&data).into_owned(),
            });
        }

        Ok(())
    }
}
