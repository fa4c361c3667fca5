//! HTTP传输层
//!
//! 每次发送都创建新的客户端，并记录请求和响应的调试日志

use crate::error::NotificationError;
use crate::logging::NotifierLogger;
use reqwest::{Client, Request, Response};
use std::time::Instant;

/// 创建HTTP客户端
///
/// # 参数
/// * `insecure_skip_verify` - 是否跳过TLS证书校验
///
/// # 返回
/// * `Result<Client, NotificationError>` - HTTP客户端
pub fn build_client(insecure_skip_verify: bool) -> Result<Client, NotificationError> {
    Client::builder()
        .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
        .danger_accept_invalid_certs(insecure_skip_verify)
        .build()
        .map_err(NotificationError::Transport)
}

/// 带日志记录的传输层
pub struct LoggingTransport<'a> {
    /// HTTP客户端
    client: Client,
    /// 日志接口
    logger: &'a dyn NotifierLogger,
    /// 日志中的服务名称
    service: &'a str,
}

impl<'a> LoggingTransport<'a> {
    /// 创建新的传输层
    pub fn new(client: Client, logger: &'a dyn NotifierLogger, service: &'a str) -> Self {
        Self {
            client,
            logger,
            service,
        }
    }

    /// 底层HTTP客户端
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// 执行请求
    ///
    /// 请求头中含有凭证，只记录方法、地址和状态码。
    pub async fn execute(&self, request: Request) -> Result<Response, reqwest::Error> {
        let method = request.method().clone();
        let url = request.url().clone();
        let start_time = Instant::now();

        self.logger
            .debug(self.service, &format!("发送请求: {} {}", method, url));

        match self.client.execute(request).await {
            Ok(response) => {
                self.logger.debug(
                    self.service,
                    &format!(
                        "收到响应: {} {} -> {} ({}ms)",
                        method,
                        url,
                        response.status().as_u16(),
                        start_time.elapsed().as_millis()
                    ),
                );
                Ok(response)
            }
            Err(e) => {
                self.logger.debug(
                    self.service,
                    &format!("请求失败: {} {} - {}", method, url, e),
                );
                Err(e)
            }
        }
    }
}
