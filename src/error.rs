//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Grafana Notifier 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum GrafanaNotifierError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 通知相关错误
    #[error("通知错误: {0}")]
    Notification(#[from] NotificationError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 通知错误类型
///
/// 每次发送只会返回其中一种错误，内部不做任何重试。
#[derive(Error, Debug)]
pub enum NotificationError {
    /// apiUrl 无法解析，未发出任何请求
    #[error("无效的Grafana API地址 {0}")]
    Configuration(String),

    /// 服务账号身份令牌客户端初始化失败，未发出任何请求
    #[error("初始化GCP身份令牌客户端失败: {0}")]
    AuthSetup(String),

    /// 换取身份令牌失败
    #[error("获取GCP身份令牌失败: {0}")]
    IdentityToken(String),

    /// 注解序列化失败（内部错误）
    #[error("注解序列化失败: {0}")]
    Serialization(#[source] serde_json::Error),

    /// 网络或TLS错误，原样返回
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// 已收到响应但读取响应体失败
    #[error("unable to read response data: {0}")]
    ResponseRead(#[source] reqwest::Error),

    /// 状态码不是200
    #[error("request to {url} has failed with error code {status} : {body}")]
    Delivery {
        url: String,
        status: u16,
        body: String,
    },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, GrafanaNotifierError>;
