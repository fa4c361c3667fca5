//! Grafana注解数据结构
//!
//! 注解记录只存在于单次发送调用中

use crate::error::NotificationError;
use crate::notification::service::{Destination, Notification};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// 注解API的路径段
pub const ANNOTATIONS_PATH: &str = "annotations";

/// 标签分隔符
pub const TAG_SEPARATOR: char = '|';

/// Grafana注解
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaAnnotation {
    /// Unix时间戳（毫秒），精度为秒
    pub time: i64,
    /// 是否为区间注解，始终为 false
    pub is_region: bool,
    /// 标签
    pub tags: Vec<String>,
    /// 注解文本
    pub text: String,
}

impl GrafanaAnnotation {
    /// 使用当前时间构建注解
    pub fn new(notification: &Notification, destination: &Destination) -> Self {
        Self::at(Utc::now(), notification, destination)
    }

    /// 使用指定时间构建注解
    pub fn at(now: DateTime<Utc>, notification: &Notification, destination: &Destination) -> Self {
        Self {
            time: now.timestamp() * 1000,
            is_region: false,
            tags: split_tags(&destination.recipient),
            text: notification.message.clone(),
        }
    }

    /// 序列化为紧凑JSON
    pub fn to_json(&self) -> Result<Vec<u8>, NotificationError> {
        serde_json::to_vec(self).map_err(NotificationError::Serialization)
    }
}

/// 按 `|` 拆分接收者为标签列表
///
/// 空字符串得到一个空标签，而不是空列表。
pub fn split_tags(recipient: &str) -> Vec<String> {
    recipient.split(TAG_SEPARATOR).map(str::to_string).collect()
}

/// 由API基础地址得到注解接口地址
///
/// 保留协议、主机、端口、已有的路径前缀和查询参数。
pub fn annotations_endpoint(api_url: &str) -> Result<Url, NotificationError> {
    let base = Url::parse(api_url)
        .map_err(|e| NotificationError::Configuration(format!("{}: {}", api_url, e)))?;

    if base.cannot_be_a_base() {
        return Err(NotificationError::Configuration(format!(
            "{}: 不是有效的基础地址",
            api_url
        )));
    }

    // 与 path.Join 一致，合并重复的 `/`
    let mut segments: Vec<&str> = base.path().split('/').filter(|s| !s.is_empty()).collect();
    segments.push(ANNOTATIONS_PATH);

    let mut endpoint = base.clone();
    endpoint.set_path(&format!("/{}", segments.join("/")));

    Ok(endpoint)
}
