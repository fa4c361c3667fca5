//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// 支持的日志级别
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// 主配置结构，包含全局配置和Grafana配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 全局配置项
    #[serde(default)]
    pub global: GlobalConfig,
    /// Grafana注解服务配置
    pub grafana: GrafanaOptions,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 是否输出JSON格式日志
    #[serde(default)]
    pub json_logs: bool,
    /// 日志文件路径，设置后日志写入文件而不是控制台
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// 按模块覆盖日志级别，例如 `reqwest = "warn"`
    #[serde(default)]
    pub module_levels: HashMap<String, String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            log_file: None,
            module_levels: HashMap::new(),
        }
    }
}

/// Grafana注解服务配置
///
/// 构造后只读，字段名与原有配置格式保持一致（camelCase）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaOptions {
    /// Grafana HTTP API 基础地址
    pub api_url: String,
    /// 静态 Bearer API Key
    #[serde(default)]
    pub api_key: String,
    /// 是否跳过TLS证书校验
    #[serde(default)]
    pub insecure_skip_verify: bool,
    /// GCP服务账号密钥（JSON），非空时启用身份令牌认证
    #[serde(default, rename = "gcpSAKey")]
    pub gcp_sa_key: String,
    /// 身份令牌的 target_audience，未设置时使用 api_url
    #[serde(default)]
    pub gcp_audience: Option<String>,
}

impl GrafanaOptions {
    /// 使用API地址和API Key创建配置
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// 身份令牌使用的 audience
    pub fn audience(&self) -> &str {
        self.gcp_audience
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.api_url)
    }
}

// 默认值函数
fn default_log_level() -> String {
    "info".to_string()
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    // 验证日志级别
    if !VALID_LOG_LEVELS.contains(&config.global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.global.log_level, VALID_LOG_LEVELS
        ));
    }

    for (module, level) in &config.global.module_levels {
        if module.trim().is_empty() {
            return Err("global.module_levels 中的模块名不能为空".to_string());
        }
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(format!("模块 {} 的日志级别无效: {}", module, level));
        }
    }

    if let Some(path) = &config.global.log_file {
        if path.as_os_str().is_empty() {
            return Err("global.log_file 不能为空路径".to_string());
        }
    }

    let grafana = &config.grafana;

    if grafana.api_url.trim().is_empty() {
        return Err("grafana.apiUrl 不能为空".to_string());
    }

    // 验证URL格式
    if !grafana.api_url.starts_with("http://") && !grafana.api_url.starts_with("https://") {
        return Err(format!("grafana.apiUrl 格式无效: {}", grafana.api_url));
    }

    if let Err(e) = reqwest::Url::parse(&grafana.api_url) {
        return Err(format!("grafana.apiUrl 无法解析: {} ({})", grafana.api_url, e));
    }

    Ok(())
}

/// 不影响加载但值得提示的配置问题
///
/// 由调用方在日志系统就绪后输出。
pub fn config_warnings(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();
    let grafana = &config.grafana;

    if grafana.api_key.is_empty() && grafana.gcp_sa_key.is_empty() {
        warnings.push("grafana.apiKey 和 grafana.gcpSAKey 均未配置，请求将不带有效凭证".to_string());
    }

    if grafana.insecure_skip_verify && grafana.api_url.starts_with("https://") {
        warnings.push(format!("已关闭 {} 的TLS证书校验", grafana.api_url));
    }

    warnings
}
