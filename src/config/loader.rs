//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config>;

    /// 从字符串加载配置
    ///
    /// # 参数
    /// * `content` - 配置文件内容
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中的环境变量
    ///
    /// # 参数
    /// * `content` - 要处理的字符串
    ///
    /// # 返回
    /// * `Result<String>` - 替换后的字符串或错误
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        // 匹配 ${VAR_NAME} 格式的环境变量
        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut result = content.to_string();

        for captures in env_var_regex.captures_iter(content) {
            let full_match = &captures[0];
            let var_name = &captures[1];

            match std::env::var(var_name) {
                Ok(value) => {
                    result = result.replace(full_match, &value);
                }
                Err(_) => {
                    return Err(ConfigError::EnvVarError {
                        var: var_name.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(result)
    }

    /// 解析TOML内容
    fn parse_toml(&self, content: &str) -> Result<Config> {
        let processed_content = self.substitute_env_vars(content)?;

        let config: Config = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;

        Ok(config)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();

        // 检查文件是否存在
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let config = self.parse_toml(&content)?;

        self.validate(&config)?;

        // 配置中含有密钥，不打印完整内容
        log::debug!(
            "已解析配置文件 {}，Grafana API地址: {}",
            path.display(),
            config.grafana.api_url
        );

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let config = self.parse_toml(content)?;

        self.validate(&config)?;

        log::debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 获取默认配置文件路径
///
/// 当前目录存在 config.toml 时优先使用，否则使用用户配置目录下的
/// grafana-notifier/config.toml
pub fn get_default_config_path() -> std::path::PathBuf {
    if Path::new("config.toml").exists() {
        return std::path::PathBuf::from("config.toml");
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join("grafana-notifier").join("config.toml"))
        .unwrap_or_else(|| std::path::PathBuf::from("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const TEST_CONFIG_TOML: &str = r#"
[global]
log_level = "debug"

[grafana]
apiUrl = "https://grafana.example.com/api"
apiKey = "glsa_test"
insecureSkipVerify = true
"#;

    const TEST_CONFIG_WITH_ENV_VARS: &str = r#"
[grafana]
apiUrl = "${GRAFANA_TEST_URL}"
apiKey = "${GRAFANA_TEST_KEY}"
"#;

    #[tokio::test]
    async fn test_toml_parsing() {
        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_string(TEST_CONFIG_TOML).await.unwrap();

        assert_eq!(config.global.log_level, "debug");
        assert!(!config.global.json_logs);
        assert_eq!(config.grafana.api_url, "https://grafana.example.com/api");
        assert_eq!(config.grafana.api_key, "glsa_test");
        assert!(config.grafana.insecure_skip_verify);
        assert!(config.grafana.gcp_sa_key.is_empty());
    }

    #[tokio::test]
    async fn test_log_file_and_module_levels() {
        let loader = TomlConfigLoader::new(false);
        let config = loader
            .load_from_string(
                r#"
[global]
log_level = "warn"
log_file = "/tmp/grafana-notifier.log"

[global.module_levels]
reqwest = "error"
grafana_notifier = "debug"

[grafana]
apiUrl = "http://localhost:3000"
"#,
            )
            .await
            .unwrap();

        assert_eq!(
            config.global.log_file.as_deref(),
            Some(Path::new("/tmp/grafana-notifier.log"))
        );
        assert_eq!(config.global.module_levels.len(), 2);
        assert_eq!(config.global.module_levels["reqwest"], "error");
    }

    #[tokio::test]
    async fn test_global_section_optional() {
        let loader = TomlConfigLoader::new(false);
        let config = loader
            .load_from_string("[grafana]\napiUrl = \"http://localhost:3000\"\n")
            .await
            .unwrap();

        assert_eq!(config.global.log_level, "info");
        assert!(config.global.log_file.is_none());
        assert!(config.global.module_levels.is_empty());
        assert!(config.grafana.api_key.is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution() {
        env::set_var("GRAFANA_TEST_URL", "http://grafana.internal:3000/api");
        env::set_var("GRAFANA_TEST_KEY", "test-token-123");

        let loader = TomlConfigLoader::new(true);
        let config = loader
            .load_from_string(TEST_CONFIG_WITH_ENV_VARS)
            .await
            .unwrap();

        assert_eq!(config.grafana.api_url, "http://grafana.internal:3000/api");
        assert_eq!(config.grafana.api_key, "test-token-123");

        env::remove_var("GRAFANA_TEST_URL");
        env::remove_var("GRAFANA_TEST_KEY");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution_missing_var() {
        let config_with_missing_var = r#"
[grafana]
apiUrl = "http://localhost:3000"
apiKey = "${GRAFANA_MISSING_VAR}"
"#;

        let loader = TomlConfigLoader::new(true);
        let result = loader.load_from_string(config_with_missing_var).await;

        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("GRAFANA_MISSING_VAR"));
        }
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_url() {
        let loader = TomlConfigLoader::new(false);
        let result = loader
            .load_from_string("[grafana]\napiUrl = \"grafana.local\"\n")
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let loader = TomlConfigLoader::new(false);
        let result = loader.load_from_file("/nonexistent/grafana-notifier.toml").await;

        assert!(matches!(
            result,
            Err(crate::error::GrafanaNotifierError::Config(
                ConfigError::FileNotFound { .. }
            ))
        ));
    }

    #[test]
    fn test_substitute_env_vars_disabled() {
        let loader = TomlConfigLoader::new(false);
        let content = "test ${VAR} content";
        let result = loader.substitute_env_vars(content).unwrap();
        assert_eq!(result, content);
    }

    #[test]
    fn test_get_default_config_path() {
        let path = get_default_config_path();
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }
}
