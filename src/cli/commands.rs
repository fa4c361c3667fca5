//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{config_warnings, Config, ConfigLoader, GrafanaOptions, TomlConfigLoader};
use crate::error::{ConfigError, Result};
use crate::logging::LoggingSystem;
use crate::notification::grafana::SERVICE_NAME;
use crate::notification::{
    Destination, GrafanaAnnotation, GrafanaService, NoOpService, Notification,
    NotificationService,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// 示例配置文件内容
const SAMPLE_CONFIG: &str = include_str!("../../config.example.toml");

/// 加载命令行指定的配置文件
///
/// 未使用 `--config` 且默认路径不存在时返回 `None`，此时只使用命令行参数。
pub async fn load_cli_config(args: &Args) -> Result<Option<Config>> {
    let config_path = args.get_config_path();

    if args.config.is_none() && !config_path.exists() {
        return Ok(None);
    }

    TomlConfigLoader::new(true)
        .load_from_file(&config_path)
        .await
        .map(Some)
}

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            self.create_config_file(config_path, *force).await
        } else {
            Ok(())
        }
    }
}

impl InitCommand {
    /// 创建配置文件
    async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(config_path, SAMPLE_CONFIG).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请编辑配置文件以设置Grafana地址和API Key");

        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate { config_path } = &args.command {
            let config_file = config_path
                .clone()
                .unwrap_or_else(|| args.get_config_path());

            self.validate_config_file(&config_file, args.is_verbose())
                .await
        } else {
            Ok(())
        }
    }
}

impl ValidateCommand {
    /// 验证配置文件
    async fn validate_config_file(&self, config_path: &Path, verbose: bool) -> Result<()> {
        println!("验证配置文件: {}", config_path.display());

        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_file(config_path).await?;

        println!("✓ 配置文件验证通过");

        for warning in config_warnings(&config) {
            println!("⚠ {}", warning);
        }

        if verbose {
            let grafana = &config.grafana;
            println!("全局配置:");
            println!("  日志级别: {}", config.global.log_level);
            println!(
                "  JSON日志: {}",
                if config.global.json_logs { "是" } else { "否" }
            );
            match &config.global.log_file {
                Some(path) => println!("  日志文件: {}", path.display()),
                None => println!("  日志文件: 控制台"),
            }
            let mut modules: Vec<_> = config.global.module_levels.iter().collect();
            modules.sort();
            for (module, level) in modules {
                println!("  模块级别: {} = {}", module, level);
            }
            println!("Grafana配置:");
            println!("  API地址: {}", grafana.api_url);
            println!(
                "  API Key: {}",
                if grafana.api_key.is_empty() { "未配置" } else { "已配置" }
            );
            println!(
                "  跳过TLS校验: {}",
                if grafana.insecure_skip_verify { "是" } else { "否" }
            );
            println!(
                "  认证模式: {}",
                if grafana.gcp_sa_key.is_empty() {
                    "静态 API Key"
                } else {
                    "GCP服务账号身份令牌"
                }
            );
        }

        Ok(())
    }
}

/// 发送命令
#[derive(Default)]
pub struct SendCommand {
    /// 日志系统，用于记录发送结果
    logging: Option<Arc<LoggingSystem>>,
    /// 启动时加载的配置文件
    config: Option<Config>,
}

impl SendCommand {
    /// 创建发送命令
    pub fn new(logging: Option<Arc<LoggingSystem>>, config: Option<Config>) -> Self {
        Self { logging, config }
    }

    /// 合并配置文件和命令行参数得到Grafana配置
    fn resolve_options(
        &self,
        api_url: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<GrafanaOptions> {
        let mut options = self
            .config
            .as_ref()
            .map(|config| config.grafana.clone())
            .unwrap_or_default();

        if let Some(url) = api_url {
            options.api_url = url.to_string();
        }
        if let Some(key) = api_key {
            options.api_key = key.to_string();
        }

        if options.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "未配置Grafana API地址，请使用 --api-url 或配置 grafana.apiUrl".to_string(),
            )
            .into());
        }

        Ok(options)
    }
}

#[async_trait]
impl Command for SendCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Send {
            message,
            recipient,
            api_url,
            api_key,
            dry_run,
        } = &args.command
        else {
            return Ok(());
        };

        let options = self.resolve_options(api_url.as_deref(), api_key.as_deref())?;

        let notification = Notification::new(message.clone());
        let destination = Destination::new(SERVICE_NAME, recipient.clone());

        let service: Box<dyn NotificationService> = if *dry_run {
            let annotation = GrafanaAnnotation::new(&notification, &destination);
            println!("{}", serde_json::to_string_pretty(&annotation)?);
            Box::new(NoOpService)
        } else {
            Box::new(GrafanaService::new(options))
        };

        let result = service.send(&notification, &destination).await;

        if let Some(logging) = &self.logging {
            let error = result.as_ref().err().map(|e| e.to_string());
            logging.notification_log(SERVICE_NAME, recipient, result.is_ok(), error.as_deref());
        }

        result?;

        if *dry_run {
            println!("✓ 试运行完成，未发送注解");
        } else {
            println!("✓ Grafana注解发送成功");
        }

        Ok(())
    }
}
