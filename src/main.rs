//! Grafana Notifier 主程序入口
//!
//! 将通知以Grafana注解的形式发送

use anyhow::{Context, Result};
use clap::Parser;
use grafana_notifier::cli::args::{Args, Commands};
use grafana_notifier::cli::commands::{
    load_cli_config, Command, InitCommand, SendCommand, ValidateCommand, VersionCommand,
};
use grafana_notifier::config::{config_warnings, Config};
use grafana_notifier::logging::{LogConfig, LoggingSystem};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 配置文件加载结果
type LoadedConfig = grafana_notifier::error::Result<Option<Config>>;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 配置文件只加载一次，先用于日志配置，再交给命令使用
    let loaded = load_cli_config(&args).await;

    let logging_system = LoggingSystem::setup_logging(resolve_log_config(&args, &loaded))
        .context("初始化日志系统失败")?;

    debug!("Grafana Notifier v{} 启动", grafana_notifier::VERSION);
    report_config(&args, &loaded);

    if let Err(e) = execute_command(&args, Arc::new(logging_system), loaded).await {
        error!("命令执行失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 确定日志配置
///
/// 命令行指定的级别优先，其次使用配置文件中的 global 配置。
fn resolve_log_config(args: &Args, loaded: &LoadedConfig) -> LogConfig {
    let global = loaded
        .as_ref()
        .ok()
        .and_then(Option::as_ref)
        .map(|config| config.global.clone())
        .unwrap_or_default();

    LogConfig::from_global(&global, args.log_level.clone().map(Into::into))
}

/// 日志系统就绪后输出配置加载结果
fn report_config(args: &Args, loaded: &LoadedConfig) {
    match loaded {
        Ok(Some(config)) => {
            info!("已加载配置文件: {}", args.get_config_path().display());
            for warning in config_warnings(config) {
                warn!("{}", warning);
            }
        }
        Ok(None) => debug!("未找到配置文件，仅使用命令行参数"),
        Err(e) => debug!("配置文件不可用: {}", e),
    }
}

/// 执行CLI命令
async fn execute_command(
    args: &Args,
    logging_system: Arc<LoggingSystem>,
    loaded: LoadedConfig,
) -> Result<()> {
    let command: Box<dyn Command> = match &args.command {
        Commands::Send { .. } => Box::new(SendCommand::new(Some(logging_system), loaded?)),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::Init { .. } => Box::new(InitCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    };

    command.execute(args).await.map_err(|e| anyhow::anyhow!(e))
}
