//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Grafana Notifier - Grafana注解通知工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "grafana-notifier",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "GRAFANA_NOTIFIER_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，未指定时使用配置文件中的 global.log_level
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "GRAFANA_NOTIFIER_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 是否启用详细输出
    #[arg(short, long, help = "启用详细输出")]
    pub verbose: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 发送一条Grafana注解
    Send {
        /// 注解文本
        #[arg(short, long, default_value = "", help = "注解文本")]
        message: String,

        /// 接收者，`|` 分隔的标签列表
        #[arg(short, long, default_value = "", help = "标签列表，使用 | 分隔")]
        recipient: String,

        /// 覆盖配置文件中的 apiUrl
        #[arg(long, value_name = "URL", help = "Grafana API地址", env = "GRAFANA_API_URL")]
        api_url: Option<String>,

        /// 覆盖配置文件中的 apiKey
        #[arg(
            long,
            value_name = "KEY",
            help = "Grafana API Key",
            env = "GRAFANA_API_KEY",
            hide_env_values = true
        )]
        api_key: Option<String>,

        /// 只构建注解，不发送
        #[arg(long, help = "只构建注解，不发送")]
        dry_run: bool,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "要验证的配置文件路径")]
        config_path: Option<PathBuf>,
    },

    /// 生成示例配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            default_value = "config.toml",
            help = "配置文件路径"
        )]
        config_path: PathBuf,

        /// 覆盖已存在的文件
        #[arg(short, long, help = "覆盖已存在的文件")]
        force: bool,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::loader::get_default_config_path)
    }

    /// 是否启用详细输出
    pub fn is_verbose(&self) -> bool {
        self.verbose || matches!(self.log_level, Some(LogLevel::Debug))
    }
}
