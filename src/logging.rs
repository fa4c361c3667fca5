//! 日志系统模块
//!
//! 提供结构化日志配置和管理功能，以及注入给通知服务的日志接口

use crate::config::GlobalConfig;
use log::LevelFilter;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局日志初始化状态
#[derive(Debug)]
struct GlobalLoggingState {
    /// 是否已初始化
    initialized: bool,
    /// 初始化结果
    init_result: Result<(), String>,
}

impl Default for GlobalLoggingState {
    fn default() -> Self {
        Self {
            initialized: false,
            init_result: Ok(()),
        }
    }
}

/// 全局日志状态管理器
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<GlobalLoggingState>> = OnceLock::new();

/// 日志配置结构
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径，未设置时输出到控制台
    pub file_path: Option<PathBuf>,
    /// 是否使用JSON格式
    pub json_format: bool,
    /// 模块级别日志控制
    pub module_levels: HashMap<String, LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file_path: None,
            json_format: false,
            module_levels: HashMap::new(),
        }
    }
}

impl LogConfig {
    /// 由配置文件的 global 段构建日志配置
    ///
    /// `level_override` 来自命令行，优先于 `log_level`。
    pub fn from_global(global: &GlobalConfig, level_override: Option<LevelFilter>) -> Self {
        Self {
            level: level_override.unwrap_or_else(|| LoggingSystem::parse_level(&global.log_level)),
            file_path: global.log_file.clone(),
            json_format: global.json_logs,
            module_levels: global
                .module_levels
                .iter()
                .map(|(module, level)| (module.clone(), LoggingSystem::parse_level(level)))
                .collect(),
        }
    }
}

/// 日志系统管理器
pub struct LoggingSystem {
    /// 配置
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 重复调用不会重复安装全局subscriber，直接返回新的 LoggingSystem 实例。
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        let state_mutex =
            GLOBAL_LOGGING_STATE.get_or_init(|| Mutex::new(GlobalLoggingState::default()));

        let mut state = state_mutex
            .lock()
            .map_err(|e| anyhow::anyhow!("日志状态锁已损坏: {}", e))?;

        if state.initialized {
            return match &state.init_result {
                Ok(()) => Ok(Self { config }),
                Err(e) => Err(anyhow::anyhow!("日志系统之前初始化失败: {}", e)),
            };
        }

        let init_result = Self::init_log_tracer().and_then(|_| Self::init_tracing_subscriber(&config));
        state.initialized = true;
        state.init_result = init_result.as_ref().map(|_| ()).map_err(|e| e.to_string());
        init_result?;

        Ok(Self { config })
    }

    /// 初始化 LogTracer，把 log crate 的记录转发给 tracing
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

        let result = LOG_TRACER_INIT.get_or_init(|| LogTracer::init().map_err(|e| e.to_string()));

        result
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;
        Ok(())
    }

    /// 构建过滤器：全局级别加上各模块的覆盖
    fn build_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
        let mut env_filter = EnvFilter::from_default_env()
            .add_directive(Self::convert_level_to_directive(config.level));

        for (module, level) in &config.module_levels {
            let directive = format!("{}={}", module, Self::level_to_string(*level))
                .parse()
                .map_err(|e| anyhow::anyhow!("无效的模块日志级别 {}: {}", module, e))?;
            env_filter = env_filter.add_directive(directive);
        }

        Ok(env_filter)
    }

    /// 以追加方式打开日志文件，必要时创建上级目录
    fn open_log_file(path: &Path) -> anyhow::Result<std::fs::File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("创建日志目录 {} 失败: {}", parent.display(), e))?;
        }

        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow::anyhow!("打开日志文件 {} 失败: {}", path.display(), e))
    }

    /// 初始化 tracing subscriber
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let env_filter = Self::build_filter(config)?;

        let (writer, ansi) = match &config.file_path {
            Some(path) => (BoxMakeWriter::new(Mutex::new(Self::open_log_file(path)?)), false),
            None => (BoxMakeWriter::new(std::io::stdout), true),
        };

        let fmt_layer = if config.json_format {
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_file(true)
                .with_line_number(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(writer)
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_ansi(ansi)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .boxed()
        };

        match registry().with(env_filter).with(fmt_layer).try_init() {
            Ok(()) => {
                tracing::debug!("日志配置: {:?}", config);
                Ok(())
            }
            // LogTracer 已经安装，或者测试进程中已有其他subscriber
            Err(e)
                if e.to_string().contains("logging system was already initialized")
                    || e.to_string().contains("already been set") =>
            {
                tracing::debug!("已存在全局subscriber，沿用现有配置");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("tracing subscriber初始化失败: {}", e)),
        }
    }

    /// 将 log::LevelFilter 转换为 tracing 的指令
    fn convert_level_to_directive(level: LevelFilter) -> tracing_subscriber::filter::Directive {
        use tracing_subscriber::filter::{Directive, LevelFilter as TracingLevelFilter};
        match level {
            LevelFilter::Off => Directive::from(TracingLevelFilter::OFF),
            LevelFilter::Error => Directive::from(tracing::Level::ERROR),
            LevelFilter::Warn => Directive::from(tracing::Level::WARN),
            LevelFilter::Info => Directive::from(tracing::Level::INFO),
            LevelFilter::Debug => Directive::from(tracing::Level::DEBUG),
            LevelFilter::Trace => Directive::from(tracing::Level::TRACE),
        }
    }

    fn level_to_string(level: LevelFilter) -> &'static str {
        match level {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        }
    }

    /// 从配置文件中的字符串解析日志级别
    pub fn parse_level(level: &str) -> LevelFilter {
        level.parse().unwrap_or(LevelFilter::Info)
    }

    /// 重置日志系统状态（主要用于测试）
    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Some(state_mutex) = GLOBAL_LOGGING_STATE.get() {
            if let Ok(mut state) = state_mutex.lock() {
                state.initialized = false;
                state.init_result = Ok(());
            }
        }
    }

    /// 记录通知日志
    pub fn notification_log(
        &self,
        notification_type: &str,
        recipient: &str,
        success: bool,
        error: Option<&str>,
    ) {
        let notification_entry = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "type": "notification",
            "notification_type": notification_type,
            "recipient": recipient,
            "success": success,
            "error": error.unwrap_or(""),
        });

        if self.config.json_format {
            tracing::info!("{notification_entry}");
        } else {
            tracing::info!(
                "NOTIFICATION: {} to {} - {} {}",
                notification_type,
                recipient,
                if success { "SUCCESS" } else { "FAILED" },
                error.unwrap_or("")
            );
        }
    }
}

/// 通知服务使用的日志接口
///
/// 通过注入而不是全局单例使用，测试中可以替换为 [`MemoryLogger`] 捕获输出。
pub trait NotifierLogger: Send + Sync {
    /// 调试日志
    fn debug(&self, service: &str, message: &str);
    /// 警告日志
    fn warn(&self, service: &str, message: &str);
    /// 错误日志
    fn error(&self, service: &str, message: &str);
}

/// 转发到 tracing 的日志实现
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl NotifierLogger for TracingLogger {
    fn debug(&self, service: &str, message: &str) {
        tracing::debug!(service = service, "{}", message);
    }

    fn warn(&self, service: &str, message: &str) {
        tracing::warn!(service = service, "{}", message);
    }

    fn error(&self, service: &str, message: &str) {
        tracing::error!(service = service, "{}", message);
    }
}

/// 日志条目
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// 日志级别
    pub level: log::Level,
    /// 服务名称
    pub service: String,
    /// 日志内容
    pub message: String,
}

/// 将日志记录在内存中的实现
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    /// 创建空的内存日志
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录的全部日志
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// 指定级别的日志数量
    pub fn count(&self, level: log::Level) -> usize {
        self.entries().iter().filter(|e| e.level == level).count()
    }

    fn push(&self, level: log::Level, service: &str, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(LogEntry {
                level,
                service: service.to_string(),
                message: message.to_string(),
            });
        }
    }
}

impl NotifierLogger for MemoryLogger {
    fn debug(&self, service: &str, message: &str) {
        self.push(log::Level::Debug, service, message);
    }

    fn warn(&self, service: &str, message: &str) {
        self.push(log::Level::Warn, service, message);
    }

    fn error(&self, service: &str, message: &str) {
        self.push(log::Level::Error, service, message);
    }
}
