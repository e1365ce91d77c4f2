//! 日志初始化

use crate::config::{LogFormat, LoggingConfig};
use anyhow::{bail, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 安装全局 tracing subscriber
///
/// `RUST_LOG` 优先于配置中的 level。写文件时返回的 guard 必须一直持有，
/// drop 之后缓冲中的日志才会被刷出。
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level: {}", config.level))?,
    };

    let (writer, guard) = match &config.file {
        Some(path) => {
            let Some(file_name) = path.file_name() else {
                bail!("Invalid log file path: {}", path.display());
            };
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_writer(writer),
            )
            .try_init(),
    };
    installed.context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_to_file() {
        let path = std::env::temp_dir().join(format!("wirefp-log-{}.log", std::process::id()));
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
            file: Some(path.clone()),
        };

        let guard = init_logging(&config).unwrap();
        assert!(guard.is_some());
        tracing::info!("logging initialized");
        drop(guard);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("logging initialized"));
        let _ = std::fs::remove_file(&path);

        // 全局 subscriber 只能安装一次
        assert!(init_logging(&LoggingConfig::default()).is_err());
    }

    #[test]
    fn test_invalid_file_path() {
        let config = LoggingConfig {
            file: Some("/".into()),
            ..LoggingConfig::default()
        };
        assert!(init_logging(&config).is_err());
    }
}
