use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectorConfig {
    /// 要识别的协议，逗号分隔 (例如: "tls,http,quic")；不设置表示 "all"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocols: Option<String>,
}

impl SelectorConfig {
    pub fn selection(&self) -> Option<&str> {
        self.protocols.as_deref()
    }
}

// 自定义 deserialize：protocols 可以写成字符串，也可以写成数组
impl<'de> serde::de::Deserialize<'de> for SelectorConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum RawProtocols {
            One(String),
            Many(Vec<String>),
        }

        #[derive(serde::Deserialize)]
        struct RawSelectorConfig {
            #[serde(default)]
            protocols: Option<RawProtocols>,
        }

        let raw = RawSelectorConfig::deserialize(deserializer)?;
        let protocols = raw.protocols.map(|p| match p {
            RawProtocols::One(s) => s,
            RawProtocols::Many(list) => list.join(","),
        });

        Ok(SelectorConfig { protocols })
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error (RUST_LOG 优先)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 日志格式: json, pretty
    #[serde(default)]
    pub format: LogFormat,
    /// 可选: 写入文件而不是 stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 输出 ClientHello 的完整字段 (version, random, cipher suites, extensions)
    #[serde(default)]
    pub metadata: bool,
}

// 默认值函数
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// 从文件加载配置
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml(&content).with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }
}
