//! 指纹分析的输入和输出
//!
//! 分类器本身不在这个库里，这里只定义把指纹和目的地信息交给分类器的接口，
//! 以及分类结果的 JSON 输出格式。

use crate::tls::fingerprint::Fingerprint;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

/// server_name 最多保留的字节数
pub const MAX_SERVER_NAME_LEN: usize = 256;

/// 传输层协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
}

/// 流的五元组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub transport: Transport,
}

impl FlowKey {
    pub fn new(src: SocketAddr, dst: SocketAddr, transport: Transport) -> Self {
        Self {
            src,
            dst,
            transport,
        }
    }
}

/// 目的地信息：server_name + 目的 IP + 目的端口
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationContext {
    pub server_name: String,
    pub dst_ip: String,
    pub dst_port: u16,
}

impl DestinationContext {
    /// server_name 超过 256 字节的部分被丢弃，非 UTF-8 字节按 lossy 方式转换
    pub fn new(server_name: Option<&[u8]>, key: &FlowKey) -> Self {
        let server_name = server_name
            .map(|name| {
                let name = &name[..name.len().min(MAX_SERVER_NAME_LEN)];
                String::from_utf8_lossy(name).into_owned()
            })
            .unwrap_or_default();

        Self {
            server_name,
            dst_ip: key.dst.ip().to_string(),
            dst_port: key.dst.port(),
        }
    }
}

/// 分类结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintStatus {
    #[default]
    NoInfoAvailable,
    Labeled,
    Randomized,
    Unlabeled,
}

impl FingerprintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FingerprintStatus::NoInfoAvailable => "no_info_available",
            FingerprintStatus::Labeled => "labeled",
            FingerprintStatus::Randomized => "randomized_fingerprint",
            FingerprintStatus::Unlabeled => "unlabeled_fingerprint",
        }
    }
}

impl fmt::Display for FingerprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 恶意软件判定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MalwareInfo {
    pub is_malware: bool,
    pub probability: f64,
}

/// 分类器的输出
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    pub status: FingerprintStatus,
    pub process: String,
    pub score: f64,
    pub malware: Option<MalwareInfo>,
    /// 操作系统 → 出现次数
    pub os_info: BTreeMap<String, u64>,
}

impl AnalysisResult {
    pub fn labeled(process: impl Into<String>, score: f64) -> Self {
        Self {
            status: FingerprintStatus::Labeled,
            process: process.into(),
            score,
            ..Self::default()
        }
    }

    pub fn randomized(process: impl Into<String>, score: f64) -> Self {
        Self {
            status: FingerprintStatus::Randomized,
            ..Self::labeled(process, score)
        }
    }

    pub fn unlabeled() -> Self {
        Self {
            status: FingerprintStatus::Unlabeled,
            ..Self::default()
        }
    }

    pub fn with_malware(mut self, is_malware: bool, probability: f64) -> Self {
        self.malware = Some(MalwareInfo {
            is_malware,
            probability,
        });
        self
    }

    pub fn with_os_info(mut self, os_info: BTreeMap<String, u64>) -> Self {
        self.os_info = os_info;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.status != FingerprintStatus::NoInfoAvailable
    }

    /// 输出到 `record[key]`
    ///
    /// - labeled: process, score, malware, os_info
    /// - randomized: 同上，再加 status
    /// - unlabeled: 只有 status
    /// - 其他: 字符串 "unknown"
    pub fn write_json(&self, record: &mut Map<String, Value>, key: &str) {
        let value = match self.status {
            FingerprintStatus::Labeled | FingerprintStatus::Randomized => {
                let mut analysis = Map::new();
                analysis.insert("process".to_string(), json!(self.process));
                analysis.insert("score".to_string(), json!(self.score));
                if let Some(malware) = self.malware {
                    analysis.insert("malware".to_string(), json!(malware.is_malware));
                    analysis.insert("p_malware".to_string(), json!(malware.probability));
                }
                if !self.os_info.is_empty() {
                    analysis.insert("os_info".to_string(), json!(self.os_info));
                }
                if self.status == FingerprintStatus::Randomized {
                    analysis.insert("status".to_string(), json!(self.status.as_str()));
                }
                Value::Object(analysis)
            }
            FingerprintStatus::Unlabeled => json!({ "status": self.status.as_str() }),
            FingerprintStatus::NoInfoAvailable => json!("unknown"),
        };
        record.insert(key.to_string(), value);
    }
}

/// 一次分析用到的全部数据
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisContext {
    pub fingerprint: Fingerprint,
    pub destination: DestinationContext,
    pub result: AnalysisResult,
}

impl AnalysisContext {
    pub fn write_json(&self, record: &mut Map<String, Value>) {
        self.result.write_json(record, "analysis");
    }
}

/// 指纹分类器
///
/// 实现方需要能在多个线程之间共享。
pub trait Classifier: Send + Sync {
    fn analyze(&self, fingerprint: &Fingerprint, destination: &DestinationContext) -> AnalysisResult;
}
