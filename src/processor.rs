//! 单个数据包的处理入口
//!
//! 先用 `TrafficSelector` 识别载荷类型，再对 TLS ClientHello / QUIC Initial 计算指纹，
//! 输出一条 JSON 记录。处理过程不持有任何跨包的可变状态。

use crate::analysis::{Classifier, DestinationContext, FlowKey};
use crate::config::Config;
use crate::identify::{TcpMsgType, TrafficSelector, UdpMsgType};
use crate::quic::{InitialSalts, QuicInitialMessage, VersionNegotiation};
use crate::tls::{ClientHello, Fingerprint, FingerprintType};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, trace};

pub type Record = Map<String, Value>;

#[derive(Clone)]
pub struct PacketProcessor {
    selector: TrafficSelector,
    salts: InitialSalts,
    metadata: bool,
    classifier: Option<Arc<dyn Classifier>>,
}

impl std::fmt::Debug for PacketProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketProcessor")
            .field("selector", &self.selector)
            .field("salts", &self.salts.len())
            .field("metadata", &self.metadata)
            .field("classifier", &self.classifier.is_some())
            .finish()
    }
}

impl PacketProcessor {
    pub fn new(selector: TrafficSelector, salts: InitialSalts, metadata: bool) -> Self {
        Self {
            selector,
            salts,
            metadata,
            classifier: None,
        }
    }

    /// 从配置构建；协议选择字符串无效时报错
    pub fn from_config(config: &Config) -> Result<Self> {
        let selection = config.selector.selection();
        let selector = TrafficSelector::new(selection).with_context(|| {
            format!(
                "Invalid protocol selection: {}",
                selection.unwrap_or("<default>")
            )
        })?;

        info!(
            "Packet processor ready (metadata output: {})",
            config.output.metadata
        );

        Ok(Self::new(
            selector,
            InitialSalts::standard(),
            config.output.metadata,
        ))
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn selector(&self) -> &TrafficSelector {
        &self.selector
    }

    pub fn salts(&self) -> &InitialSalts {
        &self.salts
    }

    /// 处理 TCP 载荷；只有 TLS ClientHello 会产生记录
    pub fn process_tcp(&self, payload: &[u8], key: &FlowKey) -> Option<Record> {
        let msg_type = self.selector.classify_tcp(payload);
        trace!("TCP payload from {} classified as {}", key.src, msg_type);

        if msg_type != TcpMsgType::TlsClientHello {
            return None;
        }

        let hello = ClientHello::parse_record(payload);
        let fingerprint = Fingerprint::from_hello(&hello, FingerprintType::Tls)?;

        let mut record = Record::new();
        fingerprint.write_json(&mut record);
        hello.write_json(&mut record, self.metadata);
        self.analyze(&mut record, &fingerprint, hello.server_name(), key);

        Some(record)
    }

    /// 处理 UDP 载荷；QUIC Initial / Version Negotiation 会产生记录
    pub fn process_udp(&self, payload: &[u8], key: &FlowKey) -> Option<Record> {
        let msg_type = self.selector.classify_udp(payload);
        trace!("UDP payload from {} classified as {}", key.src, msg_type);

        match msg_type {
            UdpMsgType::Quic => {
                let message = QuicInitialMessage::parse(payload, &self.salts);
                if !message.is_not_empty() {
                    return None;
                }

                let mut record = Record::new();
                let fingerprint = message.compute_fingerprint();
                if let Some(fingerprint) = &fingerprint {
                    fingerprint.write_json(&mut record);
                }
                message.write_json(&mut record, self.metadata);
                if let Some(fingerprint) = &fingerprint {
                    self.analyze(&mut record, fingerprint, message.server_name(), key);
                }
                Some(record)
            }
            UdpMsgType::QuicVersionNegotiation => {
                let vn = VersionNegotiation::parse(payload);
                if !vn.is_not_empty() {
                    return None;
                }
                let mut quic = Map::new();
                vn.write_json(&mut quic);
                let mut record = Record::new();
                record.insert("quic".to_string(), Value::Object(quic));
                Some(record)
            }
            _ => None,
        }
    }

    fn analyze(
        &self,
        record: &mut Record,
        fingerprint: &Fingerprint,
        server_name: Option<&[u8]>,
        key: &FlowKey,
    ) {
        let Some(classifier) = &self.classifier else {
            return;
        };
        let destination = DestinationContext::new(server_name, key);
        classifier
            .analyze(fingerprint, &destination)
            .write_json(record, "analysis");
    }
}
