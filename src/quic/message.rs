//! QUIC Initial 消息
//!
//! 解析首部 → 派生密钥 → 移除 header protection → AEAD 解密 → 明文检查 → 解析 ClientHello。
//! 任何一步失败都停在 "无法解密" 状态，不暴露中间结果。

use crate::analysis::{AnalysisContext, Classifier, DestinationContext, FlowKey};
use crate::quic::crypto::InitialSalts;
use crate::quic::decrypt::InitialDecryptor;
use crate::quic::parser::InitialPacket;
use crate::tls::client_hello::ClientHello;
use crate::tls::fingerprint::{Fingerprint, FingerprintType};
use serde_json::{Map, Value};
use tracing::debug;

/// 解密成功后的内容
#[derive(Debug, Clone)]
struct Decrypted {
    decryptor: InitialDecryptor,
    hello: ClientHello,
}

/// 一个客户端 QUIC Initial 消息
#[derive(Debug, Clone)]
pub struct QuicInitialMessage<'a> {
    packet: InitialPacket<'a>,
    decrypted: Option<Decrypted>,
}

impl<'a> QuicInitialMessage<'a> {
    /// 解析并尝试解密
    ///
    /// # 参数
    /// - `data`: UDP payload (从 QUIC 首部第一个字节开始)
    /// - `salts`: 版本号 → Salt 映射表
    pub fn parse(data: &'a [u8], salts: &InitialSalts) -> Self {
        let packet = InitialPacket::parse(data);
        if !packet.is_not_empty() {
            return Self {
                packet,
                decrypted: None,
            };
        }

        let decrypted = match InitialDecryptor::decrypt(&packet, salts) {
            Ok(decryptor) => {
                let hello = ClientHello::parse(decryptor.client_hello_bytes());
                Some(Decrypted { decryptor, hello })
            }
            Err(e) => {
                debug!(
                    "QUIC Initial not decryptable (version {:#010x}): {}",
                    packet.version_number(),
                    e
                );
                None
            }
        };

        Self { packet, decrypted }
    }

    /// 首部结构是否有效 (不要求解密成功)
    pub fn is_not_empty(&self) -> bool {
        self.packet.is_not_empty()
    }

    pub fn is_decrypted(&self) -> bool {
        self.decrypted.is_some()
    }

    pub fn packet(&self) -> &InitialPacket<'a> {
        &self.packet
    }

    pub fn decryptor(&self) -> Option<&InitialDecryptor> {
        self.decrypted.as_ref().map(|d| &d.decryptor)
    }

    pub fn plaintext(&self) -> Option<&[u8]> {
        self.decryptor().map(InitialDecryptor::plaintext)
    }

    /// 解密成功且 ClientHello 解析成功时返回
    pub fn client_hello(&self) -> Option<&ClientHello> {
        self.decrypted
            .as_ref()
            .map(|d| &d.hello)
            .filter(|hello| hello.is_not_empty())
    }

    pub fn server_name(&self) -> Option<&[u8]> {
        self.client_hello()?.server_name()
    }

    pub fn compute_fingerprint(&self) -> Option<Fingerprint> {
        Fingerprint::from_hello(self.client_hello()?, FingerprintType::Quic)
    }

    /// 输出 JSON
    ///
    /// 解密成功时先写 ClientHello (`tls.client`)，然后总是写首部字段 (`quic`)。
    pub fn write_json(&self, record: &mut Map<String, Value>, metadata: bool) {
        if let Some(hello) = self.client_hello() {
            hello.write_json(record, metadata);
        }
        self.packet.write_json(record);
    }

    /// 把指纹和目的地信息交给分类器
    ///
    /// 没有指纹 (未解密或 ClientHello 无效) 时返回 None。
    pub fn do_analysis(
        &self,
        key: &FlowKey,
        classifier: &dyn Classifier,
    ) -> Option<AnalysisContext> {
        let fingerprint = self.compute_fingerprint()?;
        let destination = DestinationContext::new(self.server_name(), key);
        let result = classifier.analyze(&fingerprint, &destination);

        Some(AnalysisContext {
            fingerprint,
            destination,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisResult, FingerprintStatus, Transport};
    use crate::quic::crypto::{draft_version, QUIC_VERSION_1};
    use crate::quic::test_util::{build_initial, crypto_frame, sample_client_hello, DCID};
    use std::sync::Mutex;

    /// 记录调用参数的分类器
    #[derive(Default)]
    struct RecordingClassifier {
        seen: Mutex<Vec<(String, DestinationContext)>>,
    }

    impl Classifier for RecordingClassifier {
        fn analyze(&self, fingerprint: &Fingerprint, destination: &DestinationContext) -> AnalysisResult {
            self.seen
                .lock()
                .unwrap()
                .push((fingerprint.to_string(), destination.clone()));
            AnalysisResult::labeled("chrome", 0.9)
        }
    }

    fn flow() -> FlowKey {
        FlowKey::new(
            "10.0.0.2:50000".parse().unwrap(),
            "93.184.216.34:443".parse().unwrap(),
            Transport::Udp,
        )
    }

    #[test]
    fn test_message_v1() {
        let plaintext = crypto_frame(&sample_client_hello("example.com"), 1162);
        let packet = build_initial(QUIC_VERSION_1, &DCID, &plaintext, 2);
        let message = QuicInitialMessage::parse(&packet, &InitialSalts::standard());

        assert!(message.is_not_empty());
        assert!(message.is_decrypted());
        assert_eq!(message.server_name(), Some(&b"example.com"[..]));
        let fp = message.compute_fingerprint().unwrap();
        assert_eq!(fp.fp_type(), FingerprintType::Quic);
        assert!(fp.to_string().starts_with("quic/(0303)(130113021303)"));
    }

    #[test]
    fn test_message_write_json() {
        let plaintext = crypto_frame(&sample_client_hello("example.com"), 600);
        let packet = build_initial(draft_version(29), &DCID, &plaintext, 2);
        let message = QuicInitialMessage::parse(&packet, &InitialSalts::standard());

        let mut record = Map::new();
        message.write_json(&mut record, false);
        assert_eq!(record["tls"]["client"]["server_name"], "example.com");
        assert_eq!(record["quic"]["version"], "ff00001d");
        assert_eq!(record["quic"]["dcid"], "8394c8f03e515708");
    }

    #[test]
    fn test_undecryptable_exposes_header_only() {
        let plaintext = crypto_frame(&sample_client_hello("example.com"), 600);
        let packet = build_initial(QUIC_VERSION_1, &DCID, &plaintext, 2);
        let message = QuicInitialMessage::parse(&packet, &InitialSalts::empty());

        assert!(message.is_not_empty());
        assert!(!message.is_decrypted());
        assert!(message.plaintext().is_none());
        assert!(message.client_hello().is_none());
        assert!(message.compute_fingerprint().is_none());

        let mut record = Map::new();
        message.write_json(&mut record, true);
        assert!(record.get("tls").is_none());
        assert!(record.get("quic").is_some());

        let classifier = RecordingClassifier::default();
        assert!(message.do_analysis(&flow(), &classifier).is_none());
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_garbage_is_empty() {
        let message = QuicInitialMessage::parse(&[0xc3, 0x00, 0x00], &InitialSalts::standard());
        assert!(!message.is_not_empty());
        assert!(!message.is_decrypted());

        let mut record = Map::new();
        message.write_json(&mut record, false);
        assert!(record.is_empty());
    }

    #[test]
    fn test_do_analysis() {
        let plaintext = crypto_frame(&sample_client_hello("example.com"), 1162);
        let packet = build_initial(QUIC_VERSION_1, &DCID, &plaintext, 2);
        let message = QuicInitialMessage::parse(&packet, &InitialSalts::standard());

        let classifier = RecordingClassifier::default();
        let ctx = message.do_analysis(&flow(), &classifier).unwrap();
        assert_eq!(ctx.result.status, FingerprintStatus::Labeled);
        assert_eq!(ctx.destination.server_name, "example.com");
        assert_eq!(ctx.destination.dst_ip, "93.184.216.34");
        assert_eq!(ctx.destination.dst_port, 443);

        let seen = classifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, ctx.fingerprint.to_string());
    }
}
