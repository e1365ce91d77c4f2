//! TLS ClientHello 解析
//!
//! 参考 RFC 8446 Section 4.1.2: Client Hello
//!
//! ```text
//! struct {
//!     ProtocolVersion legacy_version = 0x0303;
//!     Random random;
//!     opaque legacy_session_id<0..32>;
//!     CipherSuite cipher_suites<2..2^16-2>;
//!     opaque legacy_compression_methods<1..2^8-1>;
//!     Extension extensions<8..2^16-1>;
//! } ClientHello;
//! ```

use serde_json::{json, Map, Value};
use std::fmt;
use tracing::trace;

/// TLS record: ContentType handshake
const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
/// HandshakeType client_hello
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;

/// server_name extension
pub const EXT_SERVER_NAME: u16 = 0x0000;
/// server_name 中的 host_name 类型
const NAME_TYPE_HOST_NAME: u8 = 0x00;

/// ClientHello 解析错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloError {
    DataTooShort,
    NotHandshake,
    NotClientHello,
    InvalidCipherSuites,
}

impl fmt::Display for HelloError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelloError::DataTooShort => write!(f, "Data too short"),
            HelloError::NotHandshake => write!(f, "Not Handshake"),
            HelloError::NotClientHello => write!(f, "Not ClientHello"),
            HelloError::InvalidCipherSuites => write!(f, "Invalid cipher suites"),
        }
    }
}

impl std::error::Error for HelloError {}

/// 单个 extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub ext_type: u16,
    pub data: Vec<u8>,
}

/// 解析后的 ClientHello
///
/// 解析失败时是一个空对象，使用前用 `is_not_empty()` 检查。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHello {
    pub version: u16,
    pub random: Vec<u8>,
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<u16>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
    valid: bool,
}

/// 顺序读取，越界返回 `DataTooShort`
fn take<'a>(data: &mut &'a [u8], len: usize) -> Result<&'a [u8], HelloError> {
    let bytes: &'a [u8] = *data;
    if bytes.len() < len {
        return Err(HelloError::DataTooShort);
    }
    let (head, tail) = bytes.split_at(len);
    *data = tail;
    Ok(head)
}

fn take_u8(data: &mut &[u8]) -> Result<u8, HelloError> {
    Ok(take(data, 1)?[0])
}

fn take_u16(data: &mut &[u8]) -> Result<u16, HelloError> {
    let bytes = take(data, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

impl ClientHello {
    /// 从 legacy_version 开始解析 ClientHello body
    pub fn parse(body: &[u8]) -> Self {
        Self::try_parse(body).unwrap_or_else(|e| {
            trace!("ClientHello parse failed: {}", e);
            Self::default()
        })
    }

    /// 解析 TLS record (`16 03 xx len len 01 len len len ...`)
    pub fn parse_record(data: &[u8]) -> Self {
        Self::try_parse_record(data).unwrap_or_else(|e| {
            trace!("ClientHello record parse failed: {}", e);
            Self::default()
        })
    }

    pub fn try_parse_record(data: &[u8]) -> Result<Self, HelloError> {
        let mut cursor = data;

        // TLS record: [type(1)=0x16][version(2)][len(2)][handshake...]
        if take_u8(&mut cursor)? != CONTENT_TYPE_HANDSHAKE {
            return Err(HelloError::NotHandshake);
        }
        take(&mut cursor, 2)?;
        let record_len = take_u16(&mut cursor)? as usize;
        // 记录可能跨越多个 TCP 段，只看已经到达的部分
        let mut handshake = &cursor[..record_len.min(cursor.len())];

        // TLS Handshake: [msg_type(1)][len(3)][body...]
        if take_u8(&mut handshake)? != HANDSHAKE_CLIENT_HELLO {
            return Err(HelloError::NotClientHello);
        }
        let len = take(&mut handshake, 3)?;
        let hs_len = (len[0] as usize) << 16 | (len[1] as usize) << 8 | len[2] as usize;
        let body = &handshake[..hs_len.min(handshake.len())];

        Self::try_parse(body)
    }

    /// 解析 ClientHello body
    ///
    /// 固定字段 (version 到 compression methods) 必须完整；
    /// extensions 被截断时只保留完整的部分。
    pub fn try_parse(body: &[u8]) -> Result<Self, HelloError> {
        let mut cursor = body;

        let version = take_u16(&mut cursor)?;
        let random = take(&mut cursor, 32)?.to_vec();

        let session_id_len = take_u8(&mut cursor)? as usize;
        let session_id = take(&mut cursor, session_id_len)?.to_vec();

        let cipher_suites_len = take_u16(&mut cursor)? as usize;
        if cipher_suites_len % 2 != 0 {
            return Err(HelloError::InvalidCipherSuites);
        }
        let cipher_suites = take(&mut cursor, cipher_suites_len)?
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();

        let compression_len = take_u8(&mut cursor)? as usize;
        let compression_methods = take(&mut cursor, compression_len)?.to_vec();

        let extensions = parse_extensions(cursor);

        Ok(Self {
            version,
            random,
            session_id,
            cipher_suites,
            compression_methods,
            extensions,
            valid: true,
        })
    }

    pub fn is_not_empty(&self) -> bool {
        self.valid
    }

    pub fn extension(&self, ext_type: u16) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.ext_type == ext_type)
    }

    /// server_name extension 中第一个 host_name
    pub fn server_name(&self) -> Option<&[u8]> {
        let ext = self.extension(EXT_SERVER_NAME)?;
        let mut data = ext.data.as_slice();

        let list_len = take_u16(&mut data).ok()? as usize;
        let mut list = &data[..list_len.min(data.len())];
        while !list.is_empty() {
            let name_type = take_u8(&mut list).ok()?;
            let name_len = take_u16(&mut list).ok()? as usize;
            let name = take(&mut list, name_len).ok()?;
            if name_type == NAME_TYPE_HOST_NAME {
                return Some(name);
            }
        }
        None
    }

    /// 输出到 `tls.client`
    ///
    /// `metadata` 为 true 时附带版本、random、session id 等字段。
    pub fn write_json(&self, record: &mut Map<String, Value>, metadata: bool) {
        if !self.valid {
            return;
        }

        let mut client = Map::new();
        if let Some(name) = self.server_name() {
            client.insert(
                "server_name".to_string(),
                Value::String(String::from_utf8_lossy(name).into_owned()),
            );
        }

        if metadata {
            let cipher_suites: Vec<u8> = self
                .cipher_suites
                .iter()
                .flat_map(|c| c.to_be_bytes())
                .collect();
            let extensions: Vec<Value> = self
                .extensions
                .iter()
                .map(|e| json!({ "type": e.ext_type, "data": hex::encode(&e.data) }))
                .collect();

            client.insert("version".to_string(), json!(hex::encode(self.version.to_be_bytes())));
            client.insert("random".to_string(), json!(hex::encode(&self.random)));
            client.insert("session_id".to_string(), json!(hex::encode(&self.session_id)));
            client.insert("cipher_suites".to_string(), json!(hex::encode(cipher_suites)));
            client.insert(
                "compression_methods".to_string(),
                json!(hex::encode(&self.compression_methods)),
            );
            client.insert("extensions".to_string(), Value::Array(extensions));
        }

        let tls = record
            .entry("tls")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(tls) = tls {
            tls.insert("client".to_string(), Value::Object(client));
        }
    }
}

/// extensions: [total_len(2)][type(2) len(2) data]...
fn parse_extensions(mut data: &[u8]) -> Vec<Extension> {
    let mut extensions = Vec::new();

    let Ok(total_len) = take_u16(&mut data) else {
        return extensions;
    };
    let mut block = &data[..(total_len as usize).min(data.len())];

    while let (Ok(ext_type), Ok(ext_len)) = (take_u16(&mut block), take_u16(&mut block)) {
        let Ok(ext_data) = take(&mut block, ext_len as usize) else {
            trace!("Extension {:#06x} truncated, dropped", ext_type);
            break;
        };
        extensions.push(Extension {
            ext_type,
            data: ext_data.to_vec(),
        });
    }

    extensions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quic::test_util::sample_client_hello;

    /// 包装成 TLS record
    fn to_record(handshake: &[u8]) -> Vec<u8> {
        let mut record = vec![0x16, 0x03, 0x01];
        record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
        record.extend_from_slice(handshake);
        record
    }

    #[test]
    fn test_parse_body() {
        let handshake = sample_client_hello("example.com");
        let hello = ClientHello::parse(&handshake[4..]);

        assert!(hello.is_not_empty());
        assert_eq!(hello.version, 0x0303);
        assert_eq!(hello.random, (0u8..32).collect::<Vec<_>>());
        assert!(hello.session_id.is_empty());
        assert_eq!(hello.cipher_suites, vec![0x1301, 0x1302, 0x1303]);
        assert_eq!(hello.compression_methods, vec![0x00]);
        let types: Vec<u16> = hello.extensions.iter().map(|e| e.ext_type).collect();
        assert_eq!(types, vec![0x1a1a, 0x0000, 0x000a, 0x0010, 0x000d, 0x002b, 0x0039]);
        assert_eq!(hello.server_name(), Some(&b"example.com"[..]));
    }

    #[test]
    fn test_parse_record() {
        let record = to_record(&sample_client_hello("www.google.com"));
        let hello = ClientHello::parse_record(&record);
        assert!(hello.is_not_empty());
        assert_eq!(hello.server_name(), Some(&b"www.google.com"[..]));
    }

    #[test]
    fn test_parse_record_errors() {
        let mut record = to_record(&sample_client_hello("example.com"));
        record[0] = 0x17;
        assert_eq!(
            ClientHello::try_parse_record(&record),
            Err(HelloError::NotHandshake)
        );

        let mut record = to_record(&sample_client_hello("example.com"));
        record[5] = 0x02;
        assert_eq!(
            ClientHello::try_parse_record(&record),
            Err(HelloError::NotClientHello)
        );

        assert_eq!(
            ClientHello::try_parse_record(&[0x16, 0x03]),
            Err(HelloError::DataTooShort)
        );
    }

    #[test]
    fn test_truncated_extensions_dropped() {
        let handshake = sample_client_hello("example.com");
        let body = &handshake[4..];
        // 截掉最后一个 extension (0x0039, 4 + 6 字节) 的一部分
        let hello = ClientHello::parse(&body[..body.len() - 3]);
        assert!(hello.is_not_empty());
        assert_eq!(hello.extensions.len(), 6);
        assert_eq!(hello.server_name(), Some(&b"example.com"[..]));
    }

    #[test]
    fn test_truncated_fixed_fields() {
        let handshake = sample_client_hello("example.com");
        let body = &handshake[4..];
        // version + random + session id + cipher suites 不完整
        for len in [0usize, 1, 20, 34, 36, 40] {
            assert!(!ClientHello::parse(&body[..len]).is_not_empty(), "len {}", len);
        }
        // compression methods 结束后没有 extensions 也可以
        let fixed_len = 2 + 32 + 1 + 2 + 6 + 2;
        let hello = ClientHello::parse(&body[..fixed_len]);
        assert!(hello.is_not_empty());
        assert!(hello.extensions.is_empty());
        assert_eq!(hello.server_name(), None);
    }

    #[test]
    fn test_odd_cipher_suites_length() {
        let mut body = vec![0x03, 0x03];
        body.extend_from_slice(&[0u8; 32]);
        body.push(0x00);
        body.extend_from_slice(&[0x00, 0x03, 0x13, 0x01, 0x13]);
        body.extend_from_slice(&[0x01, 0x00]);
        assert_eq!(
            ClientHello::try_parse(&body),
            Err(HelloError::InvalidCipherSuites)
        );
    }

    #[test]
    fn test_write_json() {
        let handshake = sample_client_hello("example.com");
        let hello = ClientHello::parse(&handshake[4..]);

        let mut record = Map::new();
        hello.write_json(&mut record, false);
        assert_eq!(record["tls"]["client"], json!({ "server_name": "example.com" }));

        let mut record = Map::new();
        hello.write_json(&mut record, true);
        let client = &record["tls"]["client"];
        assert_eq!(client["version"], "0303");
        assert_eq!(client["cipher_suites"], "130113021303");
        assert_eq!(client["compression_methods"], "00");
        assert_eq!(client["extensions"][1]["type"], 0);
        assert_eq!(client["extensions"].as_array().unwrap().len(), 7);

        let mut empty = Map::new();
        ClientHello::default().write_json(&mut empty, true);
        assert!(empty.is_empty());
    }
}
