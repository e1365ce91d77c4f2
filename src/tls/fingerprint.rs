//! ClientHello 指纹
//!
//! 格式：`(version)(cipher suites)((ext)(ext)...)`，全部是十六进制。
//! GREASE (RFC 8701) 值统一写成 `0a0a`；
//! 内容在不同连接之间保持稳定的 extension 连同长度和数据一起写入，其余只写类型。

use crate::tls::client_hello::{ClientHello, Extension};
use serde_json::{Map, Value};
use std::fmt;
use std::fmt::Write as _;

/// GREASE 统一替换成的值
const GREASE_NORMALIZED: u16 = 0x0a0a;

/// 指纹中包含数据的 extension 类型
const INCLUDE_DATA: &[u16] = &[
    0x0001, // max_fragment_length
    0x0005, // status_request
    0x0007, // client_authz
    0x0008, // server_authz
    0x0009, // cert_type
    0x000a, // supported_groups
    0x000b, // ec_point_formats
    0x000d, // signature_algorithms
    0x000f, // heartbeat
    0x0010, // application_layer_protocol_negotiation
    0x0011, // status_request_v2
    0x0018, // token_binding
    0x001b, // compress_certificate
    0x001c, // record_size_limit
    0x002b, // supported_versions
    0x002d, // psk_key_exchange_modes
    0x0032, // signature_algorithms_cert
    0x5500, // token_binding (draft)
];

const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
const EXT_SUPPORTED_VERSIONS: u16 = 0x002b;

/// 0x?a?a，且高低字节相同
pub fn is_grease(value: u16) -> bool {
    value & 0x0f0f == 0x0a0a && value >> 8 == value & 0xff
}

fn degrease(value: u16) -> u16 {
    if is_grease(value) {
        GREASE_NORMALIZED
    } else {
        value
    }
}

/// 指纹来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerprintType {
    Tls,
    Quic,
}

impl FingerprintType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FingerprintType::Tls => "tls",
            FingerprintType::Quic => "quic",
        }
    }
}

impl fmt::Display for FingerprintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    fp_type: FingerprintType,
    value: String,
}

impl Fingerprint {
    /// 从 ClientHello 构造指纹；空 ClientHello 返回 None
    pub fn from_hello(hello: &ClientHello, fp_type: FingerprintType) -> Option<Self> {
        if !hello.is_not_empty() {
            return None;
        }

        let mut value = String::new();
        let _ = write!(value, "({:04x})(", hello.version);
        for suite in &hello.cipher_suites {
            let _ = write!(value, "{:04x}", degrease(*suite));
        }
        value.push_str(")(");
        for ext in &hello.extensions {
            write_extension(&mut value, ext);
        }
        value.push(')');

        Some(Self { fp_type, value })
    }

    pub fn fp_type(&self) -> FingerprintType {
        self.fp_type
    }

    /// 不带类型前缀的指纹字符串
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// 输出到 `fingerprints.<type>`
    pub fn write_json(&self, record: &mut Map<String, Value>) {
        let fingerprints = record
            .entry("fingerprints")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(fingerprints) = fingerprints {
            fingerprints.insert(
                self.fp_type.as_str().to_string(),
                Value::String(self.value.clone()),
            );
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.fp_type, self.value)
    }
}

fn write_extension(out: &mut String, ext: &Extension) {
    if is_grease(ext.ext_type) {
        let _ = write!(out, "({:04x})", GREASE_NORMALIZED);
        return;
    }
    if !INCLUDE_DATA.contains(&ext.ext_type) {
        let _ = write!(out, "({:04x})", ext.ext_type);
        return;
    }

    let data = match ext.ext_type {
        EXT_SUPPORTED_GROUPS => degrease_list(&ext.data, 2),
        EXT_SUPPORTED_VERSIONS => degrease_list(&ext.data, 1),
        _ => ext.data.clone(),
    };
    let _ = write!(
        out,
        "({:04x}{:04x}{})",
        ext.ext_type,
        data.len(),
        hex::encode(&data)
    );
}

/// 长度前缀之后是 u16 列表，把其中的 GREASE 值替换掉
fn degrease_list(data: &[u8], prefix_len: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    if out.len() < prefix_len {
        return out;
    }
    for item in out[prefix_len..].chunks_exact_mut(2) {
        let value = degrease(u16::from_be_bytes([item[0], item[1]]));
        item.copy_from_slice(&value.to_be_bytes());
    }
    out
}
