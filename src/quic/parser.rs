//! QUIC Initial Packet 解析器
//!
//! 参考 RFC 9000 Section 17.2: Long Header Packets
//!
//! 解析结果只是对原始数据的切片引用 (不拷贝)，
//! 生命周期受限于调用方提供的数据包缓冲区。

use crate::quic::error::{QuicError, Result};
use serde_json::{json, Map, Value};
use tracing::{debug, trace};

/// payload 的最小长度 (header protection 需要 4 + 16 字节采样，另留出 AEAD tag)
pub const MIN_PAYLOAD_LEN: usize = 32;

/// Long header 的 packet type 位 (Initial 要求为 0)
const LONG_PACKET_TYPE_MASK: u8 = 0x30;

/// Header Form 位
const HEADER_FORM_LONG: u8 = 0x80;

/// 顺序读取器，所有读取都做边界检查
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn position(&self) -> usize {
        self.offset
    }

    fn rest(&self) -> &'a [u8] {
        let data = self.data;
        &data[self.offset..]
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(QuicError::PacketTooShort {
                expected: self.offset.saturating_add(len),
                actual: self.data.len(),
            })?;
        let data = self.data;
        let bytes = &data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// 读取 1 字节长度前缀的字段 (Connection ID)
    fn read_u8_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u8()? as usize;
        self.read_bytes(len)
    }

    fn read_varint(&mut self) -> Result<u64> {
        let (value, len) = parse_varint(self.rest())?;
        self.offset += len;
        Ok(value)
    }
}

/// 解析 QUIC VarInt (Variable-Length Integer)
///
/// RFC 9000 Section 16: Variable-Length Integer Encoding
///
/// ```text
/// 2MSB  Length  Usable Bits  Range
/// 00    1       6            0-63
/// 01    2       14           0-16383
/// 10    4       30           0-1073741823
/// 11    8       62           0-4611686018427387903
/// ```
///
/// # 返回
/// - (value, bytes_consumed)
pub fn parse_varint(data: &[u8]) -> Result<(u64, usize)> {
    let Some(&first) = data.first() else {
        return Err(QuicError::VarIntTruncated {
            expected: 1,
            actual: 0,
        });
    };

    let length = 1usize << (first >> 6);
    if data.len() < length {
        return Err(QuicError::VarIntTruncated {
            expected: length,
            actual: data.len(),
        });
    }

    let value = data[1..length]
        .iter()
        .fold(u64::from(first & 0x3f), |acc, &b| (acc << 8) | u64::from(b));

    Ok((value, length))
}

/// 把一个字节按 bit 展开成 "11000011" 形式
pub(crate) fn bitfield(value: u8) -> String {
    format!("{:08b}", value)
}

/// QUIC Initial Packet 视图
///
/// ```text
/// Initial Packet {
///   Header Form (1) = 1,
///   Fixed Bit (1) = 1,
///   Long Packet Type (2) = 0,
///   Reserved Bits (2),
///   Packet Number Length (2),
///   Version (32),
///   Destination Connection ID Length (8),
///   Destination Connection ID (0..160),
///   Source Connection ID Length (8),
///   Source Connection ID (0..160),
///   Token Length (i),
///   Token (..),
///   Length (i),
///   Packet Number (8..32),
///   Packet Payload (8..),
/// }
/// ```
///
/// `payload` 是 Length 字段覆盖的全部字节 (Packet Number + 加密数据)，
/// 此时 header protection 还没有移除。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitialPacket<'a> {
    /// 第一个字节 (header form / type / reserved / pn length，仍受 header protection)
    pub connection_info: u8,
    /// 4 字节版本号 (网络字节序)
    pub version: &'a [u8],
    pub dcid: &'a [u8],
    pub scid: &'a [u8],
    pub token: &'a [u8],
    pub payload: &'a [u8],
    /// payload 之前的全部首部字节 (AEAD associated data 的前半部分)
    pub header: &'a [u8],
    valid: bool,
}

impl<'a> InitialPacket<'a> {
    /// 解析 Initial Packet；任何结构错误都返回无效 (空) 视图
    pub fn parse(data: &'a [u8]) -> Self {
        match Self::try_parse(data) {
            Ok(packet) => packet,
            Err(e) => {
                trace!("Not a usable QUIC Initial packet: {}", e);
                Self::default()
            }
        }
    }

    /// 解析 Initial Packet，返回第一个结构错误
    pub fn try_parse(data: &'a [u8]) -> Result<Self> {
        let mut reader = Reader::new(data);

        let connection_info = reader.read_u8()?;
        if connection_info & LONG_PACKET_TYPE_MASK != 0 {
            return Err(QuicError::NotInitialPacket(connection_info));
        }

        let version = reader.read_bytes(4)?;
        let dcid = reader.read_u8_prefixed()?;
        let scid = reader.read_u8_prefixed()?;

        let token_len = reader.read_varint()?;
        let token_len = usize::try_from(token_len).unwrap_or(usize::MAX);
        let token = reader.read_bytes(token_len)?;

        // Length 字段按 2 字节读取并取低 14 bit，相当于只支持 2 字节 VarInt 编码。
        // 1/4/8 字节编码的 Length 会被错误解析 (客户端 Initial 至少 1200 字节，实践中都是 2 字节)。
        let payload_len = (reader.read_u16()? & 0x3fff) as usize;
        let header_len = reader.position();
        let payload = reader.read_bytes(payload_len)?;

        if payload.len() < MIN_PAYLOAD_LEN {
            return Err(QuicError::PayloadTooShort {
                len: payload.len(),
                min: MIN_PAYLOAD_LEN,
            });
        }
        if dcid.is_empty() {
            return Err(QuicError::EmptyDcid);
        }

        debug!(
            "Parsed Initial header: version={:02x?}, dcid_len={}, scid_len={}, token_len={}, payload_len={}",
            version,
            dcid.len(),
            scid.len(),
            token.len(),
            payload.len()
        );

        Ok(Self {
            connection_info,
            version,
            dcid,
            scid,
            token,
            payload,
            header: &data[..header_len],
            valid: true,
        })
    }

    pub fn is_not_empty(&self) -> bool {
        self.valid
    }

    /// 版本号 (主机字节序)；无效视图返回 0
    pub fn version_number(&self) -> u32 {
        <[u8; 4]>::try_from(self.version)
            .map(u32::from_be_bytes)
            .unwrap_or(0)
    }

    /// 输出不需要解密就能看到的字段
    pub fn write_json(&self, record: &mut Map<String, Value>) {
        if !self.valid {
            return;
        }

        record.insert(
            "quic".to_string(),
            json!({
                "connection_info": bitfield(self.connection_info),
                "version": hex::encode(self.version),
                "dcid": hex::encode(self.dcid),
                "scid": hex::encode(self.scid),
                "token": hex::encode(self.token),
                "data": hex::encode(self.payload),
            }),
        );
    }
}

/// QUIC Version Negotiation Packet 视图 (只做最小解析)
///
/// ```text
/// Version Negotiation Packet {
///   Header Form (1) = 1,
///   Unused (7),
///   Version (32) = 0,
///   Destination Connection ID Length (8),
///   Destination Connection ID (0..2040),
///   Source Connection ID Length (8),
///   Source Connection ID (0..2040),
///   Supported Version (32) ...,
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionNegotiation<'a> {
    pub connection_info: u8,
    pub dcid: &'a [u8],
    pub scid: &'a [u8],
    pub version_list: &'a [u8],
    valid: bool,
}

impl<'a> VersionNegotiation<'a> {
    pub fn parse(data: &'a [u8]) -> Self {
        match Self::try_parse(data) {
            Ok(vn) => vn,
            Err(e) => {
                trace!("Not a usable QUIC Version Negotiation packet: {}", e);
                Self::default()
            }
        }
    }

    pub fn try_parse(data: &'a [u8]) -> Result<Self> {
        let mut reader = Reader::new(data);

        let connection_info = reader.read_u8()?;
        if connection_info & HEADER_FORM_LONG == 0 {
            return Err(QuicError::NotLongHeader(connection_info));
        }
        // version 字段固定为 0，这里不检查
        reader.read_bytes(4)?;

        let dcid = reader.read_u8_prefixed()?;
        let scid = reader.read_u8_prefixed()?;
        let version_list = reader.rest();

        if dcid.is_empty() {
            return Err(QuicError::EmptyDcid);
        }
        if version_list.is_empty() {
            return Err(QuicError::EmptyVersionList);
        }

        Ok(Self {
            connection_info,
            dcid,
            scid,
            version_list,
            valid: true,
        })
    }

    pub fn is_not_empty(&self) -> bool {
        self.valid
    }

    /// 支持的版本列表；末尾不足 4 字节的部分被忽略
    pub fn versions(&self) -> impl Iterator<Item = u32> + 'a {
        self.version_list
            .chunks_exact(4)
            .map(|v| u32::from_be_bytes([v[0], v[1], v[2], v[3]]))
    }

    /// 字段直接写入 `record`，由调用方决定放在哪一层
    pub fn write_json(&self, record: &mut Map<String, Value>) {
        if !self.valid {
            return;
        }

        let versions: Vec<Value> = self
            .version_list
            .chunks_exact(4)
            .map(|v| Value::String(hex::encode(v)))
            .collect();

        record.insert(
            "connection_info".to_string(),
            Value::String(bitfield(self.connection_info)),
        );
        record.insert("dcid".to_string(), Value::String(hex::encode(self.dcid)));
        record.insert("scid".to_string(), Value::String(hex::encode(self.scid)));
        record.insert("versions".to_string(), Value::Array(versions));
    }
}
