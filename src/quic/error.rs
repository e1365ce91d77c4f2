//! QUIC Initial 解析 / 解密错误类型
use thiserror::Error;

/// QUIC Initial 处理过程中可能出现的错误
///
/// 这些错误只在模块内部和 `try_*` 接口上出现；
/// 顶层对象 (`QuicInitialMessage`) 把它们折叠成 "无法解密" 状态。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuicError {
    /// 数据包太短，无法解析
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    /// 不是 QUIC Initial Packet (long packet type 位非零)
    #[error("Not a QUIC Initial packet (first byte: {0:#04x})")]
    NotInitialPacket(u8),

    /// 不是 long header
    #[error("Not a QUIC long header packet (first byte: {0:#04x})")]
    NotLongHeader(u8),

    /// DCID 为空
    #[error("Empty destination connection ID")]
    EmptyDcid,

    /// Payload 太短，无法采样 header protection
    #[error("Payload too short: {len} bytes (minimum {min})")]
    PayloadTooShort { len: usize, min: usize },

    /// Version Negotiation 中没有版本列表
    #[error("Empty version list")]
    EmptyVersionList,

    /// VarInt 解码失败
    #[error("VarInt truncated: expected {expected} bytes, got {actual}")]
    VarIntTruncated { expected: usize, actual: usize },

    /// 不支持的 QUIC 版本 (没有对应的 Initial Salt)
    #[error("Unsupported QUIC version: {:#010x}", version)]
    UnsupportedVersion { version: u32 },

    /// 定长缓冲区容量不足
    #[error("Buffer capacity exceeded: capacity {capacity}, requested {requested}")]
    CapacityExceeded { capacity: usize, requested: usize },

    /// 密钥派生失败
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// Header Protection 移除失败
    #[error("Header protection removal failed: {0}")]
    HeaderProtectionFailed(String),

    /// 解密失败
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// 解密成功但内容不像 ClientHello
    #[error("Plaintext is not a ClientHello (handshake type {handshake_type:#04x}, version {version:#06x})")]
    NotClientHello { handshake_type: u8, version: u16 },
}

pub type Result<T> = std::result::Result<T, QuicError>;
