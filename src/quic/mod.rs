/// QUIC Initial 解析和解密模块
///
/// 客户端 Initial packet 的密钥只依赖 DCID 和公开的 salt，
/// 被动观察者也能解密出其中的 TLS ClientHello。
///
/// 参考 RFC 9000 (QUIC Transport) 和 RFC 9001 (Using TLS to Secure QUIC)。
pub mod buffer;
pub mod crypto;
pub mod decrypt;
pub mod error;
pub mod header;
pub mod message;
pub mod parser;

#[cfg(test)]
pub(crate) mod test_util;

pub use buffer::{BoundedBuf, PlaintextBuf, SecretBuf};
pub use crypto::{InitialKeys, InitialSalts};
pub use decrypt::InitialDecryptor;
pub use error::{QuicError, Result};
pub use header::{remove_header_protection, unmask_nonce, UnprotectedHeader};
pub use message::QuicInitialMessage;
pub use parser::{parse_varint, InitialPacket, VersionNegotiation};
