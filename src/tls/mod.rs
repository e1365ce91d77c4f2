/// TLS 握手解析模块
///
/// ClientHello 解析和指纹构造，TCP 上的 TLS 和解密后的 QUIC Initial 共用。
pub mod client_hello;
pub mod fingerprint;

pub use client_hello::{ClientHello, Extension, HelloError};
pub use fingerprint::{Fingerprint, FingerprintType};
