//! 基于 mask/value 表的协议识别
//!
//! 每个传输层 (TCP / UDP) 各持有一个 `ProtocolIdentifier`，
//! 按插入顺序逐条匹配，第一条命中的规则决定消息类型。

use crate::identify::matcher::MaskAndValue;
use std::fmt;

/// 参与匹配的前缀长度
pub const MATCH_LEN: usize = 8;

/// TCP 载荷的消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TcpMsgType {
    #[default]
    Unknown = 0,
    HttpRequest,
    HttpResponse,
    TlsClientHello,
    TlsServerHello,
    Ssh,
    SshKex,
    SmtpClient,
    SmtpServer,
}

impl TcpMsgType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::HttpRequest => "http_request",
            Self::HttpResponse => "http_response",
            Self::TlsClientHello => "tls_client_hello",
            Self::TlsServerHello => "tls_server_hello",
            Self::Ssh => "ssh",
            Self::SshKex => "ssh_kex",
            Self::SmtpClient => "smtp_client",
            Self::SmtpServer => "smtp_server",
        }
    }
}

/// UDP 载荷的消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum UdpMsgType {
    #[default]
    Unknown = 0,
    Dns,
    Dhcp,
    DtlsHandshake,
    Wireguard,
    Quic,
    QuicVersionNegotiation,
}

impl UdpMsgType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Dns => "dns",
            Self::Dhcp => "dhcp",
            Self::DtlsHandshake => "dtls_handshake",
            Self::Wireguard => "wireguard",
            Self::Quic => "quic",
            Self::QuicVersionNegotiation => "quic_version_negotiation",
        }
    }
}

impl fmt::Display for TcpMsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UdpMsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条匹配规则: matcher + 命中时返回的消息类型
#[derive(Debug, Clone, Copy)]
pub struct ProtocolEntry<T> {
    pub matcher: MaskAndValue<MATCH_LEN>,
    pub msg_type: T,
}

/// 有序的匹配规则表
///
/// 只在配置阶段通过 `add_protocol` 修改；投入使用后只读，
/// 可以在多个线程间共享 (`&ProtocolIdentifier`)。
#[derive(Debug, Clone)]
pub struct ProtocolIdentifier<T> {
    entries: Vec<ProtocolEntry<T>>,
}

impl<T> Default for ProtocolIdentifier<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T: Copy + Default> ProtocolIdentifier<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条规则；插入顺序即匹配优先级
    pub fn add_protocol(&mut self, matcher: MaskAndValue<MATCH_LEN>, msg_type: T) {
        self.entries.push(ProtocolEntry { matcher, msg_type });
    }

    /// 识别数据的消息类型
    ///
    /// 不足 8 字节时直接返回 Unknown (`T::default()`)，不做部分匹配。
    pub fn classify(&self, data: &[u8]) -> T {
        let Some(prefix) = data
            .get(..MATCH_LEN)
            .and_then(|p| <&[u8; MATCH_LEN]>::try_from(p).ok())
        else {
            return T::default();
        };

        self.entries
            .iter()
            .find(|entry| entry.matcher.matches(prefix))
            .map(|entry| entry.msg_type)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ProtocolEntry<T>] {
        &self.entries
    }
}
