//! 协议选择策略
//!
//! 根据配置字符串 (例如 `"tls,http"`) 构建 TCP / UDP 两个识别器。
//! 构建完成后只读，可在多个线程间共享。

use crate::identify::error::{Result, SelectorError};
use crate::identify::identifier::{ProtocolIdentifier, TcpMsgType, UdpMsgType};
use crate::identify::patterns;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// 配置字符串为空 (None) 时的默认值
pub const DEFAULT_SELECTION: &str = "all";

/// 配置字符串可用的协议名
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolName {
    All,
    None,
    Dhcp,
    Dns,
    Dtls,
    Http,
    Ssh,
    Tcp,
    TcpMessage,
    Tls,
    Wireguard,
    Quic,
    Smtp,
}

impl ProtocolName {
    pub const ALL: [ProtocolName; 13] = [
        Self::All,
        Self::None,
        Self::Dhcp,
        Self::Dns,
        Self::Dtls,
        Self::Http,
        Self::Ssh,
        Self::Tcp,
        Self::TcpMessage,
        Self::Tls,
        Self::Wireguard,
        Self::Quic,
        Self::Smtp,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::None => "none",
            Self::Dhcp => "dhcp",
            Self::Dns => "dns",
            Self::Dtls => "dtls",
            Self::Http => "http",
            Self::Ssh => "ssh",
            Self::Tcp => "tcp",
            Self::TcpMessage => "tcp.message",
            Self::Tls => "tls",
            Self::Wireguard => "wireguard",
            Self::Quic => "quic",
            Self::Smtp => "smtp",
        }
    }
}

impl fmt::Display for ProtocolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolName {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| SelectorError::UnknownProtocol(s.trim().to_string()))
    }
}

/// 解析后的协议开关集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolSet {
    enabled: BTreeSet<ProtocolName>,
}

impl ProtocolSet {
    /// 解析逗号分隔的协议名列表
    ///
    /// 空白和空项被忽略；一个协议名都没有或者出现未知协议名时报错。
    /// `none` 会关闭所有协议 (包括同一字符串中列出的其他协议)。
    pub fn parse(config: &str) -> Result<Self> {
        let mut enabled = BTreeSet::new();
        let mut skipped = 0usize;
        for item in config.split(',') {
            if item.trim().is_empty() {
                skipped += 1;
                continue;
            }
            enabled.insert(item.parse::<ProtocolName>()?);
        }

        if enabled.is_empty() {
            return Err(SelectorError::Empty);
        }

        if skipped > 0 {
            warn!(
                "Skipped {} empty item(s) in protocol selection '{}'",
                skipped, config
            );
        }

        if enabled.contains(&ProtocolName::None) {
            if enabled.len() > 1 {
                warn!(
                    "'none' in protocol selection '{}' disables the other listed protocols",
                    config
                );
            }
            enabled.clear();
        }

        Ok(Self { enabled })
    }

    pub fn contains(&self, name: ProtocolName) -> bool {
        self.enabled.contains(&name)
    }

    /// 显式列出或者被 `all` 覆盖
    pub fn selects(&self, name: ProtocolName) -> bool {
        self.contains(name) || self.contains(ProtocolName::All)
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProtocolName> + '_ {
        self.enabled.iter().copied()
    }
}

/// TCP / UDP 协议选择器
#[derive(Debug, Clone)]
pub struct TrafficSelector {
    tcp: ProtocolIdentifier<TcpMsgType>,
    udp: ProtocolIdentifier<UdpMsgType>,
    tcp_syn: bool,
    tcp_message: bool,
}

impl TrafficSelector {
    /// 从配置字符串构建
    ///
    /// `None` 等价于 `"all"`。无法解析的字符串直接报错。
    pub fn new(config: Option<&str>) -> Result<Self> {
        let config = config.unwrap_or(DEFAULT_SELECTION);
        let protocols = ProtocolSet::parse(config)?;
        let selector = Self::from_protocols(&protocols);

        info!(
            "Traffic selector built from '{}': {} TCP matchers, {} UDP matchers",
            config,
            selector.tcp.len(),
            selector.udp.len()
        );

        Ok(selector)
    }

    pub fn from_protocols(protocols: &ProtocolSet) -> Self {
        let mut tcp = ProtocolIdentifier::new();
        let mut udp = ProtocolIdentifier::new();

        if protocols.selects(ProtocolName::Tls) {
            tcp.add_protocol(patterns::TLS_CLIENT_HELLO, TcpMsgType::TlsClientHello);
            tcp.add_protocol(patterns::TLS_SERVER_HELLO, TcpMsgType::TlsServerHello);
        }
        if protocols.selects(ProtocolName::Http) {
            tcp.add_protocol(patterns::HTTP_GET, TcpMsgType::HttpRequest);
            tcp.add_protocol(patterns::HTTP_POST, TcpMsgType::HttpRequest);
            tcp.add_protocol(patterns::HTTP_CONNECT, TcpMsgType::HttpRequest);
            tcp.add_protocol(patterns::HTTP_PUT, TcpMsgType::HttpRequest);
            tcp.add_protocol(patterns::HTTP_HEAD, TcpMsgType::HttpRequest);
            tcp.add_protocol(patterns::HTTP_RESPONSE, TcpMsgType::HttpResponse);
        }
        if protocols.selects(ProtocolName::Ssh) {
            tcp.add_protocol(patterns::SSH_INIT, TcpMsgType::Ssh);
            tcp.add_protocol(patterns::SSH_KEX_INIT, TcpMsgType::SshKex);
        }
        if protocols.selects(ProtocolName::Smtp) {
            tcp.add_protocol(patterns::SMTP_CLIENT, TcpMsgType::SmtpClient);
            tcp.add_protocol(patterns::SMTP_SERVER, TcpMsgType::SmtpServer);
        }

        // UDP 覆盖并不完整，只在显式列出时注册，`all` 不包含它们
        if protocols.contains(ProtocolName::Dns) {
            udp.add_protocol(patterns::DNS, UdpMsgType::Dns);
        }
        if protocols.contains(ProtocolName::Dhcp) {
            udp.add_protocol(patterns::DHCP_REQUEST, UdpMsgType::Dhcp);
        }
        if protocols.contains(ProtocolName::Dtls) {
            udp.add_protocol(patterns::DTLS_HANDSHAKE, UdpMsgType::DtlsHandshake);
        }
        if protocols.contains(ProtocolName::Wireguard) {
            udp.add_protocol(patterns::WIREGUARD_INIT, UdpMsgType::Wireguard);
        }
        if protocols.contains(ProtocolName::Quic) {
            // version 0 必须先于 Initial 规则匹配
            udp.add_protocol(
                patterns::QUIC_VERSION_NEGOTIATION,
                UdpMsgType::QuicVersionNegotiation,
            );
            udp.add_protocol(patterns::QUIC_INITIAL, UdpMsgType::Quic);
        }

        let tcp_syn = protocols.contains(ProtocolName::Tcp);
        let tcp_message = protocols.contains(ProtocolName::TcpMessage);

        debug!(
            "Selected protocols: {:?} (tcp_syn={}, tcp_message={})",
            protocols.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            tcp_syn,
            tcp_message
        );

        Self {
            tcp,
            udp,
            tcp_syn,
            tcp_message,
        }
    }

    /// 识别 TCP 载荷
    pub fn classify_tcp(&self, data: &[u8]) -> TcpMsgType {
        self.tcp.classify(data)
    }

    /// 识别 UDP 载荷
    pub fn classify_udp(&self, data: &[u8]) -> UdpMsgType {
        self.udp.classify(data)
    }

    /// 是否需要上报 TCP SYN
    pub fn tcp_syn(&self) -> bool {
        self.tcp_syn
    }

    /// 是否需要上报无法识别的 TCP 消息
    pub fn tcp_message(&self) -> bool {
        self.tcp_message
    }

    pub fn tcp_identifier(&self) -> &ProtocolIdentifier<TcpMsgType> {
        &self.tcp
    }

    pub fn udp_identifier(&self) -> &ProtocolIdentifier<UdpMsgType> {
        &self.udp
    }
}
