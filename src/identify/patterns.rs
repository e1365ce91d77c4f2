//! 各协议首部的固定 mask/value 规则
//!
//! 每条规则只看载荷的前 8 个字节。

use crate::identify::matcher::MaskAndValue;

type Matcher = MaskAndValue<8>;

// ---------------------------------------------------------------------------
// TCP
// ---------------------------------------------------------------------------

/// TLS record: Handshake(0x16), 版本 0x0300-0x0303, handshake type = ClientHello(0x01)
pub const TLS_CLIENT_HELLO: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xfc, 0x00, 0x00, 0xff, 0x00, 0x00],
    [0x16, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00],
);

/// 同上，handshake type = ServerHello(0x02)
pub const TLS_SERVER_HELLO: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xfc, 0x00, 0x00, 0xff, 0x00, 0x00],
    [0x16, 0x03, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00],
);

pub const HTTP_GET: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00],
    [b'G', b'E', b'T', b' ', 0x00, 0x00, 0x00, 0x00],
);

pub const HTTP_POST: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00],
    [b'P', b'O', b'S', b'T', b' ', 0x00, 0x00, 0x00],
);

pub const HTTP_CONNECT: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
    [b'C', b'O', b'N', b'N', b'E', b'C', b'T', b' '],
);

pub const HTTP_PUT: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00],
    [b'P', b'U', b'T', b' ', 0x00, 0x00, 0x00, 0x00],
);

pub const HTTP_HEAD: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00],
    [b'H', b'E', b'A', b'D', b' ', 0x00, 0x00, 0x00],
);

/// "HTTP/1." 状态行
pub const HTTP_RESPONSE: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00],
    [b'H', b'T', b'T', b'P', b'/', b'1', b'.', 0x00],
);

/// 版本交换字符串 "SSH-"
pub const SSH_INIT: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00],
    [b'S', b'S', b'H', b'-', 0x00, 0x00, 0x00, 0x00],
);

/// SSH binary packet: packet_length < 4096, msg code = SSH_MSG_KEXINIT(20)
pub const SSH_KEX_INIT: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xf0, 0x00, 0x00, 0xff, 0x00, 0x00],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x14, 0x00, 0x00],
);

pub const SMTP_CLIENT: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00],
    [b'E', b'H', b'L', b'O', b' ', 0x00, 0x00, 0x00],
);

/// EHLO 的多行应答 "250-"
pub const SMTP_SERVER: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00],
    [b'2', b'5', b'0', b'-', 0x00, 0x00, 0x00, 0x00],
);

// ---------------------------------------------------------------------------
// UDP
// ---------------------------------------------------------------------------

/// DNS: opcode = QUERY，QDCOUNT = 1 (查询和应答都匹配)
pub const DNS: Matcher = MaskAndValue::new(
    [0x00, 0x00, 0x78, 0x00, 0xff, 0xff, 0x00, 0x00],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00],
);

/// DHCP BOOTREQUEST, htype = Ethernet, hlen = 6, hops = 0
pub const DHCP_REQUEST: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00],
    [0x01, 0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00],
);

/// DTLS handshake record (0xfeff / 0xfefd / 0xfefc)，epoch 0
pub const DTLS_HANDSHAKE: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xf8, 0xff, 0xff, 0x00, 0x00, 0x00],
    [0x16, 0xfe, 0xf8, 0x00, 0x00, 0x00, 0x00, 0x00],
);

/// WireGuard handshake initiation: type = 1，3 字节保留位为 0
pub const WIREGUARD_INIT: Matcher = MaskAndValue::new(
    [0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00],
    [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
);

/// QUIC long header, packet type = Initial (0b1100xxxx)
///
/// version = 0 是 Version Negotiation，由 `QUIC_VERSION_NEGOTIATION` 排除在外。
pub const QUIC_INITIAL: Matcher = MaskAndValue::new(
    [0xf0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0xc0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
);

/// long header + version 0
pub const QUIC_VERSION_NEGOTIATION: Matcher = MaskAndValue::new(
    [0x80, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00],
    [0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
);

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(data: &[u8]) -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(&data[..8]);
        out
    }

    #[test]
    fn test_tls_hello_matchers() {
        let client_hello = [0x16, 0x03, 0x01, 0x01, 0x34, 0x01, 0x00, 0x01];
        let server_hello = [0x16, 0x03, 0x03, 0x00, 0x5a, 0x02, 0x00, 0x00];
        assert!(TLS_CLIENT_HELLO.matches(&client_hello));
        assert!(!TLS_SERVER_HELLO.matches(&client_hello));
        assert!(TLS_SERVER_HELLO.matches(&server_hello));
        // 非 handshake record
        assert!(!TLS_CLIENT_HELLO.matches(&[0x17, 0x03, 0x03, 0, 0, 0x01, 0, 0]));
    }

    #[test]
    fn test_http_matchers() {
        assert!(HTTP_GET.matches(&prefix(b"GET /index.html HTTP/1.1")));
        assert!(HTTP_POST.matches(&prefix(b"POST /api HTTP/1.1")));
        assert!(HTTP_CONNECT.matches(&prefix(b"CONNECT example.com:443 HTTP/1.1")));
        assert!(HTTP_PUT.matches(&prefix(b"PUT /x HTTP/1.1")));
        assert!(HTTP_HEAD.matches(&prefix(b"HEAD / HTTP/1.1")));
        assert!(HTTP_RESPONSE.matches(&prefix(b"HTTP/1.1 200 OK")));
        assert!(!HTTP_GET.matches(&prefix(b"GETX / HTTP/1.1")));
    }

    #[test]
    fn test_ssh_and_smtp_matchers() {
        assert!(SSH_INIT.matches(&prefix(b"SSH-2.0-OpenSSH_8.9")));
        assert!(SSH_KEX_INIT.matches(&[0x00, 0x00, 0x05, 0xdc, 0x06, 0x14, 0x8f, 0x1e]));
        assert!(!SSH_KEX_INIT.matches(&[0x00, 0x01, 0x05, 0xdc, 0x06, 0x14, 0x8f, 0x1e]));
        assert!(SMTP_CLIENT.matches(&prefix(b"EHLO mail.example.com")));
        assert!(SMTP_SERVER.matches(&prefix(b"250-smtp.example.com")));
    }

    #[test]
    fn test_udp_matchers() {
        // DNS 查询: id=0x1234, flags=0x0100, qdcount=1
        assert!(DNS.matches(&[0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00]));
        // DNS 应答: flags=0x8180
        assert!(DNS.matches(&[0x12, 0x34, 0x81, 0x80, 0x00, 0x01, 0x00, 0x01]));
        // opcode = UPDATE(5)
        assert!(!DNS.matches(&[0x12, 0x34, 0x28, 0x00, 0x00, 0x01, 0x00, 0x00]));

        assert!(DHCP_REQUEST.matches(&[0x01, 0x01, 0x06, 0x00, 0x39, 0x03, 0xf3, 0x26]));
        assert!(DTLS_HANDSHAKE.matches(&[0x16, 0xfe, 0xfd, 0x00, 0x00, 0x00, 0x00, 0x00]));
        assert!(DTLS_HANDSHAKE.matches(&[0x16, 0xfe, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00]));
        assert!(!DTLS_HANDSHAKE.matches(&[0x16, 0xfe, 0xfd, 0x00, 0x01, 0x00, 0x00, 0x00]));
        assert!(WIREGUARD_INIT.matches(&[0x01, 0x00, 0x00, 0x00, 0xa1, 0xb2, 0xc3, 0xd4]));
    }

    #[test]
    fn test_quic_matchers() {
        let initial = [0xc3, 0x00, 0x00, 0x00, 0x01, 0x08, 0x83, 0x94];
        let handshake = [0xe1, 0x00, 0x00, 0x00, 0x01, 0x08, 0x83, 0x94];
        let vn = [0x80, 0x00, 0x00, 0x00, 0x00, 0x08, 0x83, 0x94];
        assert!(QUIC_INITIAL.matches(&initial));
        assert!(!QUIC_INITIAL.matches(&handshake));
        assert!(!QUIC_VERSION_NEGOTIATION.matches(&initial));
        assert!(QUIC_VERSION_NEGOTIATION.matches(&vn));
    }
}
