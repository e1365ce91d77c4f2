//! 单元测试用的数据包构造工具

use crate::quic::crypto::{InitialKeys, InitialSalts};
use ring::aead::quic::{HeaderProtectionKey, AES_128};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM};

/// RFC 9001 Appendix A 使用的 DCID
pub(crate) const DCID: [u8; 8] = [0x83, 0x94, 0xc8, 0xf0, 0x3e, 0x51, 0x57, 0x08];

fn push_u16(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&(value as u16).to_be_bytes());
}

fn push_extension(out: &mut Vec<u8>, ext_type: u16, data: &[u8]) {
    out.extend_from_slice(&ext_type.to_be_bytes());
    push_u16(out, data.len());
    out.extend_from_slice(data);
}

/// ClientHello 的 extensions 部分 (不含 2 字节总长度)
pub(crate) fn sample_extensions(sni: &str) -> Vec<u8> {
    let mut exts = Vec::new();
    // GREASE
    push_extension(&mut exts, 0x1a1a, &[]);

    let mut server_name = Vec::new();
    push_u16(&mut server_name, sni.len() + 3);
    server_name.push(0x00);
    push_u16(&mut server_name, sni.len());
    server_name.extend_from_slice(sni.as_bytes());
    push_extension(&mut exts, 0x0000, &server_name);

    // supported_groups: GREASE, x25519, secp256r1
    push_extension(&mut exts, 0x000a, &[0x00, 0x06, 0x2a, 0x2a, 0x00, 0x1d, 0x00, 0x17]);
    // ALPN: h3
    push_extension(&mut exts, 0x0010, &[0x00, 0x03, 0x02, b'h', b'3']);
    // signature_algorithms
    push_extension(&mut exts, 0x000d, &[0x00, 0x04, 0x04, 0x03, 0x08, 0x04]);
    // supported_versions: TLS 1.3
    push_extension(&mut exts, 0x002b, &[0x02, 0x03, 0x04]);
    // quic_transport_parameters: max_idle_timeout = 30000
    push_extension(&mut exts, 0x0039, &[0x01, 0x04, 0x80, 0x00, 0x75, 0x30]);
    exts
}

/// 完整的 ClientHello handshake 消息 (01 + 3 字节长度 + body)
pub(crate) fn sample_client_hello(sni: &str) -> Vec<u8> {
    let mut body = vec![0x03, 0x03];
    body.extend((0u8..32).collect::<Vec<_>>());
    // QUIC 中 legacy_session_id 为空
    body.push(0x00);
    push_u16(&mut body, 6);
    body.extend_from_slice(&[0x13, 0x01, 0x13, 0x02, 0x13, 0x03]);
    body.extend_from_slice(&[0x01, 0x00]);

    let exts = sample_extensions(sni);
    push_u16(&mut body, exts.len());
    body.extend_from_slice(&exts);

    let mut hello = vec![0x01];
    hello.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    hello.extend_from_slice(&body);
    hello
}

/// CRYPTO frame (offset 0, 2 字节长度) + PADDING，总长度 `total_len`
pub(crate) fn crypto_frame(handshake: &[u8], total_len: usize) -> Vec<u8> {
    let mut frame = vec![0x06, 0x00];
    frame.extend_from_slice(&(0x4000 | handshake.len() as u16).to_be_bytes());
    frame.extend_from_slice(handshake);
    if frame.len() < total_len {
        frame.resize(total_len, 0x00);
    }
    frame
}

/// 构造受保护的客户端 Initial packet
///
/// Packet Number 取 `pn_len` 字节的 0..01，Length 字段用 2 字节 VarInt。
pub(crate) fn build_initial(version: u32, dcid: &[u8], plaintext: &[u8], pn_len: usize) -> Vec<u8> {
    assert!((1..=4).contains(&pn_len));
    let keys = InitialKeys::derive(&InitialSalts::standard(), version, dcid).unwrap();

    let mut pn = vec![0u8; pn_len];
    pn[pn_len - 1] = 0x01;

    let first = 0xc0 | (pn_len as u8 - 1);
    let mut header = vec![first];
    header.extend_from_slice(&version.to_be_bytes());
    header.push(dcid.len() as u8);
    header.extend_from_slice(dcid);
    header.push(0x00); // scid
    header.push(0x00); // token
    let length = pn_len + plaintext.len() + 16;
    header.extend_from_slice(&(0x4000 | length as u16).to_be_bytes());

    let mut aad = header.clone();
    aad.extend_from_slice(&pn);

    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(keys.iv.as_slice());
    for (i, b) in pn.iter().enumerate() {
        nonce[12 - pn_len + i] ^= b;
    }

    let key = LessSafeKey::new(UnboundKey::new(&AES_128_GCM, keys.key.as_slice()).unwrap());
    let mut sealed = plaintext.to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce),
        Aad::from(aad.as_slice()),
        &mut sealed,
    )
    .unwrap();

    let mut payload = pn.clone();
    payload.extend_from_slice(&sealed);

    let hp = HeaderProtectionKey::new(&AES_128, keys.hp.as_slice()).unwrap();
    let mask = hp.new_mask(&payload[4..20]).unwrap();
    header[0] ^= mask[0] & 0x0f;
    for i in 0..pn_len {
        payload[i] ^= mask[1 + i];
    }

    header.extend_from_slice(&payload);
    header
}
