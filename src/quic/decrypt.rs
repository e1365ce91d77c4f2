//! QUIC Initial Packet 解密
//!
//! 参考 RFC 9001 Section 5.3: AEAD Usage
//! 参考 RFC 9001 Section 5.4: Header Protection
//!
//! 流程：派生密钥 → 移除 header protection → AES-128-GCM 解密 → 明文检查

use crate::quic::buffer::{PlaintextBuf, PLAINTEXT_CAPACITY};
use crate::quic::crypto::{InitialKeys, InitialSalts, IV_LEN};
use crate::quic::error::{QuicError, Result};
use crate::quic::header::{remove_header_protection, unmask_nonce, UnprotectedHeader};
use crate::quic::parser::InitialPacket;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM};
use tracing::trace;

/// AES-128-GCM Auth Tag 长度
pub const TAG_LEN: usize = 16;

/// 明文中 ClientHello legacy_version 的偏移
///
/// ```text
/// 06          CRYPTO frame type
/// 00          offset
/// 4x xx       length (2 字节 VarInt)
/// 01          HandshakeType client_hello
/// xx xx xx    handshake length
/// 03 03       legacy_version
/// ```
pub const CLIENT_HELLO_OFFSET: usize = 8;

/// 明文中 HandshakeType 的偏移
const HANDSHAKE_TYPE_OFFSET: usize = 4;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
const LEGACY_VERSION: u16 = 0x0303;

/// 一次成功的 Initial 解密结果
///
/// 所有数据都归自己所有，不引用输入的数据包。
#[derive(Debug, Clone)]
pub struct InitialDecryptor {
    keys: InitialKeys,
    header: UnprotectedHeader,
    nonce: [u8; IV_LEN],
    plaintext: PlaintextBuf,
}

impl InitialDecryptor {
    /// 解密一个已经通过结构检查的 Initial Packet
    ///
    /// AEAD 的 associated data 是去掉保护后的首部
    /// (第一个字节和 Packet Number 都已还原)，tag 覆盖 Length 字段限定的全部 payload。
    /// 解密后的明文最多保留 `PLAINTEXT_CAPACITY` 字节。
    ///
    /// # 参数
    /// - `packet`: 解析好的 Initial Packet 视图
    /// - `salts`: 版本号 → Salt 映射表
    pub fn decrypt(packet: &InitialPacket<'_>, salts: &InitialSalts) -> Result<Self> {
        if !packet.is_not_empty() {
            return Err(QuicError::DecryptionFailed(
                "invalid Initial packet".to_string(),
            ));
        }

        let keys = InitialKeys::derive(salts, packet.version_number(), packet.dcid)?;

        let header =
            remove_header_protection(packet.connection_info, packet.payload, keys.hp.as_slice())?;
        let nonce = unmask_nonce(
            keys.iv.as_slice(),
            &header.mask,
            packet.payload,
            header.pn_length,
        )?;

        // AAD = header (up to and including Packet Number) after removing header protection
        let mut aad = Vec::with_capacity(packet.header.len() + header.pn_length);
        aad.extend_from_slice(packet.header);
        if let Some(first) = aad.first_mut() {
            *first = header.first_byte;
        }
        aad.extend_from_slice(header.packet_number_bytes());

        let ciphertext = &packet.payload[header.pn_length..];
        if ciphertext.len() < TAG_LEN {
            return Err(QuicError::DecryptionFailed(format!(
                "Encrypted data too short: {} < {}",
                ciphertext.len(),
                TAG_LEN
            )));
        }

        let unbound_key = UnboundKey::new(&AES_128_GCM, keys.key.as_slice()).map_err(|e| {
            QuicError::DecryptionFailed(format!("Failed to create AEAD key: {:?}", e))
        })?;
        let aead_key = LessSafeKey::new(unbound_key);

        let mut in_out = ciphertext.to_vec();
        let opened = aead_key
            .open_in_place(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(aad.as_slice()),
                &mut in_out,
            )
            .map_err(|e| QuicError::DecryptionFailed(format!("AEAD open: {:?}", e)))?;

        let kept = &opened[..opened.len().min(PLAINTEXT_CAPACITY)];
        let plaintext = PlaintextBuf::from_slice(kept)?;
        check_client_hello(plaintext.as_slice())?;

        trace!(
            "Initial decrypted: pn={:02x?}, plaintext_len={} (kept {})",
            header.packet_number_bytes(),
            opened.len(),
            plaintext.len()
        );

        Ok(Self {
            keys,
            header,
            nonce,
            plaintext,
        })
    }

    pub fn keys(&self) -> &InitialKeys {
        &self.keys
    }

    pub fn nonce(&self) -> &[u8; IV_LEN] {
        &self.nonce
    }

    pub fn pn_length(&self) -> usize {
        self.header.pn_length
    }

    /// 去掉保护后的 Packet Number 字节 (未解码)
    pub fn packet_number_bytes(&self) -> &[u8] {
        self.header.packet_number_bytes()
    }

    /// 去掉保护后的第一个字节
    pub fn first_byte(&self) -> u8 {
        self.header.first_byte
    }

    pub fn plaintext(&self) -> &[u8] {
        self.plaintext.as_slice()
    }

    /// 从 legacy_version 开始的 ClientHello 字节
    pub fn client_hello_bytes(&self) -> &[u8] {
        &self.plaintext.as_slice()[CLIENT_HELLO_OFFSET..]
    }
}

/// 解密成功后的内容检查：
/// offset 4 是 ClientHello handshake type，offset 8-9 是 legacy_version 03 03
fn check_client_hello(plaintext: &[u8]) -> Result<()> {
    if plaintext.len() < CLIENT_HELLO_OFFSET + 2 {
        return Err(QuicError::PacketTooShort {
            expected: CLIENT_HELLO_OFFSET + 2,
            actual: plaintext.len(),
        });
    }

    let handshake_type = plaintext[HANDSHAKE_TYPE_OFFSET];
    let version = u16::from_be_bytes([
        plaintext[CLIENT_HELLO_OFFSET],
        plaintext[CLIENT_HELLO_OFFSET + 1],
    ]);
    if handshake_type != HANDSHAKE_CLIENT_HELLO || version != LEGACY_VERSION {
        return Err(QuicError::NotClientHello {
            handshake_type,
            version,
        });
    }
    Ok(())
}
