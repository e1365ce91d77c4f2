//! QUIC Header Protection 移除
//!
//! 参考 RFC 9001 Section 5.4: Header Protection

use crate::quic::crypto::IV_LEN;
use crate::quic::error::{QuicError, Result};
use ring::aead::quic::{HeaderProtectionKey, AES_128};
use tracing::trace;

/// sample 相对 Packet Number 字段起点的偏移
pub const SAMPLE_OFFSET: usize = 4;
/// sample 长度 (一个 AES block)
pub const SAMPLE_LEN: usize = 16;

/// header protection mask 长度
pub const MASK_LEN: usize = 5;

/// 移除 header protection 之后的首部信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnprotectedHeader {
    /// 去掉保护后的第一个字节
    pub first_byte: u8,
    /// Packet Number 长度 (1-4)
    pub pn_length: usize,
    /// 去掉保护后的 Packet Number 字节 (只有前 `pn_length` 个有效)
    pub pn_bytes: [u8; 4],
    pub mask: [u8; MASK_LEN],
}

impl UnprotectedHeader {
    pub fn packet_number_bytes(&self) -> &[u8] {
        &self.pn_bytes[..self.pn_length]
    }
}

/// 移除 QUIC Initial Packet 的 Header Protection
///
/// RFC 9001 Section 5.4.2:
/// ```text
/// sample_offset = pn_offset + 4
/// sample = packet[sample_offset..sample_offset+16]
/// mask = AES-ECB(hp_key, sample)
/// ```
///
/// 不修改输入数据，返回去掉保护后的 first byte 和 packet number。
///
/// # 参数
/// - `connection_info`: 受保护的第一个字节
/// - `payload`: Length 字段覆盖的字节 (从 Packet Number 开始)
/// - `hp`: Header Protection 密钥
pub fn remove_header_protection(
    connection_info: u8,
    payload: &[u8],
    hp: &[u8],
) -> Result<UnprotectedHeader> {
    let sample_end = SAMPLE_OFFSET + SAMPLE_LEN;
    if payload.len() < sample_end {
        return Err(QuicError::PacketTooShort {
            expected: sample_end,
            actual: payload.len(),
        });
    }
    let sample = &payload[SAMPLE_OFFSET..sample_end];

    let hp_key = HeaderProtectionKey::new(&AES_128, hp).map_err(|e| {
        QuicError::HeaderProtectionFailed(format!("Failed to create HP key: {:?}", e))
    })?;
    let mask = hp_key.new_mask(sample).map_err(|e| {
        QuicError::HeaderProtectionFailed(format!("Failed to generate mask: {:?}", e))
    })?;

    // Long header 只保护低 4 bit
    let first_byte = connection_info ^ (mask[0] & 0x0f);
    let pn_length = ((first_byte & 0x03) + 1) as usize;

    let mut pn_bytes = [0u8; 4];
    for (i, byte) in pn_bytes.iter_mut().take(pn_length).enumerate() {
        *byte = payload[i] ^ mask[1 + i];
    }

    trace!(
        "Header protection removed: first_byte={:#04x}, pn_length={}, mask={:02x?}",
        first_byte,
        pn_length,
        mask
    );

    Ok(UnprotectedHeader {
        first_byte,
        pn_length,
        pn_bytes,
        mask,
    })
}

/// 构造 AEAD nonce
///
/// IV 的最后 `pn_length` 个字节依次异或 `mask[1..]` 和受保护的 Packet Number 字节，
/// 等价于 RFC 9001 Section 5.3 中的 `iv XOR packet_number`。
/// 返回新的 nonce，不修改传入的 IV。
///
/// # 参数
/// - `iv`: 基础 IV (12 bytes)
/// - `mask`: header protection mask
/// - `protected_pn`: 数据包中受保护的 Packet Number 字节 (至少 `pn_length` 个)
/// - `pn_length`: Packet Number 长度 (1-4)
pub fn unmask_nonce(
    iv: &[u8],
    mask: &[u8; MASK_LEN],
    protected_pn: &[u8],
    pn_length: usize,
) -> Result<[u8; IV_LEN]> {
    let mut nonce: [u8; IV_LEN] = iv.try_into().map_err(|_| {
        QuicError::DecryptionFailed(format!(
            "Invalid IV length: {} (expected {})",
            iv.len(),
            IV_LEN
        ))
    })?;

    if !(1..=4).contains(&pn_length) || protected_pn.len() < pn_length {
        return Err(QuicError::HeaderProtectionFailed(format!(
            "Invalid packet number length: {}",
            pn_length
        )));
    }

    let offset = IV_LEN - pn_length;
    for i in 0..pn_length {
        nonce[offset + i] ^= mask[1 + i] ^ protected_pn[i];
    }

    Ok(nonce)
}
