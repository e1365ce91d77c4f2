//! QUIC Initial 密钥派生
//!
//! 参考 RFC 9001 Section 5.2: Initial Secrets
//! 参考 RFC 8446 Section 7.1: Key Schedule (HKDF-Expand-Label)

use crate::quic::buffer::SecretBuf;
use crate::quic::error::{QuicError, Result};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Initial Salt 长度
pub const SALT_LEN: usize = 20;

/// AES-128-GCM key 长度
pub const KEY_LEN: usize = 16;
/// AEAD nonce / IV 长度
pub const IV_LEN: usize = 12;
/// Header Protection key 长度
pub const HP_LEN: usize = 16;
/// client_initial_secret 长度 (SHA-256 摘要长度)
pub const SECRET_LEN: usize = 32;

const LABEL_CLIENT_IN: &[u8] = b"client in";
const LABEL_QUIC_KEY: &[u8] = b"quic key";
const LABEL_QUIC_IV: &[u8] = b"quic iv";
const LABEL_QUIC_HP: &[u8] = b"quic hp";

/// draft-ietf-quic-tls-22
pub const SALT_DRAFT_22: [u8; SALT_LEN] = [
    0x7f, 0xbc, 0xdb, 0x0e, 0x7c, 0x66, 0xbb, 0xe9, 0x19, 0x3a, 0x96, 0xcd, 0x21, 0x51, 0x9e,
    0xbd, 0x7a, 0x02, 0x64, 0x4a,
];

/// draft-ietf-quic-tls-23 .. 28
pub const SALT_DRAFT_23_28: [u8; SALT_LEN] = [
    0xc3, 0xee, 0xf7, 0x12, 0xc7, 0x2e, 0xbb, 0x5a, 0x11, 0xa7, 0xd2, 0x43, 0x2b, 0xb4, 0x63,
    0x65, 0xbe, 0xf9, 0xf5, 0x02,
];

/// draft-ietf-quic-tls-29 .. 32
pub const SALT_DRAFT_29_32: [u8; SALT_LEN] = [
    0xaf, 0xbf, 0xec, 0x28, 0x99, 0x93, 0xd2, 0x4c, 0x9e, 0x97, 0x86, 0xf1, 0x9c, 0x61, 0x11,
    0xe0, 0x43, 0x90, 0xa8, 0x99,
];

/// draft-ietf-quic-tls-33, 34 和 QUIC v1 (RFC 9001 Section 5.2)
pub const SALT_V1: [u8; SALT_LEN] = [
    0x38, 0x76, 0x2c, 0xf7, 0xf5, 0x59, 0x34, 0xb3, 0x4d, 0x17, 0x9a, 0xe6, 0xa4, 0xc8, 0x0c,
    0xad, 0xcc, 0xbb, 0x7f, 0x0a,
];

/// QUIC v1 版本号
pub const QUIC_VERSION_1: u32 = 0x0000_0001;

/// draft 版本号: 0xff000000 | draft 编号
pub const fn draft_version(draft: u32) -> u32 {
    0xff00_0000 | draft
}

/// 版本号 → Initial Salt 映射表
///
/// 构造后不再修改，可以在多个线程之间共享 (`&InitialSalts` / `Arc<InitialSalts>`)。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialSalts {
    table: HashMap<u32, [u8; SALT_LEN]>,
}

impl InitialSalts {
    /// 空表 (所有版本都不支持)
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// draft-22 到 draft-34 以及 v1
    pub fn standard() -> Self {
        let mut salts = Self::empty();
        salts.insert(draft_version(22), SALT_DRAFT_22);
        for draft in 23..=28 {
            salts.insert(draft_version(draft), SALT_DRAFT_23_28);
        }
        for draft in 29..=32 {
            salts.insert(draft_version(draft), SALT_DRAFT_29_32);
        }
        for draft in 33..=34 {
            salts.insert(draft_version(draft), SALT_V1);
        }
        salts.insert(QUIC_VERSION_1, SALT_V1);
        salts
    }

    pub fn insert(&mut self, version: u32, salt: [u8; SALT_LEN]) {
        self.table.insert(version, salt);
    }

    pub fn get(&self, version: u32) -> Option<&[u8; SALT_LEN]> {
        self.table.get(&version)
    }

    pub fn contains(&self, version: u32) -> bool {
        self.table.contains_key(&version)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for InitialSalts {
    fn default() -> Self {
        Self::standard()
    }
}

/// HkdfLabel 结构 (RFC 8446 Section 7.1)
///
/// ```text
/// struct {
///     uint16 length = Length;
///     opaque label<7..255> = "tls13 " + Label;
///     opaque context<0..255> = Context;
/// } HkdfLabel;
/// ```
struct HkdfLabel<'a> {
    length: usize,
    label: &'a [u8],
    context: &'a [u8],
}

impl<'a> HkdfLabel<'a> {
    const PREFIX: &'static [u8] = b"tls13 ";

    fn new(length: usize, label: &'a [u8], context: &'a [u8]) -> Self {
        Self {
            length,
            label,
            context,
        }
    }

    /// 序列化为字节
    ///
    /// 格式：[Length (2 bytes)][Label Length (1 byte)][Label...][Context Length (1 byte)][Context...]
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let length = u16::try_from(self.length).map_err(|_| {
            QuicError::KeyDerivationFailed(format!("output length {} too large", self.length))
        })?;
        let label_len = u8::try_from(Self::PREFIX.len() + self.label.len())
            .map_err(|_| QuicError::KeyDerivationFailed("label too long".to_string()))?;
        let context_len = u8::try_from(self.context.len())
            .map_err(|_| QuicError::KeyDerivationFailed("context too long".to_string()))?;

        let mut bytes = Vec::with_capacity(4 + label_len as usize + context_len as usize);
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.push(label_len);
        bytes.extend_from_slice(Self::PREFIX);
        bytes.extend_from_slice(self.label);
        bytes.push(context_len);
        bytes.extend_from_slice(self.context);
        Ok(bytes)
    }
}

fn hmac_sha256(key: &[u8]) -> Result<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| QuicError::KeyDerivationFailed(format!("HMAC key: {}", e)))
}

/// HKDF-Expand-Label (context 为空)
///
/// RFC 5869 Section 2.3:
/// ```text
/// T(0) = empty
/// T(i) = HMAC-Hash(PRK, T(i-1) | info | i)
/// OKM  = first L octets of T(1) | T(2) | ...
/// ```
///
/// `length` 可以是任意值，超过 `SecretBuf` 容量时返回 `CapacityExceeded`。
pub fn hkdf_expand_label(secret: &[u8], label: &[u8], length: usize) -> Result<SecretBuf> {
    let info = HkdfLabel::new(length, label, b"").to_bytes()?;

    let mut output = SecretBuf::new();
    let mut previous = SecretBuf::new();
    let mut counter: u8 = 1;

    while output.len() < length {
        let mut mac = hmac_sha256(secret)?;
        mac.update(previous.as_slice());
        mac.update(&info);
        mac.update(&[counter]);
        let block = mac.finalize().into_bytes();

        let take = (length - output.len()).min(block.len());
        output.try_extend_from_slice(&block[..take])?;
        previous = SecretBuf::from_slice(&block)?;

        counter = counter.checked_add(1).ok_or_else(|| {
            QuicError::KeyDerivationFailed(format!("output length {} too large", length))
        })?;
    }

    Ok(output)
}

/// initial_secret = HKDF-Extract(salt, dcid) = HMAC-SHA256(salt, dcid)
pub fn initial_secret(salt: &[u8], dcid: &[u8]) -> Result<SecretBuf> {
    let (prk, _) = Hkdf::<Sha256>::extract(Some(salt), dcid);
    SecretBuf::from_slice(&prk)
}

/// client_initial_secret = HKDF-Expand-Label(initial_secret, "client in", 32)
pub fn client_initial_secret(salt: &[u8], dcid: &[u8]) -> Result<SecretBuf> {
    let secret = initial_secret(salt, dcid)?;
    hkdf_expand_label(secret.as_slice(), LABEL_CLIENT_IN, SECRET_LEN)
}

/// 客户端方向的 QUIC Initial 密钥
///
/// 包含三个密钥：
/// - key: 用于 AES-128-GCM 解密 payload
/// - iv: 基础 IV (还需要和 packet number 组合成 nonce)
/// - hp: 用于 header protection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialKeys {
    pub key: SecretBuf,
    pub iv: SecretBuf,
    pub hp: SecretBuf,
}

impl InitialKeys {
    /// 从 DCID 派生 QUIC Initial Keys
    ///
    /// 流程：
    /// 1. 按版本号查找 Initial Salt，不存在则失败
    /// 2. initial_secret = HKDF-Extract(salt, DCID)
    /// 3. client_initial_secret = HKDF-Expand-Label(initial_secret, "client in", 32)
    /// 4. key = HKDF-Expand-Label(client_initial_secret, "quic key", 16)
    /// 5. iv = HKDF-Expand-Label(client_initial_secret, "quic iv", 12)
    /// 6. hp = HKDF-Expand-Label(client_initial_secret, "quic hp", 16)
    ///
    /// # 参数
    /// - `salts`: 版本号 → Salt 映射表
    /// - `version`: 数据包中的 QUIC 版本号
    /// - `dcid`: Destination Connection ID
    pub fn derive(salts: &InitialSalts, version: u32, dcid: &[u8]) -> Result<Self> {
        let salt = salts
            .get(version)
            .ok_or(QuicError::UnsupportedVersion { version })?;

        let secret = client_initial_secret(salt, dcid)?;
        let keys = Self::from_client_secret(secret.as_slice())?;

        debug!(
            "Derived initial keys: version={:#010x}, dcid_len={}",
            version,
            dcid.len()
        );
        Ok(keys)
    }

    /// 从 client_initial_secret 派生 key / iv / hp
    pub fn from_client_secret(secret: &[u8]) -> Result<Self> {
        Ok(Self {
            key: hkdf_expand_label(secret, LABEL_QUIC_KEY, KEY_LEN)?,
            iv: hkdf_expand_label(secret, LABEL_QUIC_IV, IV_LEN)?,
            hp: hkdf_expand_label(secret, LABEL_QUIC_HP, HP_LEN)?,
        })
    }
}
