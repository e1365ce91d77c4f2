//! 定长缓冲区
//!
//! 密钥材料和解密后的明文都放在栈上的定长缓冲区里，
//! 每次写入都检查容量，超出时返回 `CapacityExceeded`，不会截断也不会越界。

use crate::quic::error::{QuicError, Result};

/// HMAC 摘要的最大长度 (SHA-512)
pub const MAX_DIGEST_LEN: usize = 64;

/// 解密明文最多保留的字节数
pub const PLAINTEXT_CAPACITY: usize = 1024;

/// 密钥材料缓冲区 (secret / key / iv / hp)
pub type SecretBuf = BoundedBuf<MAX_DIGEST_LEN>;

/// 明文缓冲区
pub type PlaintextBuf = BoundedBuf<PLAINTEXT_CAPACITY>;

/// 容量为 `N` 的定长缓冲区
#[derive(Clone)]
pub struct BoundedBuf<const N: usize> {
    data: [u8; N],
    len: usize,
}

impl<const N: usize> BoundedBuf<N> {
    pub const fn new() -> Self {
        Self {
            data: [0u8; N],
            len: 0,
        }
    }

    /// 从切片构造
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut buf = Self::new();
        buf.try_extend_from_slice(bytes)?;
        Ok(buf)
    }

    /// 追加字节；剩余容量不够时不做任何修改并返回错误
    pub fn try_extend_from_slice(&mut self, bytes: &[u8]) -> Result<()> {
        let requested = self.len + bytes.len();
        if requested > N {
            return Err(QuicError::CapacityExceeded {
                capacity: N,
                requested,
            });
        }
        self.data[self.len..requested].copy_from_slice(bytes);
        self.len = requested;
        Ok(())
    }

    /// 截断到 `len` 字节 (`len` 不小于当前长度时不变)
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for BoundedBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PartialEq for BoundedBuf<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<const N: usize> Eq for BoundedBuf<N> {}

impl<const N: usize> AsRef<[u8]> for BoundedBuf<N> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl<const N: usize> std::fmt::Debug for BoundedBuf<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BoundedBuf<{}>({})", N, hex::encode(self.as_slice()))
    }
}
