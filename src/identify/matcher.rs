//! 定长 mask/value 字节匹配器

/// N 字节的 mask 与 value
///
/// 匹配规则: `(buf[i] & mask[i]) == value[i]` 对前 N 个字节全部成立。
/// 构造后不可变，可以作为 `const` 定义。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskAndValue<const N: usize> {
    mask: [u8; N],
    value: [u8; N],
}

impl<const N: usize> MaskAndValue<N> {
    pub const fn new(mask: [u8; N], value: [u8; N]) -> Self {
        Self { mask, value }
    }

    /// 检查 `data` 是否匹配
    ///
    /// 所有字节都参与计算，不做提前返回。
    #[inline]
    pub fn matches(&self, data: &[u8; N]) -> bool {
        let mut diff = 0u8;
        for i in 0..N {
            diff |= (data[i] & self.mask[i]) ^ self.value[i];
        }
        diff == 0
    }

    /// 对切片的前 N 个字节做匹配，不足 N 字节时返回 false
    #[inline]
    pub fn matches_prefix(&self, data: &[u8]) -> bool {
        match data.get(..N).and_then(|p| <&[u8; N]>::try_from(p).ok()) {
            Some(prefix) => self.matches(prefix),
            None => false,
        }
    }

    pub const fn length(&self) -> usize {
        N
    }

    pub fn mask(&self) -> &[u8; N] {
        &self.mask
    }

    pub fn value(&self) -> &[u8; N] {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(mask: &[u8; 8], value: &[u8; 8], data: &[u8; 8]) -> bool {
        (0..8).all(|i| data[i] & mask[i] == value[i])
    }

    #[test]
    fn test_zero_mask_matches_everything() {
        let mv = MaskAndValue::new([0u8; 8], [0u8; 8]);
        assert!(mv.matches(&[0u8; 8]));
        assert!(mv.matches(&[0xff; 8]));
        assert!(mv.matches(b"anything"));
    }

    #[test]
    fn test_full_mask_exact_match_only() {
        let mv = MaskAndValue::new([0xff; 8], *b"GET /ind");
        assert!(mv.matches(b"GET /ind"));
        assert!(!mv.matches(b"GET /inD"));
        assert!(!mv.matches(b"get /ind"));
    }

    #[test]
    fn test_value_bits_outside_mask_never_match() {
        // value 中有 mask 之外的 bit，任何输入都无法匹配
        let mv = MaskAndValue::new([0xf0, 0, 0, 0, 0, 0, 0, 0], [0x0f, 0, 0, 0, 0, 0, 0, 0]);
        for b in 0..=255u8 {
            assert!(!mv.matches(&[b, 0, 0, 0, 0, 0, 0, 0]));
        }
    }

    #[test]
    fn test_agrees_with_bitwise_definition() {
        let mask = [0xff, 0xff, 0xfc, 0x00, 0x00, 0xff, 0x00, 0x00];
        let value = [0x16, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00];
        let mv = MaskAndValue::new(mask, value);

        // 简单的 xorshift 生成伪随机输入
        let mut state = 0x9e37_79b9_7f4a_7c15u64;
        for i in 0..4096 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let mut data = state.to_be_bytes();
            if i % 4 == 0 {
                // 让一部分输入真正命中
                data[0] = 0x16;
                data[1] = 0x03;
                data[2] &= 0x03;
                data[5] = 0x01;
            }
            assert_eq!(mv.matches(&data), reference(&mask, &value, &data));
        }
    }

    #[test]
    fn test_matches_prefix_short_input() {
        let mv = MaskAndValue::new([0u8; 8], [0u8; 8]);
        assert!(!mv.matches_prefix(&[0u8; 7]));
        assert!(mv.matches_prefix(&[0u8; 8]));
        assert!(mv.matches_prefix(&[0u8; 64]));
        assert_eq!(mv.length(), 8);
    }
}
