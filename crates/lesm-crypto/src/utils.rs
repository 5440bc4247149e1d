//! Constant-time comparison helpers.
//!
//! Address hashes and key material are compared without early exit so that
//! resolution timing does not reveal how many leading bytes matched.

use constant_time_eq::constant_time_eq;

/// Compare two byte slices in constant time.
///
/// ```rust
/// use lesm_crypto::utils::constant_time_compare;
///
/// assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
/// assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 4]));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    constant_time_eq(a, b)
}

/// Compare two fixed-size arrays in constant time.
///
/// ```rust
/// use lesm_crypto::utils::constant_time_compare_array;
///
/// let hash = [0x0d, 0xfb, 0xaa];
/// assert!(constant_time_compare_array(&hash, &[0x0d, 0xfb, 0xaa]));
/// assert!(!constant_time_compare_array(&hash, &[0x0d, 0xfb, 0xab]));
/// ```
pub fn constant_time_compare_array<const N: usize>(a: &[u8; N], b: &[u8; N]) -> bool {
    constant_time_eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare_different_length() {
        assert!(!constant_time_compare(b"abc", b"abcd"));
    }

    #[test]
    fn test_constant_time_compare_array_hash_sized() {
        let a = [0xAA, 0xFB, 0x0D];
        let mut b = a;
        assert!(constant_time_compare_array(&a, &b));

        b[2] ^= 0x01;
        assert!(!constant_time_compare_array(&a, &b));
    }

    #[test]
    fn test_constant_time_compare_array_key_sized() {
        let k1 = [0u8; 16];
        let mut k2 = [0u8; 16];
        assert!(constant_time_compare_array(&k1, &k2));

        k2[15] = 1;
        assert!(!constant_time_compare_array(&k1, &k2));
    }
}
