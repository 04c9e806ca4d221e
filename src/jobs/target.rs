// src/jobs/target.rs
//! Target arithmetic
//!
//! A target is a 256-bit threshold; a proof-of-work hash qualifies when its
//! numeric value is less than or equal to the target. The network target
//! comes from the block header's compact difficulty bits; the per-connection
//! share target is derived from the pool difficulty.

use crate::utils::error::PoolError;
use num_bigint::BigUint;

/// The difficulty-1 target (compact bits `1d00ffff`), the reference point
/// for pool share difficulty.
pub fn diff1_target() -> BigUint {
    // 0x00000000ffff0000...0000 (32 bytes)
    BigUint::from(0xffffu32) << (8 * (32 - 4))
}

/// The maximum representable 256-bit target; every hash satisfies it.
pub fn max_target() -> BigUint {
    (BigUint::from(1u8) << 256u32) - 1u8
}

/// Expands compact difficulty bits (e.g. `"1d00ffff"`) into a full target.
///
/// Compact encoding is `0xEEMMMMMM`: a one-byte exponent and a three-byte
/// mantissa, target = mantissa × 256^(exponent − 3).
///
/// # Errors
/// Returns `PoolError::InputError` if the bits field is not 8 hex chars or
/// the mantissa has its sign bit set (negative targets are invalid).
pub fn target_from_bits(bits_hex: &str) -> Result<BigUint, PoolError> {
    if bits_hex.len() != 8 {
        return Err(PoolError::InputError(format!(
            "difficulty bits must be 8 hex chars, got {:?}",
            bits_hex
        )));
    }
    let compact = u32::from_str_radix(bits_hex, 16)
        .map_err(|e| PoolError::InputError(format!("bad difficulty bits {:?}: {}", bits_hex, e)))?;

    let exponent = (compact >> 24) as u8;
    let mantissa = compact & 0x007f_ffff;
    if compact & 0x0080_0000 != 0 {
        return Err(PoolError::InputError(format!(
            "negative compact target {:?}",
            bits_hex
        )));
    }

    let target = if exponent <= 3 {
        BigUint::from(mantissa >> (8 * (3 - exponent) as u32))
    } else {
        BigUint::from(mantissa) << (8 * (exponent as u32 - 3))
    };
    Ok(target)
}

/// Derives a share target from an integer pool difficulty (clamped to ≥ 1).
pub fn share_target_from_difficulty(difficulty: u64) -> BigUint {
    diff1_target() / BigUint::from(difficulty.max(1))
}

/// Interprets a proof-of-work digest as a 256-bit integer.
///
/// Header hashes compare little-endian: the last digest byte is the most
/// significant.
pub fn hash_value(digest: &[u8; 32]) -> BigUint {
    BigUint::from_bytes_le(digest)
}

/// True when `hash` satisfies `target` (numerically less than or equal).
pub fn meets_target(hash: &BigUint, target: &BigUint) -> bool {
    hash <= target
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The canonical difficulty-1 bits must expand to the diff-1 target.
    #[test]
    fn test_bits_1d00ffff_is_diff1() {
        let t = target_from_bits("1d00ffff").unwrap();
        assert_eq!(t, diff1_target());
    }

    /// A known mainnet-style compact target expands to mantissa shifted by
    /// exponent minus three bytes.
    #[test]
    fn test_bits_expansion() {
        let t = target_from_bits("170d3f61").unwrap();
        assert_eq!(t, BigUint::from(0x0d3f61u32) << (8 * (0x17 - 3)));
    }

    /// Malformed bits fields are input errors, not panics.
    #[test]
    fn test_bad_bits_rejected() {
        assert!(target_from_bits("xyz").is_err());
        assert!(target_from_bits("1d00ff").is_err());
        // Sign bit set in the mantissa.
        assert!(target_from_bits("1d80ffff").is_err());
    }

    /// Difficulty 1 is the reference target and higher difficulty shrinks it.
    #[test]
    fn test_share_target_scales_with_difficulty() {
        assert_eq!(share_target_from_difficulty(1), diff1_target());
        assert_eq!(share_target_from_difficulty(0), diff1_target());
        let d16 = share_target_from_difficulty(16);
        assert!(d16 < diff1_target());
        assert_eq!(d16, diff1_target() / BigUint::from(16u8));
    }

    /// Every possible digest satisfies the maximum target, and the all-ones
    /// digest satisfies nothing smaller.
    #[test]
    fn test_hash_comparison() {
        let ones = hash_value(&[0xff; 32]);
        assert!(meets_target(&ones, &max_target()));
        assert!(!meets_target(&ones, &diff1_target()));
        let zero = hash_value(&[0u8; 32]);
        assert!(meets_target(&zero, &diff1_target()));
    }

    /// Digest bytes compare little-endian: the trailing byte dominates.
    #[test]
    fn test_hash_value_endianness() {
        let mut low = [0u8; 32];
        low[0] = 0xff;
        let mut high = [0u8; 32];
        high[31] = 0x01;
        assert!(hash_value(&low) < hash_value(&high));
    }
}
