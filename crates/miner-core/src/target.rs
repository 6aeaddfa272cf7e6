//! Pool difficulty to share target conversion.

use alloc::string::String;

/// Difficulty-1 share target scaled down by 2^224 (the `0xFFFF0000` word).
pub const BASE_TARGET: u64 = 0xFFFF_0000;

/// Divisor used when the pool asks for a difficulty below 1.
///
/// A difficulty of 0 is the sentinel for "anything under 1" and maps to
/// difficulty 0.01, i.e. `BASE_TARGET / 0.01`.
const FALLBACK_MULTIPLIER: u64 = 100;

/// Scaled target value for a pool difficulty.
///
/// `BASE_TARGET / difficulty` with integer division, or the fallback easy
/// target `BASE_TARGET / 0.01` when `difficulty` is 0.
pub fn target_value(difficulty: u64) -> u64 {
    if difficulty == 0 {
        BASE_TARGET * FALLBACK_MULTIPLIER
    } else {
        BASE_TARGET / difficulty
    }
}

/// A 256-bit share target in big-endian byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Target([u8; 32]);

impl Target {
    /// Build the share target for a pool difficulty.
    ///
    /// The scaled value occupies the top 64 bits; everything below is zero.
    /// For difficulty 1 this is `00000000ffff0000000...`.
    pub fn from_difficulty(difficulty: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&target_value(difficulty).to_be_bytes());
        Target(bytes)
    }

    /// Wrap raw big-endian target bytes.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Target(bytes)
    }

    /// Big-endian target bytes, most significant first.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check whether a double-SHA256 output meets the target.
    ///
    /// The hash is in internal byte order, so it is compared most
    /// significant byte first after reversal. Equality counts as a match.
    #[inline]
    pub fn is_met_by(&self, hash: &[u8; 32]) -> bool {
        for (h, t) in hash.iter().rev().zip(self.0.iter()) {
            if h < t {
                return true;
            }
            if h > t {
                return false;
            }
        }
        true
    }

    /// 64-digit lower-case hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl core::fmt::Display for Target {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Format difficulty for display (e.g., "1.23T" for trillion).
pub fn format_difficulty(difficulty: f64) -> String {
    if difficulty >= 1e15 {
        alloc::format!("{:.2}P", difficulty / 1e15)
    } else if difficulty >= 1e12 {
        alloc::format!("{:.2}T", difficulty / 1e12)
    } else if difficulty >= 1e9 {
        alloc::format!("{:.2}G", difficulty / 1e9)
    } else if difficulty >= 1e6 {
        alloc::format!("{:.2}M", difficulty / 1e6)
    } else if difficulty >= 1e3 {
        alloc::format!("{:.2}K", difficulty / 1e3)
    } else {
        alloc::format!("{:.2}", difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::reverse_bytes;

    #[test]
    fn test_difficulty_one() {
        assert_eq!(target_value(1), 0xFFFF_0000);

        let target = Target::from_difficulty(1);
        assert_eq!(
            target.to_hex(),
            "00000000ffff0000000000000000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_fallback_target() {
        // round(0xFFFF0000 / 0.01)
        assert_eq!(target_value(0), 429_490_176_000);
        assert_eq!(target_value(0), 0x63_FF9C_0000);

        let target = Target::from_difficulty(0);
        assert_eq!(
            target.to_hex(),
            "00000063ff9c0000000000000000000000000000000000000000000000000000"
        );
        assert!(target > Target::from_difficulty(1));
    }

    #[test]
    fn test_integer_division() {
        assert_eq!(target_value(3), 0xFFFF_0000 / 3);
        assert_eq!(target_value(128), 0x01FF_FE00);
        assert_eq!(
            Target::from_difficulty(128).to_hex(),
            "0000000001fffe00000000000000000000000000000000000000000000000000"
        );
        assert_eq!(target_value(u64::MAX), 0);
    }

    #[test]
    fn test_target_monotonic_in_difficulty() {
        let difficulties = [0u64, 1, 2, 3, 7, 64, 128, 1000, 65_536, 1 << 31, u64::MAX];
        for pair in difficulties.windows(2) {
            let easier = Target::from_difficulty(pair[0]);
            let harder = Target::from_difficulty(pair[1]);
            assert!(harder <= easier, "difficulty {} vs {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_is_met_by() {
        let target = Target::from_difficulty(1);

        // Display form 00000000 0000ffff ... is below the target.
        let mut display = [0u8; 32];
        display[6] = 0xff;
        display[7] = 0xff;
        assert!(target.is_met_by(&reverse_bytes(&display)));

        // Display form 00000001 ... is above it.
        let mut display = [0u8; 32];
        display[3] = 0x01;
        assert!(!target.is_met_by(&reverse_bytes(&display)));

        // Equal to the target counts.
        assert!(target.is_met_by(&reverse_bytes(target.as_bytes())));
    }

    #[test]
    fn test_display_matches_hex() {
        let target = Target::from_difficulty(42);
        assert_eq!(alloc::format!("{}", target), target.to_hex());
    }

    #[test]
    fn test_format_difficulty() {
        assert_eq!(format_difficulty(128.0), "128.00");
        assert_eq!(format_difficulty(1_500.0), "1.50K");
        assert_eq!(format_difficulty(2.5e12), "2.50T");
    }
}
