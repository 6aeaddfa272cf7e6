//! Coinbase transaction assembly from pool-supplied parts.
//!
//! The pool sends the coinbase split around the extranonce fields:
//! `coinb1 || extranonce1 || extranonce2 || coinb2`. The miner only chooses
//! extranonce2, which is how it varies the merkle root once the 32-bit nonce
//! space of a header is used up.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use crate::block::{decode_hex, BuildError};
use crate::hash::double_sha256;
use crate::job::MineParameters;

/// Smallest extranonce2 width the miner supports, in bytes.
pub const MIN_EXTRANONCE2_SIZE: usize = 2;

/// Render an extranonce2 value as zero-padded lower-case hex.
///
/// The result has exactly `size * 2` digits whenever the value fits in
/// `size` bytes.
pub fn format_extranonce2(value: u32, size: usize) -> String {
    format!("{:0width$x}", value, width = size * 2)
}

/// Builder for the coinbase transaction of a Stratum job.
#[derive(Debug, Clone)]
pub struct CoinbaseBuilder<'a> {
    coinbase_part1: &'a str,
    extranonce1: &'a str,
    coinbase_part2: &'a str,
    extranonce2_size: usize,
    extranonce2: u32,
}

impl<'a> CoinbaseBuilder<'a> {
    /// Create a builder from job parameters, with extranonce2 = 0.
    pub fn new(params: &'a MineParameters) -> Self {
        CoinbaseBuilder {
            coinbase_part1: &params.coinbase_part1,
            extranonce1: &params.extranonce1,
            coinbase_part2: &params.coinbase_part2,
            extranonce2_size: params.extranonce2_size,
            extranonce2: 0,
        }
    }

    /// Set the extranonce2 value (used to vary the merkle root).
    pub fn with_extranonce2(mut self, extranonce2: u32) -> Self {
        self.extranonce2 = extranonce2;
        self
    }

    /// Hex form of the coinbase, before decoding.
    pub fn to_hex(&self) -> Result<String, BuildError> {
        if self.extranonce2_size < MIN_EXTRANONCE2_SIZE {
            return Err(BuildError::Extranonce2TooSmall(self.extranonce2_size));
        }
        let extranonce2 = format_extranonce2(self.extranonce2, self.extranonce2_size);
        if extranonce2.len() != self.extranonce2_size * 2 {
            return Err(BuildError::Extranonce2Overflow {
                value: self.extranonce2,
                size: self.extranonce2_size,
            });
        }

        let mut coinbase = String::with_capacity(
            self.coinbase_part1.len()
                + self.extranonce1.len()
                + extranonce2.len()
                + self.coinbase_part2.len(),
        );
        coinbase.push_str(self.coinbase_part1);
        coinbase.push_str(self.extranonce1);
        coinbase.push_str(&extranonce2);
        coinbase.push_str(self.coinbase_part2);
        Ok(coinbase)
    }

    /// Serialized coinbase transaction bytes.
    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        decode_hex("coinbase", &self.to_hex()?)
    }

    /// The coinbase txid in internal byte order (seed of the merkle root).
    pub fn txid(&self) -> Result<[u8; 32], BuildError> {
        Ok(double_sha256(&self.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn params() -> MineParameters {
        MineParameters {
            extranonce1: "f8002c90".to_string(),
            extranonce2_size: 4,
            coinbase_part1: "01000000010000".to_string(),
            coinbase_part2: "ffffffff00".to_string(),
            ..MineParameters::default()
        }
    }

    #[test]
    fn test_format_extranonce2() {
        assert_eq!(format_extranonce2(0, 4), "00000000");
        assert_eq!(format_extranonce2(0x1a, 2), "001a");
        assert_eq!(format_extranonce2(0xfffe, 8), "000000000000fffe");
        for size in 2..=8 {
            assert_eq!(format_extranonce2(0x1234, size).len(), size * 2);
        }
    }

    #[test]
    fn test_coinbase_concatenation() {
        let params = params();
        let builder = CoinbaseBuilder::new(&params).with_extranonce2(0x2a);
        assert_eq!(
            builder.to_hex().unwrap(),
            "01000000010000f8002c900000002affffffff00"
        );
        assert_eq!(builder.build().unwrap().len(), 20);
    }

    #[test]
    fn test_txid_is_double_sha256() {
        let params = params();
        let builder = CoinbaseBuilder::new(&params);
        let bytes = builder.build().unwrap();
        assert_eq!(builder.txid().unwrap(), double_sha256(&bytes));
    }

    #[test]
    fn test_extranonce2_varies_txid() {
        let params = params();
        let a = CoinbaseBuilder::new(&params).with_extranonce2(0).txid().unwrap();
        let b = CoinbaseBuilder::new(&params).with_extranonce2(1).txid().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_extranonce2_size_precondition() {
        let mut params = params();
        params.extranonce2_size = 1;
        assert_eq!(
            CoinbaseBuilder::new(&params).build(),
            Err(BuildError::Extranonce2TooSmall(1))
        );
    }

    #[test]
    fn test_extranonce2_overflow() {
        let mut params = params();
        params.extranonce2_size = 2;
        assert_eq!(
            CoinbaseBuilder::new(&params).with_extranonce2(0x10000).to_hex(),
            Err(BuildError::Extranonce2Overflow { value: 0x10000, size: 2 })
        );
    }

    #[test]
    fn test_invalid_coinbase_hex() {
        let mut params = params();
        params.coinbase_part1 = "zz".to_string();
        assert_eq!(
            CoinbaseBuilder::new(&params).build(),
            Err(BuildError::InvalidHex { field: "coinbase" })
        );
    }
}
