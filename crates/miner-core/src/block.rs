//! Block header assembly and search input derivation.
//!
//! Pools send header fields in display form: version, nbits and ntime as
//! big-endian hex words, and the previous block hash with each 32-bit word
//! byte-swapped. The header itself is serialized little-endian, so every
//! word is flipped on the way in. The merkle root is computed locally and
//! is already in internal byte order.

use alloc::vec::Vec;
use crate::coinbase::CoinbaseBuilder;
use crate::hash::{double_sha256, double_sha256_midstate, sha256_partial, Sha256State, SHA256_IV};
use crate::job::MineParameters;
use crate::merkle::{decode_branches, merkle_root};

/// Size of a block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Offset of the nonce inside the second SHA-256 block of a header.
pub const NONCE_OFFSET_IN_BLOCK2: usize = 12;

/// Errors from turning pool job fields into a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A field is not valid hex
    InvalidHex { field: &'static str },
    /// A field decoded to the wrong number of bytes
    InvalidLength { field: &'static str, expected: usize, actual: usize },
    /// The pool's extranonce2 size is below the supported minimum
    Extranonce2TooSmall(usize),
    /// The extranonce2 value does not fit in the pool's extranonce2 size
    Extranonce2Overflow { value: u32, size: usize },
}

impl core::fmt::Display for BuildError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BuildError::InvalidHex { field } => write!(f, "Invalid hex in {}", field),
            BuildError::InvalidLength { field, expected, actual } => {
                write!(f, "Invalid {} length: expected {} bytes, got {}", field, expected, actual)
            }
            BuildError::Extranonce2TooSmall(size) => {
                write!(f, "Extranonce2 size {} is below the minimum of 2 bytes", size)
            }
            BuildError::Extranonce2Overflow { value, size } => {
                write!(f, "Extranonce2 {:x} does not fit in {} bytes", value, size)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BuildError {}

/// Decode a hex field of any length.
pub(crate) fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, BuildError> {
    hex::decode(value).map_err(|_| BuildError::InvalidHex { field })
}

/// Decode a hex field that must be exactly `N` bytes.
pub(crate) fn decode_hex_array<const N: usize>(
    field: &'static str,
    value: &str,
) -> Result<[u8; N], BuildError> {
    let bytes = decode_hex(field, value)?;
    bytes.as_slice().try_into().map_err(|_| BuildError::InvalidLength {
        field,
        expected: N,
        actual: bytes.len(),
    })
}

/// A Bitcoin block header (80 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block version.
    pub version: u32,
    /// Hash of the previous block (internal byte order).
    pub prev_block_hash: [u8; 32],
    /// Merkle root of all transactions (internal byte order).
    pub merkle_root: [u8; 32],
    /// Block timestamp (Unix time).
    pub timestamp: u32,
    /// Difficulty target in compact "bits" format.
    pub bits: u32,
    /// Nonce for proof of work.
    pub nonce: u32,
}

impl BlockHeader {
    /// Build a header from Stratum display-form fields and a merkle root.
    pub fn from_stratum(
        version: &str,
        prev_hash: &str,
        merkle_root: [u8; 32],
        time: &str,
        bits: &str,
    ) -> Result<Self, BuildError> {
        let mut prev_block_hash = decode_hex_array::<32>("prev_hash", prev_hash)?;
        for word in prev_block_hash.chunks_exact_mut(4) {
            word.reverse();
        }

        Ok(BlockHeader {
            version: u32::from_be_bytes(decode_hex_array("version", version)?),
            prev_block_hash,
            merkle_root,
            timestamp: u32::from_be_bytes(decode_hex_array("time", time)?),
            bits: u32::from_be_bytes(decode_hex_array("bits", bits)?),
            nonce: 0,
        })
    }

    /// Build the candidate header for a job and extranonce2 value.
    pub fn for_job(params: &MineParameters, extranonce2: u32) -> Result<Self, BuildError> {
        let coinbase_txid = CoinbaseBuilder::new(params)
            .with_extranonce2(extranonce2)
            .txid()?;
        let branches = decode_branches(&params.merkle_branches)?;
        let root = merkle_root(coinbase_txid, &branches);

        Self::from_stratum(&params.version, &params.prev_hash, root, &params.time, &params.bits)
    }

    /// Serialize the block header to 80 bytes.
    pub fn serialize(&self) -> [u8; 80] {
        let mut header = [0u8; 80];

        // Version (4 bytes, little-endian)
        header[0..4].copy_from_slice(&self.version.to_le_bytes());

        // Previous block hash (32 bytes, internal byte order)
        header[4..36].copy_from_slice(&self.prev_block_hash);

        // Merkle root (32 bytes)
        header[36..68].copy_from_slice(&self.merkle_root);

        // Timestamp (4 bytes, little-endian)
        header[68..72].copy_from_slice(&self.timestamp.to_le_bytes());

        // Bits (4 bytes, little-endian)
        header[72..76].copy_from_slice(&self.bits.to_le_bytes());

        // Nonce (4 bytes, little-endian)
        header[76..80].copy_from_slice(&self.nonce.to_le_bytes());

        header
    }

    /// Compute the block hash (double SHA256).
    pub fn hash(&self) -> [u8; 32] {
        double_sha256(&self.serialize())
    }

    /// Split the padded header into a midstate and the nonce-bearing block.
    ///
    /// An 80-byte message pads to exactly two blocks: the first 64 header
    /// bytes, then the last 16 header bytes, `0x80`, zeros and the 640-bit
    /// length. The nonce currently in the header is carried into block 2.
    pub fn work(&self) -> Work {
        let mut padded = [0u8; 128];
        padded[..BLOCK_HEADER_SIZE].copy_from_slice(&self.serialize());
        padded[BLOCK_HEADER_SIZE] = 0x80;
        padded[120..].copy_from_slice(&((BLOCK_HEADER_SIZE as u64) * 8).to_be_bytes());

        let mut block1 = [0u8; 64];
        let mut block2 = [0u8; 64];
        block1.copy_from_slice(&padded[..64]);
        block2.copy_from_slice(&padded[64..]);

        let (state, bit_len) = sha256_partial(SHA256_IV, &block1);
        Work {
            midstate: Sha256State { state, bit_len },
            block2,
        }
    }
}

/// Input for the nonce search: header midstate plus the second block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Work {
    /// SHA-256 state after the first 64 header bytes.
    pub midstate: Sha256State,
    /// Header bytes 64..80 and padding; the nonce sits at bytes 12..16.
    pub block2: [u8; 64],
}

impl Work {
    /// Double SHA256 of the header with `nonce` substituted in.
    #[inline]
    pub fn hash_with_nonce(&self, nonce: u32) -> [u8; 32] {
        let mut block2 = self.block2;
        block2[NONCE_OFFSET_IN_BLOCK2..NONCE_OFFSET_IN_BLOCK2 + 4]
            .copy_from_slice(&nonce.to_le_bytes());
        double_sha256_midstate(&self.midstate.state, &block2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_to_display_hex;
    use alloc::string::ToString;
    use alloc::vec;

    // Block 125552 fields as a pool would announce them.
    const VERSION: &str = "00000001";
    const PREV_HASH_STRATUM: &str =
        "ab02cd818b9e567ee21793cddef299feb29ad444a41b85b8000008a300000000";
    const MERKLE_ROOT: &str = "e320b6c2fffc8d750423db8b1eb942ae710e951ed797f7affc8892b0f1fc122b";
    const NTIME: &str = "4dd7f5c7";
    const NBITS: &str = "1a44b9f2";
    const NONCE: u32 = 2_504_433_986;
    const BLOCK_HASH: &str = "00000000000000001e8d6829a8a21adc5d38d0a473b144b6765798e61f98bd1d";

    fn reference_header() -> BlockHeader {
        let mut root = [0u8; 32];
        root.copy_from_slice(&hex::decode(MERKLE_ROOT).unwrap());
        BlockHeader::from_stratum(VERSION, PREV_HASH_STRATUM, root, NTIME, NBITS).unwrap()
    }

    #[test]
    fn test_from_stratum_fields() {
        let header = reference_header();
        assert_eq!(header.version, 1);
        assert_eq!(header.timestamp, 1_305_998_791);
        assert_eq!(header.bits, 440_711_666);
        assert_eq!(
            hash_to_display_hex(&header.prev_block_hash),
            "00000000000008a3a41b85b8b29ad444def299fee21793cd8b9e567eab02cd81"
        );
    }

    #[test]
    fn test_reference_block_hash() {
        let mut header = reference_header();
        header.nonce = NONCE;
        assert_eq!(hash_to_display_hex(&header.hash()), BLOCK_HASH);
    }

    #[test]
    fn test_block_header_serialization() {
        let mut header = reference_header();
        header.nonce = 0xDEADBEEF;

        let serialized = header.serialize();
        assert_eq!(&serialized[0..4], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&serialized[4..8], &[0x81, 0xcd, 0x02, 0xab]);
        assert_eq!(&serialized[68..72], &[0xc7, 0xf5, 0xd7, 0x4d]);
        assert_eq!(&serialized[72..76], &[0xf2, 0xb9, 0x44, 0x1a]);
        assert_eq!(&serialized[76..80], &[0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_work_layout() {
        let header = reference_header();
        let work = header.work();
        let serialized = header.serialize();

        assert_eq!(&work.block2[..16], &serialized[64..80]);
        assert_eq!(work.block2[16], 0x80);
        assert!(work.block2[17..62].iter().all(|b| *b == 0));
        assert_eq!(&work.block2[62..], &[0x02, 0x80]);
        assert_eq!(work.midstate.bit_len, 512);
    }

    #[test]
    fn test_work_hash_matches_header_hash() {
        let header = reference_header();
        let work = header.work();
        assert_eq!(hash_to_display_hex(&work.hash_with_nonce(NONCE)), BLOCK_HASH);

        let mut other = header.clone();
        other.nonce = 7;
        assert_eq!(work.hash_with_nonce(7), other.hash());
    }

    #[test]
    fn test_for_job_uses_merkle_branches() {
        let params = MineParameters {
            extranonce1: "f8002c90".to_string(),
            extranonce2_size: 4,
            difficulty: 1,
            prev_hash: PREV_HASH_STRATUM.to_string(),
            coinbase_part1: "01000000010000".to_string(),
            coinbase_part2: "ffffffff00".to_string(),
            merkle_branches: vec!["11".repeat(32)],
            version: VERSION.to_string(),
            bits: NBITS.to_string(),
            time: NTIME.to_string(),
        };

        let header = BlockHeader::for_job(&params, 3).unwrap();
        let txid = CoinbaseBuilder::new(&params).with_extranonce2(3).txid().unwrap();
        assert_eq!(header.merkle_root, merkle_root(txid, &[[0x11; 32]]));
        assert_eq!(header.nonce, 0);

        let no_branches = MineParameters { merkle_branches: vec![], ..params };
        let header = BlockHeader::for_job(&no_branches, 3).unwrap();
        assert_eq!(header.merkle_root, txid);
    }

    #[test]
    fn test_invalid_fields() {
        let root = [0u8; 32];
        assert_eq!(
            BlockHeader::from_stratum("0001", PREV_HASH_STRATUM, root, NTIME, NBITS),
            Err(BuildError::InvalidLength { field: "version", expected: 4, actual: 2 })
        );
        assert_eq!(
            BlockHeader::from_stratum(VERSION, "xyz", root, NTIME, NBITS),
            Err(BuildError::InvalidHex { field: "prev_hash" })
        );
    }
}
