//! Merkle root reconstruction from a Stratum merkle branch.

use alloc::string::String;
use alloc::vec::Vec;
use crate::block::{decode_hex_array, BuildError};
use crate::hash::double_sha256;

/// Fold the pool's merkle branch into the coinbase txid.
///
/// Each step hashes `acc || branch`; the coinbase is always the leftmost
/// leaf, so the branch hashes are always on the right. With an empty branch
/// the root is the coinbase txid itself.
pub fn merkle_root(coinbase_txid: [u8; 32], branches: &[[u8; 32]]) -> [u8; 32] {
    let mut acc = coinbase_txid;
    let mut combined = [0u8; 64];
    for branch in branches {
        combined[..32].copy_from_slice(&acc);
        combined[32..].copy_from_slice(branch);
        acc = double_sha256(&combined);
    }
    acc
}

/// Decode hex merkle branches as sent by the pool.
pub fn decode_branches(branches: &[String]) -> Result<Vec<[u8; 32]>, BuildError> {
    branches
        .iter()
        .map(|branch| decode_hex_array::<32>("merkle_branch", branch))
        .collect()
}
