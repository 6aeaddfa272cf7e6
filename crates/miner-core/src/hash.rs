//! SHA256 double-hashing and midstate helpers.
//!
//! `double_sha256` goes through the `sha2` crate. The midstate functions run
//! the compression function directly so that the state after the first 64
//! bytes of a block header can be reused for every nonce attempt.

use sha2::{Digest, Sha256};

/// SHA-256 round constants.
static K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

/// SHA-256 initial hash value.
pub const SHA256_IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
///
/// This is used for block header hashing, transaction IDs, and merkle trees.
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(&first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Run the SHA-256 compression function over one 64-byte block.
pub fn compress(state: &mut [u32; 8], block: &[u8; 64]) {
    let mut w = [0u32; 64];
    for (i, word) in block.chunks_exact(4).enumerate() {
        w[i] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
    }
    for i in 16..64 {
        let s0 = w[i - 15].rotate_right(7) ^ w[i - 15].rotate_right(18) ^ (w[i - 15] >> 3);
        let s1 = w[i - 2].rotate_right(17) ^ w[i - 2].rotate_right(19) ^ (w[i - 2] >> 10);
        w[i] = w[i - 16]
            .wrapping_add(s0)
            .wrapping_add(w[i - 7])
            .wrapping_add(s1);
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

    for i in 0..64 {
        let ep1 = e.rotate_right(6) ^ e.rotate_right(11) ^ e.rotate_right(25);
        let ch = (e & f) ^ (!e & g);
        let t1 = h
            .wrapping_add(ep1)
            .wrapping_add(ch)
            .wrapping_add(K[i])
            .wrapping_add(w[i]);
        let ep0 = a.rotate_right(2) ^ a.rotate_right(13) ^ a.rotate_right(22);
        let maj = (a & b) ^ (a & c) ^ (b & c);
        let t2 = ep0.wrapping_add(maj);

        h = g;
        g = f;
        f = e;
        e = d.wrapping_add(t1);
        d = c;
        c = b;
        b = a;
        a = t1.wrapping_add(t2);
    }

    for (slot, value) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
        *slot = slot.wrapping_add(value);
    }
}

/// Intermediate SHA-256 state after absorbing whole 64-byte blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sha256State {
    /// The eight working words.
    pub state: [u32; 8],
    /// Number of message bits absorbed so far.
    pub bit_len: u64,
}

impl Sha256State {
    /// State before any data has been hashed.
    pub const INITIAL: Sha256State = Sha256State {
        state: SHA256_IV,
        bit_len: 0,
    };

    /// Absorb one full block and return the new state.
    pub fn absorb(mut self, block: &[u8; 64]) -> Self {
        compress(&mut self.state, block);
        self.bit_len += 512;
        self
    }

    /// Finish the hash over the remaining `tail` bytes, applying padding.
    ///
    /// The tail may be any length; whole blocks in it are absorbed first.
    /// A residue of 56 bytes or more does not leave room for the length
    /// trailer, so an extra zero block is emitted before it.
    pub fn finalize(mut self, tail: &[u8]) -> [u8; 32] {
        let mut chunks = tail.chunks_exact(64);
        for chunk in &mut chunks {
            let mut block = [0u8; 64];
            block.copy_from_slice(chunk);
            self = self.absorb(&block);
        }
        let rest = chunks.remainder();
        let bit_len = self.bit_len + (rest.len() as u64) * 8;

        let mut block = [0u8; 64];
        block[..rest.len()].copy_from_slice(rest);
        block[rest.len()] = 0x80;

        if rest.len() >= 56 {
            compress(&mut self.state, &block);
            block = [0u8; 64];
        }

        block[56..].copy_from_slice(&bit_len.to_be_bytes());
        compress(&mut self.state, &block);

        state_to_bytes(&self.state)
    }
}

impl Default for Sha256State {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Fold a single 64-byte block into `state_in`.
///
/// Returns the compression state after the block and the number of message
/// bits it accounts for (always 512). Passing [`SHA256_IV`] as `state_in`
/// produces the midstate of the block.
pub fn sha256_partial(state_in: [u32; 8], block: &[u8; 64]) -> ([u32; 8], u64) {
    let mut state = state_in;
    compress(&mut state, block);
    (state, 512)
}

/// Single SHA256 hash computed with the in-crate compression function.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256State::INITIAL.finalize(data)
}

/// Double SHA256 of an 80-byte header from its first-block midstate.
///
/// `block2` is the second 64-byte block of the padded header, i.e. header
/// bytes 64..80 followed by the padding for an 80-byte message.
#[inline]
pub fn double_sha256_midstate(midstate: &[u32; 8], block2: &[u8; 64]) -> [u8; 32] {
    let mut state = *midstate;
    compress(&mut state, block2);

    // Second pass hashes the 32-byte digest, which always fits one padded block.
    let mut block = [0u8; 64];
    for (i, word) in state.iter().enumerate() {
        block[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
    }
    block[32] = 0x80;
    block[62] = 0x01; // 256 bits

    let mut state = SHA256_IV;
    compress(&mut state, &block);
    state_to_bytes(&state)
}

fn state_to_bytes(state: &[u32; 8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, word) in state.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
    }
    out
}

/// Reverse the byte order of a 32-byte array.
///
/// Bitcoin often displays hashes in reverse byte order (little-endian display).
#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Convert a hash to its display format (reversed hex).
pub fn hash_to_display_hex(hash: &[u8; 32]) -> alloc::string::String {
    hex::encode(reverse_bytes(hash))
}

/// Count leading zero bits in the DISPLAYED hash format.
///
/// The displayed hash is byte-reversed, so this counts from the end of the
/// internal array.
pub fn count_leading_zeros(hash: &[u8; 32]) -> u32 {
    let mut zeros = 0u32;
    for byte in hash.iter().rev() {
        if *byte == 0 {
            zeros += 8;
        } else {
            zeros += byte.leading_zeros();
            break;
        }
    }
    zeros
}
