//! Mining job data announced by a Stratum pool.

use alloc::string::String;
use alloc::vec::Vec;
use crate::target::Target;

/// Everything needed to build candidate headers for one pool job.
///
/// All byte fields are kept exactly as the pool sent them (hex, display
/// order). A new job replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MineParameters {
    /// Pool-assigned extranonce prefix.
    pub extranonce1: String,
    /// Number of bytes the miner chooses for extranonce2.
    pub extranonce2_size: usize,
    /// Pool share difficulty. 0 means "below 1", served by the fallback target.
    pub difficulty: u64,
    /// Previous block hash in Stratum's word-swapped form.
    pub prev_hash: String,
    /// Coinbase bytes preceding the extranonces.
    pub coinbase_part1: String,
    /// Coinbase bytes following the extranonces.
    pub coinbase_part2: String,
    /// Merkle branch hashes, folded in order.
    pub merkle_branches: Vec<String>,
    /// Block version (4 bytes).
    pub version: String,
    /// Compact network target (4 bytes).
    pub bits: String,
    /// Block time (4 bytes).
    pub time: String,
}

impl MineParameters {
    /// Share target for this job's difficulty.
    pub fn target(&self) -> Target {
        Target::from_difficulty(self.difficulty)
    }
}

/// A pool job: its identifier plus the parameters to mine it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MiningContext {
    pub job_id: String,
    pub params: MineParameters,
}
