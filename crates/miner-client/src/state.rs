//! Mining loop state and statistics.

use std::time::{Duration, Instant};

use miner_core::MiningContext;
use serde::Serialize;

use crate::stratum::messages::FIRST_SUBMIT_ID;

/// How often the hash rate is reported while searching.
const REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Where an interrupted search picks up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeCursor {
    pub extranonce2: u32,
    /// First nonce not yet searched for `extranonce2`.
    pub nonce: u32,
}

/// State threaded through every iteration of the mining loop.
#[derive(Debug, Clone)]
pub struct MinerState {
    /// Job currently being mined.
    pub context: MiningContext,
    /// Saved position of an interrupted search.
    pub resume: Option<ResumeCursor>,
    /// The current job is done (share found or space exhausted); waiting for the next one.
    pub finished: bool,
    next_request_id: u64,
}

impl MinerState {
    pub fn new(context: MiningContext) -> Self {
        MinerState {
            context,
            resume: None,
            finished: false,
            next_request_id: FIRST_SUBMIT_ID,
        }
    }

    /// Switch to a new job, dropping any in-flight progress.
    pub fn replace_context(&mut self, context: MiningContext) {
        self.context = context;
        self.resume = None;
        self.finished = false;
    }

    /// Mark the current job as done.
    pub fn finish(&mut self) {
        self.resume = None;
        self.finished = true;
    }

    /// Allocate the id for the next `mining.submit`.
    pub fn take_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }
}

/// Mining statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MiningStats {
    /// Nonces searched in completed batches.
    pub total_hashes: u64,
    /// Completed search batches.
    pub batches: u64,
    /// Jobs mined, including the first.
    pub jobs: u64,
    pub shares_submitted: u32,
    pub shares_accepted: u32,
    pub shares_rejected: u32,
    pub shares_unacknowledged: u32,
    /// Current hash rate (hashes per second).
    pub hash_rate: f64,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: f64,
    #[serde(skip)]
    started: Option<Instant>,
    #[serde(skip)]
    last_report: Option<Instant>,
}

impl MiningStats {
    /// Create new stats with the clock started.
    pub fn new() -> Self {
        let now = Instant::now();
        MiningStats {
            jobs: 1,
            started: Some(now),
            last_report: Some(now),
            ..Self::default()
        }
    }

    /// Account for a completed batch.
    ///
    /// Returns true when a hash rate report is due.
    pub fn record_batch(&mut self, nonces: u64) -> bool {
        self.batches += 1;
        self.total_hashes += nonces;
        self.update_hash_rate();

        let now = Instant::now();
        match self.last_report {
            Some(last) if now.duration_since(last) < REPORT_INTERVAL => false,
            _ => {
                self.last_report = Some(now);
                true
            }
        }
    }

    /// Update hash rate based on elapsed time.
    pub fn update_hash_rate(&mut self) {
        if let Some(started) = self.started {
            self.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        }
        if self.elapsed_ms > 0.0 {
            self.hash_rate = (self.total_hashes as f64) / (self.elapsed_ms / 1000.0);
        }
    }

    /// Format hash rate for display.
    pub fn format_hash_rate(&self) -> String {
        if self.hash_rate >= 1_000_000_000.0 {
            format!("{:.2} GH/s", self.hash_rate / 1_000_000_000.0)
        } else if self.hash_rate >= 1_000_000.0 {
            format!("{:.2} MH/s", self.hash_rate / 1_000_000.0)
        } else if self.hash_rate >= 1_000.0 {
            format!("{:.2} KH/s", self.hash_rate / 1_000.0)
        } else {
            format!("{:.2} H/s", self.hash_rate)
        }
    }

    /// One-line JSON summary for the log.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
