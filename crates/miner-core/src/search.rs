//! Nonce search over a header midstate.
//!
//! A [`SearchEngine`] scans the 32-bit nonce space of one [`Work`] in fixed
//! size batches. Between batches it hands control back to the caller, which
//! decides whether the search should stop so newer pool data can be handled.

use alloc::string::String;
use crate::block::Work;
use crate::target::Target;

/// Size of the 32-bit nonce space.
const NONCE_SPACE: u64 = 1 << 32;

/// Result of searching one work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A nonce whose hash meets the target.
    Found(u32),
    /// Every nonce from the start position was tried.
    Exhausted,
    /// Stopped between batches; `resume_nonce` is the first nonce not yet tried.
    Interrupted(u32),
}

/// One search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchJob {
    pub work: Work,
    pub target: Target,
    /// First nonce to try.
    pub start_nonce: u32,
    /// Nonces per batch; the interrupt hook runs after each one.
    pub batch_size: u32,
}

/// Backend failure. Not retried by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The compute backend reported an error
    Backend(String),
}

impl core::fmt::Display for SearchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SearchError::Backend(msg) => write!(f, "Search backend failed: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SearchError {}

/// A compute backend that scans nonces for a work unit.
pub trait SearchEngine {
    /// Search from `job.start_nonce` upward.
    ///
    /// `between_batches` is called after every completed batch that neither
    /// found a share nor reached the end of the nonce space. Returning `true`
    /// stops the search with [`SearchOutcome::Interrupted`].
    fn search(
        &mut self,
        job: &SearchJob,
        between_batches: &mut dyn FnMut() -> bool,
    ) -> Result<SearchOutcome, SearchError>;
}

/// Portable software backend. Hashes one nonce at a time on the calling thread.
#[derive(Debug, Default)]
pub struct CpuSearchEngine {
    hashes: u64,
}

impl CpuSearchEngine {
    /// Create a new CPU search engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total hashes computed by this engine.
    pub fn hashes_computed(&self) -> u64 {
        self.hashes
    }
}

impl SearchEngine for CpuSearchEngine {
    fn search(
        &mut self,
        job: &SearchJob,
        between_batches: &mut dyn FnMut() -> bool,
    ) -> Result<SearchOutcome, SearchError> {
        let batch = u64::from(job.batch_size.max(1));
        let mut next = u64::from(job.start_nonce);

        while next < NONCE_SPACE {
            let end = (next + batch).min(NONCE_SPACE);
            for nonce in next..end {
                let nonce = nonce as u32;
                let hash = job.work.hash_with_nonce(nonce);
                if job.target.is_met_by(&hash) {
                    self.hashes += u64::from(nonce) - next + 1;
                    return Ok(SearchOutcome::Found(nonce));
                }
            }
            self.hashes += end - next;
            next = end;

            if next < NONCE_SPACE && between_batches() {
                return Ok(SearchOutcome::Interrupted(next as u32));
            }
        }

        Ok(SearchOutcome::Exhausted)
    }
}
