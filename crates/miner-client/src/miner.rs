//! Mining controller: drives the search engine and the pool session.
//!
//! One thread of control owns both. Pool data is only looked at between
//! search batches, so the batch size bounds how long a new job can wait.
//! Progress through a job is tracked as an `(extranonce2, nonce)` cursor
//! that survives interruptions which do not replace the job.

use std::ops::ControlFlow;
use std::thread;

use miner_core::hash::{count_leading_zeros, hash_to_display_hex};
use miner_core::target::format_difficulty;
use miner_core::{
    BlockHeader, BuildError, MiningContext, SearchEngine, SearchJob, SearchOutcome,
    MIN_EXTRANONCE2_SIZE,
};
use tracing::{debug, info, warn};

use crate::config::{Lifecycle, MinerConfig};
use crate::error::{MinerError, SessionError};
use crate::state::{MinerState, MiningStats, ResumeCursor};
use crate::stratum::{Session, ShareStatus, Transport};

/// Extranonce2 values tried per job run from zero up to, not including, this.
pub const EXTRANONCE2_LIMIT: u32 = 0xFFFF;

/// Outcome of mining the current job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineResult {
    Found { extranonce2: u32, nonce: u32 },
    /// Every extranonce2 was searched without a share.
    Exhausted,
    /// Pool data arrived mid-search; `resume_nonce` is the first nonce not yet tried.
    Interrupted { extranonce2: u32, resume_nonce: u32 },
}

/// The main mining controller.
pub struct Miner<E, T> {
    engine: E,
    session: Session<T>,
    config: MinerConfig,
    state: MinerState,
    stats: MiningStats,
}

impl<E: SearchEngine, T: Transport> Miner<E, T> {
    /// Create a miner for an established session and its first job.
    pub fn new(
        engine: E,
        session: Session<T>,
        context: MiningContext,
        config: MinerConfig,
    ) -> Self {
        Miner {
            engine,
            session,
            config,
            state: MinerState::new(context),
            stats: MiningStats::new(),
        }
    }

    pub fn state(&self) -> &MinerState {
        &self.state
    }

    pub fn stats(&self) -> &MiningStats {
        &self.stats
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mine until the pool goes away or, in single-share mode, a share is submitted.
    ///
    /// A closed connection is a normal end. Anything else that stops the
    /// loop is returned as an error.
    pub fn run(&mut self) -> Result<(), MinerError> {
        info!(
            job_id = %self.state.context.job_id,
            mode = ?self.config.mode,
            batch_size = self.config.mode.batch_size(),
            "Mining started"
        );

        let result = loop {
            if self.session.is_closed() {
                info!("Pool closed the connection");
                break Ok(());
            }
            match self.step() {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break Ok(()),
                Err(MinerError::Session(SessionError::Closed)) => {
                    info!("Pool closed the connection");
                    break Ok(());
                }
                Err(err) => break Err(err),
            }
        };

        self.stats.update_hash_rate();
        info!(
            hash_rate = %self.stats.format_hash_rate(),
            "Mining stopped: {}",
            self.stats.to_json()
        );
        result
    }

    /// One iteration: mine the current job, or wait for a new one.
    pub fn step(&mut self) -> Result<ControlFlow<()>, MinerError> {
        if self.state.finished {
            return self.idle();
        }
        let result = self.mine_job()?;
        self.handle(result)
    }

    /// Search the current job from its resume cursor.
    pub fn mine_job(&mut self) -> Result<MineResult, MinerError> {
        let context = self.state.context.clone();
        let params = &context.params;

        if params.extranonce2_size < MIN_EXTRANONCE2_SIZE {
            return Err(BuildError::Extranonce2TooSmall(params.extranonce2_size).into());
        }

        let target = params.target();
        let cursor = self.state.resume.unwrap_or(ResumeCursor { extranonce2: 0, nonce: 0 });
        debug!(
            job_id = %context.job_id,
            target = %target,
            extranonce2 = cursor.extranonce2,
            nonce = cursor.nonce,
            "Searching"
        );

        for extranonce2 in cursor.extranonce2..EXTRANONCE2_LIMIT {
            let header = BlockHeader::for_job(params, extranonce2)?;
            let start_nonce = if extranonce2 == cursor.extranonce2 { cursor.nonce } else { 0 };
            let job = SearchJob {
                work: header.work(),
                target,
                start_nonce,
                batch_size: self.config.mode.batch_size(),
            };

            match self.search(&job)? {
                SearchOutcome::Found(nonce) => {
                    return Ok(MineResult::Found { extranonce2, nonce });
                }
                SearchOutcome::Interrupted(resume_nonce) => {
                    return Ok(MineResult::Interrupted { extranonce2, resume_nonce });
                }
                SearchOutcome::Exhausted => {
                    self.state.resume = None;
                    debug!(extranonce2, "Nonce space exhausted");
                }
            }
        }

        Ok(MineResult::Exhausted)
    }

    /// Run one search, checking the pool between batches.
    ///
    /// In background mode every batch is followed by a pause, including the
    /// last one of a search.
    fn search(&mut self, job: &SearchJob) -> Result<SearchOutcome, MinerError> {
        let Miner { engine, session, config, stats, .. } = self;
        let batch_delay = config.mode.batch_delay();
        let mut failure: Option<SessionError> = None;

        let outcome = engine.search(job, &mut || {
            if stats.record_batch(u64::from(job.batch_size)) {
                info!(hash_rate = %stats.format_hash_rate(), "Hashing");
            }
            if let Some(delay) = batch_delay {
                thread::sleep(delay);
            }
            if session.is_closed() {
                return true;
            }
            match session.has_pending() {
                Ok(pending) => pending,
                Err(err) => {
                    failure = Some(err);
                    true
                }
            }
        })?;

        if let Some(err) = failure {
            return Err(err.into());
        }

        // The hook already paused after an interrupted batch.
        if let Some(delay) = batch_delay {
            if !matches!(outcome, SearchOutcome::Interrupted(_)) {
                thread::sleep(delay);
            }
        }
        Ok(outcome)
    }

    /// Act on a mining result.
    pub fn handle(&mut self, result: MineResult) -> Result<ControlFlow<()>, MinerError> {
        match result {
            MineResult::Found { extranonce2, nonce } => self.submit(extranonce2, nonce),
            MineResult::Exhausted => {
                info!(job_id = %self.state.context.job_id, "Not found");
                self.state.finish();
                Ok(match self.config.lifecycle {
                    Lifecycle::SingleShare => ControlFlow::Break(()),
                    Lifecycle::Daemon => ControlFlow::Continue(()),
                })
            }
            MineResult::Interrupted { extranonce2, resume_nonce } => {
                self.state.resume = Some(ResumeCursor { extranonce2, nonce: resume_nonce });
                match self.session.poll_interrupt(&self.state.context, false)? {
                    Some(context) => self.replace_context(context),
                    None => debug!(extranonce2, resume_nonce, "Resuming current job"),
                }
                Ok(ControlFlow::Continue(()))
            }
        }
    }

    fn submit(&mut self, extranonce2: u32, nonce: u32) -> Result<ControlFlow<()>, MinerError> {
        let request_id = self.state.take_request_id();
        let context = &self.state.context;
        let mut header = BlockHeader::for_job(&context.params, extranonce2)?;
        header.nonce = nonce;
        let hash = header.hash();
        info!(
            job_id = %context.job_id,
            extranonce2,
            nonce = %format!("{:08x}", nonce),
            hash = %hash_to_display_hex(&hash),
            leading_zeros = count_leading_zeros(&hash),
            "Found share"
        );

        let status = self.session.submit_share(
            request_id,
            &context.job_id,
            extranonce2,
            context.params.extranonce2_size,
            &context.params.time,
            nonce,
        )?;

        self.stats.shares_submitted += 1;
        match status {
            ShareStatus::Accepted => {
                self.stats.shares_accepted += 1;
                info!(request_id, "Share accepted");
            }
            ShareStatus::Rejected(error) => {
                self.stats.shares_rejected += 1;
                warn!(request_id, ?error, "Share rejected");
            }
            ShareStatus::Unacknowledged => {
                self.stats.shares_unacknowledged += 1;
                warn!(request_id, "No response to share");
            }
        }

        if self.config.lifecycle == Lifecycle::SingleShare {
            return Ok(ControlFlow::Break(()));
        }

        thread::sleep(self.config.share_cooldown);
        self.state.finish();
        Ok(ControlFlow::Continue(()))
    }

    /// Wait for the pool to send something worth mining.
    fn idle(&mut self) -> Result<ControlFlow<()>, MinerError> {
        thread::sleep(self.config.idle_poll);
        if self.session.has_pending()? {
            if let Some(context) = self.session.poll_interrupt(&self.state.context, true)? {
                self.replace_context(context);
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn replace_context(&mut self, context: MiningContext) {
        info!(
            job_id = %context.job_id,
            difficulty = %format_difficulty(context.params.difficulty as f64),
            "New job"
        );
        self.stats.jobs += 1;
        self.state.replace_context(context);
    }
}
