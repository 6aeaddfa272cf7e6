//! Stratum V1 session: handshake, job tracking and share submission.

use std::collections::VecDeque;
use std::time::Duration;

use miner_core::{format_extranonce2, MiningContext};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::messages::{
    Message, Notify, Request, SetDifficulty, SubscribeResult, AUTHORIZE_ID, NOTIFY,
    SET_DIFFICULTY, SUBSCRIBE_ID,
};
use super::transport::{TcpTransport, Transport};
use crate::error::SessionError;

/// Above this initial difficulty the client asks the pool for an easier one.
pub const SUGGEST_DIFFICULTY_THRESHOLD: u64 = 128;

/// How long to wait for the pool to acknowledge a share.
const SUBMIT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Pool verdict on a submitted share.
#[derive(Debug, Clone, PartialEq)]
pub enum ShareStatus {
    Accepted,
    Rejected(Option<Value>),
    /// No acknowledgement arrived in time.
    Unacknowledged,
}

/// Derive the current job from a batch of pool lines.
///
/// Lines are applied in order on top of `previous`. Returns the job (if one
/// can be formed yet) and whether a `mining.notify` in this batch asked for
/// in-flight work to be dropped. Blank lines are skipped; malformed ones are
/// an error.
pub fn derive_context(
    lines: &[String],
    previous: Option<&MiningContext>,
) -> Result<(Option<MiningContext>, bool), SessionError> {
    let mut context = previous.cloned().unwrap_or_default();
    let mut clean_jobs = false;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message: Message = serde_json::from_str(line).map_err(|source| SessionError::Json {
            line: line.to_string(),
            source,
        })?;

        match message {
            Message::Response { id: Some(SUBSCRIBE_ID), result, .. } => {
                let result = result.ok_or_else(|| {
                    SessionError::Protocol("mining.subscribe was refused".to_string())
                })?;
                let subscribed: SubscribeResult = serde_json::from_value(result).map_err(
                    |source| SessionError::InvalidParams { method: "mining.subscribe".into(), source },
                )?;
                context.params.extranonce1 = subscribed.extranonce1;
                context.params.extranonce2_size = subscribed.extranonce2_size;
            }
            Message::Response { .. } => {}
            Message::Notification { method, params } if method == SET_DIFFICULTY => {
                let difficulty: SetDifficulty = serde_json::from_value(params)
                    .map_err(|source| SessionError::InvalidParams { method, source })?;
                context.params.difficulty = difficulty.as_u64();
            }
            Message::Notification { method, params } if method == NOTIFY => {
                let notify: Notify = serde_json::from_value(params)
                    .map_err(|source| SessionError::InvalidParams { method, source })?;
                context.job_id = notify.job_id;
                context.params.prev_hash = notify.prev_hash;
                context.params.coinbase_part1 = notify.coinbase_part1;
                context.params.coinbase_part2 = notify.coinbase_part2;
                context.params.merkle_branches = notify.merkle_branches;
                context.params.version = notify.version;
                context.params.bits = notify.bits;
                context.params.time = notify.time;
                clean_jobs = notify.clean_jobs;
            }
            Message::Notification { method, .. } => {
                debug!("Ignoring {}", method);
            }
        }
    }

    if context.params.extranonce2_size == 0 || context.params.time.is_empty() {
        return Ok((None, false));
    }

    Ok((Some(context), clean_jobs))
}

/// Authorization verdict found among handshake lines, if any.
fn authorization(lines: &[String]) -> Option<bool> {
    lines
        .iter()
        .filter_map(|line| serde_json::from_str::<Message>(line.trim()).ok())
        .find_map(|message| match message {
            Message::Response { id: Some(AUTHORIZE_ID), result, .. } => {
                Some(result.and_then(|r| r.as_bool()).unwrap_or(false))
            }
            _ => None,
        })
}

/// An open connection to the pool plus the worker credentials.
pub struct Session<T> {
    transport: T,
    worker_name: String,
    password: String,
    /// Lines read while waiting for something else, not yet processed.
    backlog: VecDeque<String>,
}

impl Session<TcpTransport> {
    /// Connect over TCP and run the handshake.
    pub fn connect(
        host: &str,
        port: u16,
        worker_name: &str,
        password: &str,
        handshake_timeout: Duration,
    ) -> Result<(Self, MiningContext), SessionError> {
        info!("Connecting to {}:{}", host, port);
        let mut transport = TcpTransport::connect(host, port)?;
        transport.set_read_timeout(Some(handshake_timeout))?;

        let (mut session, context) = Session::handshake(transport, worker_name, password)?;
        session.transport.set_read_timeout(None)?;
        Ok((session, context))
    }
}

impl<T: Transport> Session<T> {
    /// Wrap an already established transport.
    pub fn new(transport: T, worker_name: &str, password: &str) -> Self {
        Session {
            transport,
            worker_name: worker_name.to_string(),
            password: password.to_string(),
            backlog: VecDeque::new(),
        }
    }

    /// Subscribe, authorize and wait for the first job.
    pub fn handshake(
        transport: T,
        worker_name: &str,
        password: &str,
    ) -> Result<(Self, MiningContext), SessionError> {
        let mut session = Session::new(transport, worker_name, password);

        session.send(&Request::subscribe())?;
        let subscribed = session.read()?.ok_or(SessionError::NoJob)?;
        let mut lines = vec![subscribed];

        let authorize = Request::authorize(&session.worker_name, &session.password);
        session.send(&authorize)?;

        while derive_context(&lines, None)?.0.is_none() {
            lines.push(session.read()?.ok_or(SessionError::NoJob)?);
        }
        lines.extend(session.drain()?);

        let context = derive_context(&lines, None)?.0.ok_or(SessionError::NoJob)?;

        match authorization(&lines) {
            Some(false) => warn!("Pool did not authorize worker {}", session.worker_name),
            Some(true) => info!("Authorized worker {}", session.worker_name),
            None => {}
        }
        info!(
            job_id = %context.job_id,
            difficulty = context.params.difficulty,
            extranonce2_size = context.params.extranonce2_size,
            "Subscribed"
        );

        if context.params.difficulty > SUGGEST_DIFFICULTY_THRESHOLD {
            session.send(&Request::suggest_difficulty(SUGGEST_DIFFICULTY_THRESHOLD))?;
        }

        Ok((session, context))
    }

    /// Read newly arrived pool data and decide whether it replaces the job.
    ///
    /// A replacement is returned only when something actually changed and
    /// the pool asked for clean jobs, the caller was idle, or the difficulty
    /// moved. Otherwise the caller resumes its previous search.
    pub fn poll_interrupt(
        &mut self,
        previous: &MiningContext,
        was_idle: bool,
    ) -> Result<Option<MiningContext>, SessionError> {
        info!("Stratum message interrupts mining");
        let lines = self.drain()?;
        let (context, clean_jobs) = derive_context(&lines, Some(previous))?;

        Ok(context.filter(|context| {
            context != previous
                && (clean_jobs || was_idle || context.params.difficulty != previous.params.difficulty)
        }))
    }

    /// Submit a share and wait for the pool's verdict.
    pub fn submit_share(
        &mut self,
        request_id: u64,
        job_id: &str,
        extranonce2: u32,
        extranonce2_size: usize,
        ntime: &str,
        nonce: u32,
    ) -> Result<ShareStatus, SessionError> {
        let extranonce2 = format_extranonce2(extranonce2, extranonce2_size);
        let nonce = format!("{:08x}", nonce);
        let request =
            Request::submit(request_id, &self.worker_name, job_id, &extranonce2, ntime, &nonce);
        self.send(&request)?;

        self.transport.set_read_timeout(Some(SUBMIT_ACK_TIMEOUT))?;
        let status = self.await_ack(request_id);
        self.transport.set_read_timeout(None)?;
        status
    }

    fn await_ack(&mut self, request_id: u64) -> Result<ShareStatus, SessionError> {
        loop {
            let line = match self.read() {
                Ok(Some(line)) => line,
                Ok(None) => return Err(SessionError::Closed),
                Err(SessionError::Timeout) => return Ok(ShareStatus::Unacknowledged),
                Err(err) => return Err(err),
            };

            match serde_json::from_str::<Message>(line.trim()) {
                Ok(Message::Response { id: Some(id), result, error }) if id == request_id => {
                    return Ok(match (result, error) {
                        (Some(Value::Bool(true)), None) => ShareStatus::Accepted,
                        (_, error) => ShareStatus::Rejected(error),
                    });
                }
                _ => self.backlog.push_back(line),
            }
        }
    }

    /// Whether unread pool data is waiting.
    pub fn has_pending(&mut self) -> Result<bool, SessionError> {
        if !self.backlog.is_empty() {
            return Ok(true);
        }
        self.transport.has_pending()
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Everything readable right now, backlog first.
    fn drain(&mut self) -> Result<Vec<String>, SessionError> {
        let mut lines: Vec<String> = self.backlog.drain(..).collect();
        while self.transport.has_pending()? {
            match self.read()? {
                Some(line) => lines.push(line),
                None => break,
            }
        }
        Ok(lines)
    }

    fn send(&mut self, request: &Request<'_>) -> Result<(), SessionError> {
        let line = request.to_line()?;
        debug!("Stratum OUT: {}", line);
        self.transport.send_line(&line)
    }

    fn read(&mut self) -> Result<Option<String>, SessionError> {
        let line = self.transport.read_line()?;
        if let Some(line) = &line {
            debug!("Stratum IN:  {}", line.chars().take(100).collect::<String>());
        }
        Ok(line)
    }
}
