//! Test doubles for the pool connection and the search backend.

use std::collections::VecDeque;
use std::time::Duration;

use miner_core::{SearchEngine, SearchError, SearchJob, SearchOutcome};
use serde_json::Value;

use crate::error::SessionError;
use crate::stratum::Transport;

/// In-memory pool connection.
///
/// Reads pop scripted lines; an empty script reads as end of stream.
/// With `auto_ack` set, every `mining.submit` is accepted immediately. With
/// `hang_up` set, the pool disconnects once the script has been read.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    pub(crate) inbound: VecDeque<String>,
    pub(crate) sent: Vec<String>,
    pub(crate) auto_ack: bool,
    pub(crate) hang_up: bool,
    pub(crate) closed: bool,
}

impl MockTransport {
    pub(crate) fn new(lines: &[&str]) -> Self {
        MockTransport {
            inbound: lines.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn submits(&self) -> Vec<Value> {
        self.sent
            .iter()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter(|request| request["method"] == "mining.submit")
            .collect()
    }
}

impl Transport for MockTransport {
    fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.sent.push(line.to_string());

        if self.auto_ack {
            if let Ok(request) = serde_json::from_str::<Value>(line) {
                if request["method"] == "mining.submit" {
                    self.inbound
                        .push_back(format!(r#"{{"id":{},"result":true,"error":null}}"#, request["id"]));
                }
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>, SessionError> {
        let line = self.inbound.pop_front();
        if line.is_none() {
            self.closed = true;
        }
        Ok(line)
    }

    fn has_pending(&mut self) -> Result<bool, SessionError> {
        if self.inbound.is_empty() && self.hang_up {
            self.closed = true;
        }
        Ok(!self.inbound.is_empty())
    }

    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> Result<(), SessionError> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Search backend that replays scripted outcomes and records every job.
///
/// Each search runs the between-batches hook once and records its answer
/// before returning the next scripted outcome. Once the script runs out
/// every search reports `Exhausted`.
#[derive(Debug, Default)]
pub(crate) struct ScriptedEngine {
    pub(crate) outcomes: VecDeque<SearchOutcome>,
    pub(crate) jobs: Vec<SearchJob>,
    pub(crate) hook_results: Vec<bool>,
}

impl ScriptedEngine {
    pub(crate) fn new(outcomes: &[SearchOutcome]) -> Self {
        ScriptedEngine {
            outcomes: outcomes.iter().copied().collect(),
            ..Self::default()
        }
    }
}

impl SearchEngine for ScriptedEngine {
    fn search(
        &mut self,
        job: &SearchJob,
        between_batches: &mut dyn FnMut() -> bool,
    ) -> Result<SearchOutcome, SearchError> {
        self.jobs.push(*job);
        self.hook_results.push(between_batches());
        Ok(self.outcomes.pop_front().unwrap_or(SearchOutcome::Exhausted))
    }
}

/// Pool messages and the jobs they describe.
pub(crate) mod fixtures {
    use miner_core::{MineParameters, MiningContext};
    use serde_json::json;

    pub(crate) const SUBSCRIBE_RESPONSE: &str = r#"{"id":1,"result":[[["mining.set_difficulty","b4b6693b72a50c7116db18d6497cac52"],["mining.notify","ae6812eb4cd7735a302a8a9dd95cf71f"]],"08000002",4],"error":null}"#;
    pub(crate) const AUTHORIZE_RESPONSE: &str = r#"{"id":2,"result":true,"error":null}"#;

    const PREV_HASH: &str = "ab02cd818b9e567ee21793cddef299feb29ad444a41b85b8000008a300000000";
    const COINBASE_PART1: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff20020862062f503253482f04b8864e5008";
    const COINBASE_PART2: &str = "072f736c7573682f000000000100f2052a010000001976a914d23fcdf86f7e756a64a7a9688ef9903327048ed988ac00000000";
    const BRANCH: &str = "e320b6c2fffc8d750423db8b1eb942ae710e951ed797f7affc8892b0f1fc122b";
    const VERSION: &str = "20000000";
    const BITS: &str = "1a44b9f2";
    const TIME: &str = "504e86b9";

    pub(crate) fn notify(job_id: &str, clean_jobs: bool) -> String {
        json!({
            "id": null,
            "method": "mining.notify",
            "params": [job_id, PREV_HASH, COINBASE_PART1, COINBASE_PART2, [BRANCH], VERSION, BITS, TIME, clean_jobs],
        })
        .to_string()
    }

    pub(crate) fn set_difficulty(difficulty: f64) -> String {
        json!({ "id": null, "method": "mining.set_difficulty", "params": [difficulty] }).to_string()
    }

    pub(crate) fn context(job_id: &str, difficulty: u64) -> MiningContext {
        MiningContext {
            job_id: job_id.to_string(),
            params: MineParameters {
                extranonce1: "08000002".to_string(),
                extranonce2_size: 4,
                difficulty,
                prev_hash: PREV_HASH.to_string(),
                coinbase_part1: COINBASE_PART1.to_string(),
                coinbase_part2: COINBASE_PART2.to_string(),
                merkle_branches: vec![BRANCH.to_string()],
                version: VERSION.to_string(),
                bits: BITS.to_string(),
                time: TIME.to_string(),
            },
        }
    }
}
