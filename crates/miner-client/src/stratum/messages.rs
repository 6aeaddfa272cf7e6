//! Stratum V1 wire messages.
//!
//! Every message is one JSON object per line. Requests carry a numeric id;
//! pool notifications carry `"id": null` (or no id at all).

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::SessionError;

pub const SUBSCRIBE_ID: u64 = 1;
pub const AUTHORIZE_ID: u64 = 2;
pub const SUGGEST_DIFFICULTY_ID: u64 = 3;
/// First id used for `mining.submit`; later submits count up from here.
pub const FIRST_SUBMIT_ID: u64 = 4;

pub const SUBSCRIBE: &str = "mining.subscribe";
pub const AUTHORIZE: &str = "mining.authorize";
pub const SUGGEST_DIFFICULTY: &str = "mining.suggest_difficulty";
pub const SUBMIT: &str = "mining.submit";
pub const NOTIFY: &str = "mining.notify";
pub const SET_DIFFICULTY: &str = "mining.set_difficulty";

/// A client request. Field order matches what pools expect on the wire.
#[derive(Debug, Serialize, PartialEq)]
pub struct Request<'a> {
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> Request<'a> {
    pub fn subscribe() -> Self {
        Request { id: SUBSCRIBE_ID, method: SUBSCRIBE, params: json!([]) }
    }

    pub fn authorize(worker_name: &str, password: &str) -> Self {
        Request {
            id: AUTHORIZE_ID,
            method: AUTHORIZE,
            params: json!([worker_name, password]),
        }
    }

    pub fn suggest_difficulty(difficulty: u64) -> Self {
        Request {
            id: SUGGEST_DIFFICULTY_ID,
            method: SUGGEST_DIFFICULTY,
            params: json!([difficulty]),
        }
    }

    pub fn submit(
        id: u64,
        worker_name: &str,
        job_id: &str,
        extranonce2: &str,
        ntime: &str,
        nonce: &str,
    ) -> Self {
        Request {
            id,
            method: SUBMIT,
            params: json!([worker_name, job_id, extranonce2, ntime, nonce]),
        }
    }

    /// Serialize to a single line without the trailing newline.
    pub fn to_line(&self) -> Result<String, SessionError> {
        serde_json::to_string(self).map_err(SessionError::Encode)
    }
}

/// An inbound line, classified.
#[derive(Debug, PartialEq)]
pub enum Message {
    /// Reply to one of our requests.
    Response {
        id: Option<u64>,
        result: Option<Value>,
        error: Option<Value>,
    },
    /// Pool-initiated message.
    Notification { method: String, params: Value },
}

/// Pools send notifications with `"id": null`, a missing id, or occasionally a
/// numeric id. A numeric id always marks a response to one of our requests.
impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let object = value
            .as_object()
            .ok_or_else(|| de::Error::custom("expected a JSON object"))?;

        let id = object.get("id").and_then(Value::as_u64);
        let method = object.get("method").and_then(Value::as_str);

        match (id, method) {
            (None, Some(method)) => Ok(Message::Notification {
                method: method.to_string(),
                params: object.get("params").cloned().unwrap_or(Value::Null),
            }),
            _ if id.is_some() || object.contains_key("result") || object.contains_key("error") => {
                Ok(Message::Response {
                    id,
                    result: object.get("result").filter(|v| !v.is_null()).cloned(),
                    error: object.get("error").filter(|v| !v.is_null()).cloned(),
                })
            }
            _ => Err(de::Error::custom("unknown message format")),
        }
    }
}

/// `mining.subscribe` result: `[subscriptions, extranonce1, extranonce2_size]`.
#[derive(Debug, PartialEq)]
pub struct SubscribeResult {
    pub extranonce1: String,
    pub extranonce2_size: usize,
}

impl<'de> Deserialize<'de> for SubscribeResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (_subscriptions, extranonce1, extranonce2_size) =
            <(Value, String, usize)>::deserialize(deserializer)?;
        Ok(SubscribeResult { extranonce1, extranonce2_size })
    }
}

/// `mining.set_difficulty` parameters.
#[derive(Debug, PartialEq)]
pub struct SetDifficulty(pub f64);

impl<'de> Deserialize<'de> for SetDifficulty {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (difficulty,) = <(f64,)>::deserialize(deserializer)?;
        Ok(SetDifficulty(difficulty))
    }
}

impl SetDifficulty {
    /// Integer difficulty; anything below 1 becomes the 0 sentinel.
    pub fn as_u64(&self) -> u64 {
        if self.0 < 1.0 {
            0
        } else {
            self.0 as u64
        }
    }
}

/// `mining.notify` parameters.
#[derive(Debug, PartialEq)]
pub struct Notify {
    pub job_id: String,
    pub prev_hash: String,
    pub coinbase_part1: String,
    pub coinbase_part2: String,
    pub merkle_branches: Vec<String>,
    pub version: String,
    pub bits: String,
    pub time: String,
    pub clean_jobs: bool,
}

impl<'de> Deserialize<'de> for Notify {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (
            job_id,
            prev_hash,
            coinbase_part1,
            coinbase_part2,
            merkle_branches,
            version,
            bits,
            time,
            clean_jobs,
        ) = <(String, String, String, String, Vec<String>, String, String, String, bool)>::deserialize(
            deserializer,
        )?;

        Ok(Notify {
            job_id,
            prev_hash,
            coinbase_part1,
            coinbase_part2,
            merkle_branches,
            version,
            bits,
            time,
            clean_jobs,
        })
    }
}
