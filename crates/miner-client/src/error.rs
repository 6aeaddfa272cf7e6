//! Error types for the pool session and the mining loop.

use std::io;

use miner_core::{BuildError, SearchError};
use thiserror::Error;

/// Failures talking to the pool. All of these end the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to {address}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("transport error")]
    Io(#[from] io::Error),

    #[error("connection closed by pool")]
    Closed,

    #[error("timed out waiting for the pool")]
    Timeout,

    #[error("pool did not provide a usable job during the handshake")]
    NoJob,

    #[error("invalid JSON from pool: {line}")]
    Json {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {method} parameters")]
    InvalidParams {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("failed to encode request")]
    Encode(#[source] serde_json::Error),
}

/// Failures of the mining loop.
#[derive(Debug, Error)]
pub enum MinerError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to build block header")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Search(#[from] SearchError),
}
