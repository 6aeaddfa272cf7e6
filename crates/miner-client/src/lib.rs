//! Stratum V1 mining client.
//!
//! This crate provides:
//! - A Stratum V1 pool session over TCP (handshake, job updates, share submission)
//! - The mining controller that feeds jobs to a search engine and reacts to pool data
//! - Command line configuration for the `stratum-miner` binary

pub mod config;
pub mod error;
pub mod miner;
pub mod state;
pub mod stratum;

#[cfg(test)]
mod mock;

pub use config::{Arguments, Lifecycle, MinerConfig, MiningMode};
pub use error::{MinerError, SessionError};
pub use miner::{MineResult, Miner};
pub use state::{MinerState, MiningStats, ResumeCursor};
pub use stratum::{Session, ShareStatus, TcpTransport, Transport};

/// Get the library version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
