//! Core Bitcoin mining logic for the Stratum miner.
//!
//! This crate provides pure Rust implementations of:
//! - SHA256 double-hashing and header midstate computation
//! - Pool difficulty to share target conversion
//! - Coinbase assembly and merkle root folding for Stratum jobs
//! - Block header construction and search input derivation
//! - The nonce search engine interface and a CPU backend

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod block;
pub mod coinbase;
pub mod hash;
pub mod job;
pub mod merkle;
pub mod search;
pub mod target;

pub use block::{BlockHeader, BuildError, Work};
pub use coinbase::{format_extranonce2, CoinbaseBuilder, MIN_EXTRANONCE2_SIZE};
pub use hash::{double_sha256, sha256_partial, Sha256State};
pub use job::{MineParameters, MiningContext};
pub use merkle::merkle_root;
pub use search::{CpuSearchEngine, SearchEngine, SearchError, SearchJob, SearchOutcome};
pub use target::Target;
