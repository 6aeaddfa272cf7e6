//! Command line arguments and miner configuration.

use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use tracing::warn;

/// Nonces each search thread covers per batch.
const NONCES_PER_THREAD: u32 = 0x100;

/// How hard to mine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiningMode {
    /// Large batches, no pauses.
    #[default]
    Full,
    /// Small batches with a pause after each, leaving room for other work.
    Background,
}

impl MiningMode {
    /// Threads per search batch.
    pub fn grid_size(self) -> u32 {
        match self {
            MiningMode::Full => 65_536,
            MiningMode::Background => 16_384,
        }
    }

    /// Nonces per search batch.
    pub fn batch_size(self) -> u32 {
        self.grid_size() * NONCES_PER_THREAD
    }

    /// Pause after each batch.
    pub fn batch_delay(self) -> Option<Duration> {
        match self {
            MiningMode::Full => None,
            MiningMode::Background => Some(Duration::from_millis(100)),
        }
    }
}

impl FromStr for MiningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(MiningMode::Full),
            "background" => Ok(MiningMode::Background),
            other => Err(format!("unknown mining mode: {}", other)),
        }
    }
}

/// What to do after a share has been submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Keep running and wait for the next job.
    #[default]
    Daemon,
    /// Stop after the first share.
    SingleShare,
}

/// Mining loop settings.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    pub mode: MiningMode,
    pub lifecycle: Lifecycle,
    /// Poll interval while waiting for a new job.
    pub idle_poll: Duration,
    /// Pause after submitting a share.
    pub share_cooldown: Duration,
}

impl Default for MinerConfig {
    fn default() -> Self {
        MinerConfig {
            mode: MiningMode::Full,
            lifecycle: Lifecycle::Daemon,
            idle_poll: Duration::from_secs(1),
            share_cooldown: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "stratum-miner", version, about = "Bitcoin Stratum V1 miner")]
pub struct Arguments {
    /// Pool host name or address.
    pub host: String,

    /// Pool port.
    pub port: u16,

    /// Worker name sent with mining.authorize.
    pub worker_name: String,

    /// Worker password.
    pub password: String,

    /// "full" or "background". Anything else mines in full mode.
    #[arg(default_value = "full")]
    pub mode: String,

    /// Exit after the first submitted share instead of waiting for new jobs.
    #[arg(long)]
    pub once: bool,

    /// Seconds to wait for the pool during the handshake.
    #[arg(long, default_value_t = 30, env = "STRATUM_HANDSHAKE_TIMEOUT")]
    pub handshake_timeout: u64,

    /// Log filter, e.g. "info" or "miner_client=debug".
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,
}

impl Arguments {
    pub fn mining_mode(&self) -> MiningMode {
        self.mode.parse().unwrap_or_else(|err| {
            warn!("{}, mining in full mode", err);
            MiningMode::Full
        })
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout)
    }

    pub fn miner_config(&self) -> MinerConfig {
        MinerConfig {
            mode: self.mining_mode(),
            lifecycle: if self.once {
                Lifecycle::SingleShare
            } else {
                Lifecycle::Daemon
            },
            ..MinerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_sizes() {
        assert_eq!(MiningMode::Full.batch_size(), 1 << 24);
        assert_eq!(MiningMode::Background.batch_size(), 1 << 22);
        assert_eq!(MiningMode::Full.batch_delay(), None);
        assert_eq!(MiningMode::Background.batch_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_parse_positional_arguments() {
        let args = Arguments::try_parse_from([
            "stratum-miner",
            "pool.example.com",
            "3333",
            "worker.1",
            "x",
            "background",
        ])
        .unwrap();

        assert_eq!(args.host, "pool.example.com");
        assert_eq!(args.port, 3333);
        assert_eq!(args.worker_name, "worker.1");
        assert_eq!(args.password, "x");

        let config = args.miner_config();
        assert_eq!(config.mode, MiningMode::Background);
        assert_eq!(config.lifecycle, Lifecycle::Daemon);
        assert_eq!(config.idle_poll, Duration::from_secs(1));
    }

    #[test]
    fn test_unknown_mode_falls_back_to_full() {
        let args = Arguments::try_parse_from([
            "stratum-miner", "pool", "3333", "w", "x", "turbo", "--once",
        ])
        .unwrap();
        assert_eq!(args.mining_mode(), MiningMode::Full);
        assert_eq!(args.miner_config().lifecycle, Lifecycle::SingleShare);

        let args = Arguments::try_parse_from(["stratum-miner", "pool", "3333", "w", "x"]).unwrap();
        assert_eq!(args.mining_mode(), MiningMode::Full);
    }

    #[test]
    fn test_mode_is_case_insensitive() {
        assert_eq!("Background".parse::<MiningMode>(), Ok(MiningMode::Background));
        assert_eq!("FULL".parse::<MiningMode>(), Ok(MiningMode::Full));
        assert!("gpu".parse::<MiningMode>().is_err());
    }
}
