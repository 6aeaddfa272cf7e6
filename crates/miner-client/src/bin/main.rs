use std::process::ExitCode;

use clap::Parser;
use miner_client::{version, Arguments, Miner, Session};
use miner_core::CpuSearchEngine;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Arguments::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("stratum-miner {}", version());

    let (session, context) = match Session::connect(
        &args.host,
        args.port,
        &args.worker_name,
        &args.password,
        args.handshake_timeout(),
    ) {
        Ok(connected) => connected,
        Err(err) => {
            error!("{}", error_chain(&err));
            return ExitCode::FAILURE;
        }
    };

    let mut miner = Miner::new(CpuSearchEngine::new(), session, context, args.miner_config());
    match miner.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", error_chain(&err));
            ExitCode::FAILURE
        }
    }
}

/// Render an error with its sources, outermost first.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
