//! # Shared-memory benchmark server binary
//!
//! Creates the benchmark segment and semaphore, services client requests
//! until SIGINT/SIGTERM, then removes both IPC objects.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (key 0x53484d42, 1 s poll interval)
//! shm_bench_server
//!
//! # Config file plus overrides
//! shm_bench_server --config config/server.toml --key 0x1234 --poll-interval-ms 100 -v
//!
//! # JSON logs
//! shm_bench_server --json
//! ```

#![deny(warnings)]

use clap::Parser;
use shm_bench_common::config::{BenchConfig, ConfigLoader, LogLevel, parse_ipc_key};
use shm_bench_common::consts::{BUFSIZE, IpcKey, TRIALS};
use shm_bench_server::BenchServer;
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Shared-memory latency benchmark server
#[derive(Parser, Debug)]
#[command(name = "shm_bench_server")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Times shared-memory copies on request and publishes the cycle count")]
#[command(long_about = None)]
struct Args {
    /// Path to the server configuration file (server.toml).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// IPC key for the segment and semaphore (decimal or 0x-prefixed hex).
    #[arg(short, long, value_parser = parse_key_arg)]
    key: Option<IpcKey>,

    /// Sleep between readiness checks, in milliseconds.
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        // The subscriber may not be installed yet (config errors).
        eprintln!("shm_bench_server: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BenchConfig::load(path)?,
        None => BenchConfig::default(),
    };
    if let Some(key) = args.key {
        config.server.ipc_key = key;
    }
    if let Some(interval) = args.poll_interval_ms {
        config.server.poll_interval_ms = interval;
    }

    setup_tracing(&args, config.shared.log_level);
    config.validate()?;

    info!(
        "{} v{} starting (BUFSIZE={}, TRIALS={})",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION"),
        BUFSIZE,
        TRIALS
    );

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    })?;

    let mut server = BenchServer::new(config.server);
    server.start()?;

    // Block until SIGINT/SIGTERM.
    let _ = shutdown_rx.recv();

    let report = server.stop();
    if !report.is_clean() {
        warn!(
            "Teardown left {} IPC object(s) behind; check `ipcs` for key {:#x}",
            report.errors().count(),
            config.server.ipc_key
        );
    }

    info!("{} shutdown complete", config.shared.service_name);
    Ok(())
}

fn parse_key_arg(s: &str) -> Result<IpcKey, String> {
    parse_ipc_key(s).map_err(|e| e.to_string())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        configured
    };
    let directive = level
        .as_directive()
        .parse::<Directive>()
        .unwrap_or_else(|_| Level::INFO.into());

    let filter = EnvFilter::from_default_env().add_directive(directive);

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .init();
    }
}
