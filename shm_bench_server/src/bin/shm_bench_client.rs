//! # Shared-memory benchmark probe
//!
//! Attaches to a running `shm_bench_server`, requests one or more runs and
//! prints the cycle totals.
//!
//! ```bash
//! shm_bench_client --key 0x53484d42 --runs 5
//! RUST_LOG=debug shm_bench_client
//! ```

use clap::Parser;
use shm_bench_common::config::parse_ipc_key;
use shm_bench_common::consts::{DEFAULT_IPC_KEY, IpcKey};
use shm_bench_server::BenchProbe;
use std::time::Duration;
use tracing::info;

/// Request benchmark runs from a running shm_bench_server
#[derive(Parser, Debug)]
#[command(name = "shm_bench_client")]
#[command(author = "RTS007")]
#[command(version)]
struct Args {
    /// IPC key of the server (decimal or 0x-prefixed hex).
    #[arg(short, long, value_parser = parse_key_arg, default_value_t = DEFAULT_IPC_KEY)]
    key: IpcKey,

    /// Number of runs to request.
    #[arg(short, long, default_value_t = 1)]
    runs: u32,

    /// How long to wait for each result, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    shm_bench_ipc::init_tracing();
    let args = Args::parse();

    let probe = BenchProbe::connect(args.key)?;
    info!("Connected to key {:#x}", args.key);

    let timeout = Duration::from_millis(args.timeout_ms);
    for run in 1..=args.runs {
        let result = probe.measure(timeout)?;
        println!(
            "run {run}: {} cycles over {} trials ({:.2} cycles/trial)",
            result.total_cycles,
            result.trials,
            result.cycles_per_trial()
        );
    }
    Ok(())
}

fn parse_key_arg(s: &str) -> Result<IpcKey, String> {
    parse_ipc_key(s).map_err(|e| e.to_string())
}
