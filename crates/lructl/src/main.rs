//! lructl - command-line driver for lrucache

mod script;
mod stress;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::script::ScriptCache;
use crate::stress::StressConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a script of cache commands (stdin when no file is given)
    Replay {
        /// Cache capacity (number of items)
        #[arg(short, long, default_value_t = 10)]
        capacity: usize,

        /// Script file
        file: Option<PathBuf>,
    },

    /// Hammer one shared cache with a writer and concurrent readers
    Stress {
        /// Cache capacity (number of items)
        #[arg(short, long, default_value_t = 10)]
        capacity: usize,

        /// Operations per worker
        #[arg(short, long, default_value_t = 1_000_000)]
        ops: u64,

        /// Readers pick keys from 0..keyspace (defaults to ops)
        #[arg(short, long)]
        keyspace: Option<u64>,

        /// Number of reader tasks
        #[arg(short, long, default_value_t = 1)]
        readers: usize,

        /// Seed for reader key choice
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Replay { capacity, file } => {
            let cache = ScriptCache::new(capacity)?;
            let input = script::open_input(file.as_deref())?;
            let stdout = io::stdout();
            let mut out = stdout.lock();

            let executed = script::replay(&cache, input, &mut out)?;
            out.flush()?;
            info!(executed, len = cache.len(), "replay finished");
        }
        Command::Stress {
            capacity,
            ops,
            keyspace,
            readers,
            seed,
        } => {
            let report = stress::run(StressConfig {
                capacity,
                ops,
                keyspace: keyspace.unwrap_or(ops),
                readers,
                seed,
            })
            .await?;

            info!(
                elapsed_ms = report.elapsed_ms,
                hit_ratio = report.stats.hit_ratio,
                "stress run finished"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
