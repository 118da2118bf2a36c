//! stratakv CLI
//!
//! Small shell over the engine API: open a database directory, run one
//! command, close.

use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use stratakv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// stratakv CLI
#[derive(Parser, Debug)]
#[command(name = "stratakv-cli")]
#[command(about = "CLI for the stratakv storage engine")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./stratakv_data")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to look up
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Print engine statistics
    Stats,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stratakv=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let config = Config::builder().data_dir(&args.data_dir).build();
    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    // Wall-clock versions: monotonic enough for a one-shot shell
    let version = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let result = match &args.command {
        Commands::Get { key } => match engine.get(key.as_bytes()) {
            Ok(Some(value)) => {
                println!("{}", String::from_utf8_lossy(&value));
                Ok(())
            }
            Ok(None) => {
                println!("(not found)");
                Ok(())
            }
            Err(e) => Err(e),
        },
        Commands::Set { key, value } => {
            engine.put(key.as_bytes(), value.as_bytes(), version)
        }
        Commands::Del { key } => engine.delete(key.as_bytes(), version),
        Commands::Stats => {
            println!("memtable entries:  {}", engine.memtable_len());
            println!("frozen memtables:  {}", engine.frozen_count());
            println!("sstables:          {}", engine.table_count());
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!("command failed: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = engine.close() {
        tracing::error!("close failed: {}", e);
        std::process::exit(1);
    }
}
