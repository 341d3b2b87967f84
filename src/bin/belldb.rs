//! BellDB CLI
//!
//! Local command-line access to a BellDB data directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use belldb::wal::WalRecovery;
use belldb::{Config, Engine};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// BellDB CLI
#[derive(Parser, Debug)]
#[command(name = "belldb")]
#[command(about = "Embedded LSM key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./belldb_data")]
    data_dir: PathBuf,

    /// Memtable element count that triggers a flush
    #[arg(short = 't', long, default_value = "2048")]
    flush_threshold: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// Flush the memtable to a new SSTable
    Flush,

    /// Print engine counters
    Stats,

    /// Scan the WAL and report corrupt or torn records
    VerifyWal,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,belldb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> belldb::Result<()> {
    // Verification must not replay or truncate, so it bypasses the engine
    if let Commands::VerifyWal = args.command {
        return verify_wal(&args.data_dir);
    }

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .memtable_flush_threshold(args.flush_threshold)
        .build();
    let engine = Engine::open(config)?;

    match args.command {
        Commands::Get { key } => match engine.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Put { key, value } => {
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Delete { key } => {
            engine.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Flush => {
            engine.flush()?;
            println!("OK ({} sstables)", engine.sstable_count());
        }
        Commands::Stats => {
            let stats = engine.stats();
            println!("belldb {}", belldb::VERSION);
            println!("memtable entries: {}", stats.memtable_entries);
            println!("memtable bytes:   {}", stats.memtable_bytes);
            println!("sstables:         {}", stats.sstable_count);
            println!("wal bytes:        {}", stats.wal_bytes);
            println!("checkpoint lsn:   {:?}", stats.last_checkpoint_lsn);
        }
        Commands::VerifyWal => {}
    }

    Ok(())
}

fn verify_wal(data_dir: &Path) -> belldb::Result<()> {
    let result = WalRecovery::verify(&data_dir.join(Engine::WAL_FILENAME))?;
    println!("valid records:   {}", result.entries_recovered);
    println!("corrupt records: {}", result.entries_corrupted);
    println!("torn tail:       {}", result.was_truncated);
    match result.last_lsn {
        Some(lsn) => println!("last lsn:        {}", lsn),
        None => println!("last lsn:        -"),
    }
    Ok(())
}
