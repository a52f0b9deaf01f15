//! bridgekv CLI Client
//!
//! Command-line interface for inspecting a bridgekv database.

use std::process::ExitCode;

use bridgekv::{Config, Database, RemoteStore};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// bridgekv CLI
#[derive(Parser, Debug)]
#[command(name = "bridgekv-cli")]
#[command(about = "CLI for bridgekv, ordered key-value storage on a remote cache")]
#[command(version)]
struct Args {
    /// Backend address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    endpoint: String,

    /// Backend password
    #[arg(short, long)]
    password: Option<String>,

    /// Logical database index
    #[arg(short, long, default_value = "0")]
    database: u32,

    /// SCAN page size hint
    #[arg(long, default_value = "1000")]
    page_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the backend
    Ping,

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
    Del {
        /// The key to delete
        key: String,
    },

    /// Check whether a key exists
    Has {
        /// The key to check
        key: String,
    },

    /// List keys under a prefix in ascending order
    Scan {
        /// Key prefix (empty = everything)
        #[arg(default_value = "")]
        prefix: String,

        /// Inclusive lower bound
        #[arg(short, long, default_value = "")]
        start: String,

        /// Stop after this many entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show backend configuration parameters
    Stat {
        /// Parameter name or glob
        property: String,
    },

    /// Capture a snapshot and report how many keys it holds
    SnapshotCount {
        /// Key prefix (empty = everything)
        #[arg(default_value = "")]
        prefix: String,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,bridgekv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut builder = Config::builder()
        .endpoint(&args.endpoint)
        .database(args.database)
        .scan_page_size(args.page_size);
    if let Some(password) = &args.password {
        builder = builder.password(password);
    }

    let db = match Database::open(builder.build()) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", args.endpoint, e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&db, args.command);
    let _ = db.close();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(db: &Database, command: Commands) -> bridgekv::Result<()> {
    match command {
        Commands::Ping => {
            db.store().ping()?;
            println!("PONG");
        }
        Commands::Get { key } => match db.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Put { key, value } => {
            db.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            db.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Has { key } => println!("{}", db.has(key.as_bytes())?),
        Commands::Scan { prefix, start, limit } => {
            let mut iter = db.new_iterator(prefix.as_bytes(), start.as_bytes())?;
            for entry in iter.by_ref().take(limit.unwrap_or(usize::MAX)) {
                let value = entry
                    .value
                    .map(|v| String::from_utf8_lossy(&v).into_owned())
                    .unwrap_or_else(|| "(nil)".to_string());
                println!("{}\t{}", String::from_utf8_lossy(&entry.key), value);
            }
            if let Some(e) = iter.take_error() {
                return Err(e);
            }
            iter.release();
        }
        Commands::Stat { property } => println!("{}", db.stat(&property)?),
        Commands::SnapshotCount { prefix } => {
            let snapshot = db.new_snapshot_with_prefix(prefix.as_bytes())?;
            println!("{}", snapshot.len());
        }
    }
    Ok(())
}
