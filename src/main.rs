//! Minq Rope - CLI Entry Point
//!
//! Validates fixture files and shows what a query against them resolves to.

use anyhow::Result;
use clap::Parser;
use minq_rope::{IdCache, QueryRecorder, RopeConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "minq-rope",
    about = "Query-recording test double for minq - fixture validation and dispatch preview",
    version
)]
struct Args {
    /// Path to fixture file
    #[arg(short, long, default_value = "minq-rope.yaml")]
    config: PathBuf,

    /// Resolve a `one()` query against this collection and print the result
    #[arg(long, value_name = "NAME")]
    collection: Option<String>,

    /// Print a stable object id for each key
    #[arg(long, value_name = "KEY", num_args = 1..)]
    oid: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default fixture and exit
    #[arg(long)]
    print_config: bool,

    /// Validate fixture and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let default_config = include_str!("../fixtures/default.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading fixture");
        RopeConfig::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Fixture file not found: {:?}", args.config);
    } else {
        info!("Using empty fixture (no stubs)");
        RopeConfig::default()
    };

    if args.validate {
        println!("Fixture is valid ({} stubs defined)", config.stubs.len());
        return Ok(());
    }

    if !args.oid.is_empty() {
        let mut ids = IdCache::new();
        for key in &args.oid {
            println!("{}\t{}", key, ids.oid(key));
        }
    }

    if let Some(collection) = args.collection {
        let mut recorder = QueryRecorder::new(config);
        let result = recorder.from(collection).one().await;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}
