//! rpcctx: evaluate an edit map against a schema and stored rows.
//!
//! Usage:
//!   rpcctx --schema schema.json --store rows.json --entity Invoice --values edits.json
//!   rpcctx --schema schema.json --entity Invoice --values - --field total < edits.json
//!
//! Prints the populated instance, or the requested fields, as JSON on stdout.
//! Logs go to stderr.

use anyhow::Result;
use clap::Parser;
use rpcctx_cli::{Evaluator, parse_values, read_values};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "rpcctx")]
#[command(about = "Materialize entity edit maps through a lazy context proxy")]
struct Args {
    /// Schema document (JSON)
    #[arg(short, long)]
    schema: PathBuf,

    /// Stored rows keyed by entity type (JSON)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Entity type of the edit map
    #[arg(short, long)]
    entity: String,

    /// Edit map file, or `-` for stdin
    #[arg(long, default_value = "-")]
    values: String,

    /// Field to read instead of printing the populated instance (repeatable)
    #[arg(short, long = "field")]
    fields: Vec<String>,

    /// Proxy config (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let evaluator = Evaluator::load(&args.schema, args.store.as_deref(), args.config.as_deref())?;
    let values = parse_values(&read_values(&args.values)?)?;
    info!(entity = %args.entity, fields = values.len(), "Evaluating edit map");

    let output = evaluator.evaluate(&args.entity, values, &args.fields)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
