//! gen-proof-tree - build proof of reserve trees from balance lists
//!
//! For every asset token reads `proof_reserve_{token}.csv` from the input
//! directory and writes `tree_proof_{token}.csv` (flat tree dump) and
//! `tree_proof_full_{token}.csv` (per-user proofs) to the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use reserve_proof_tree::logging::{self, LogLevel};
use reserve_proof_tree::{generate_all, AssetConfig, GeneratorConfig, HexEncoding};
use std::path::PathBuf;

/// Build proof of reserve Merkle sum trees
#[derive(Parser)]
#[command(name = "gen-proof-tree")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate proof of reserve trees and per-user proofs", long_about = None)]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding proof_reserve_{token}.csv
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Directory receiving the dumps
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Asset tokens to process (repeatable); defaults to the configured assets
    #[arg(short, long = "token")]
    tokens: Vec<String>,

    /// Creation timestamp in milliseconds since epoch (default: now)
    #[arg(long)]
    created_at: Option<i64>,

    /// Use fixed-width hex hashes instead of the legacy encoding
    #[arg(long)]
    zero_padded_hex: bool,

    /// Pair levels and render proofs in parallel
    #[arg(long)]
    parallel: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity (-q warnings only, -qq errors only)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::try_init(LogLevel::from_flags(cli.verbose, cli.quiet)) {
        eprintln!("failed to initialize logging: {}", e);
    }

    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GeneratorConfig::default(),
    };

    if let Some(dir) = cli.input_dir {
        config = config.with_input_dir(dir);
    }
    if let Some(dir) = cli.output_dir {
        config = config.with_output_dir(dir);
    }
    if !cli.tokens.is_empty() {
        let assets = cli
            .tokens
            .iter()
            .map(|token| {
                config
                    .assets
                    .iter()
                    .find(|asset| &asset.token == token)
                    .cloned()
                    .unwrap_or_else(|| AssetConfig::for_token(token.clone()))
            })
            .collect();
        config = config.with_assets(assets);
    }
    if let Some(created_at) = cli.created_at {
        config = config.with_created_at(created_at);
    }
    if cli.zero_padded_hex {
        config = config.with_hex_encoding(HexEncoding::ZeroPadded);
    }
    if cli.parallel {
        config = config.with_parallel();
    }

    let reports = generate_all(&config).context("Failed to generate proof trees")?;

    for report in &reports {
        println!(
            "{}: {} users, {} nodes, root {} (amount {}), {} users/s",
            report.token,
            report.user_count,
            report.node_count,
            report.root_hash,
            report.root_amount,
            report.throughput()
        );
    }

    Ok(())
}
