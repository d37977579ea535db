//! H2O.ai dataset generator
//!
//! Usage:
//!   teide-datagen                           # G1_1e7_1e2_0_0 (10M rows, K=100)
//!   teide-datagen --rows 1e8 --k 1e2        # 100M rows
//!   teide-datagen --rows 1e7 --na 5         # 5% NA keys
//!   teide-datagen --type all --rows 1e6     # group-by table and join pair

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use teide_datagen::{generate_groupby, generate_join, parse_count, DatasetSpec, GenResult};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DatasetType {
    Groupby,
    Join,
    All,
}

#[derive(Parser, Debug)]
#[command(
    name = "teide-datagen",
    about = "Generate H2OAI db-benchmark compatible datasets"
)]
struct Cli {
    /// Number of rows: 1e7 (10M), 1e8 (100M), 1e9 (1B), or an exact number.
    #[arg(short = 'n', long, default_value = "1e7", value_parser = parse_count)]
    rows: u64,

    /// Number of unique groups K: 1e2 (100), 1e1 (10), ...
    #[arg(short = 'K', long, default_value = "1e2", value_parser = parse_count)]
    k: u64,

    /// Percentage of NA values, 0-100.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    na: u8,

    /// Random seed.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Dataset type.
    #[arg(short = 't', long = "type", value_enum, default_value = "groupby")]
    dataset: DatasetType,

    /// Root directory; each dataset gets its own named subdirectory.
    #[arg(short = 'o', long, default_value = "datasets")]
    output: PathBuf,
}

fn main() -> GenResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let spec = DatasetSpec::new(cli.rows, cli.k, cli.na, cli.seed)?;

    std::fs::create_dir_all(&cli.output)?;

    if matches!(cli.dataset, DatasetType::Groupby | DatasetType::All) {
        println!("\n=== Generating H2OAI Group By Dataset ===");
        println!("  Name: {}", spec.groupby_name());
        println!("  Rows (N): {}", spec.rows);
        println!("  Groups (K): {}", spec.k);
        println!("  NA %: {}", spec.na_pct);
        println!("  Seed: {}", spec.seed);
        let out = generate_groupby(&spec, &cli.output)?;
        println!("\n✓ Dataset generated: {}", out.dir.display());
        println!("  Manifest: {}", out.manifest.display());
    }

    if matches!(cli.dataset, DatasetType::Join | DatasetType::All) {
        println!("\n=== Generating H2OAI Join Dataset ===");
        println!("  Name: {}", spec.join_name());
        println!("  Rows: {}", spec.rows);
        let out = generate_join(&spec, &cli.output)?;
        println!("\n✓ Dataset generated: {}", out.dir.display());
        for f in &out.files {
            println!("  CSV: {}", f.display());
        }
    }

    println!("\n✓ Dataset generation complete");
    Ok(())
}
