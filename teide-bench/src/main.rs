//! H2O.ai db-benchmark runner: DuckDB vs Polars vs Teide
//!
//! Usage:
//!   teide-bench                                  # 10M-row G1/J1 datasets, full suite
//!   teide-bench --rows 1e6 --join-rows 1e6       # smaller datasets
//!   teide-bench --skip teide --csv results.csv   # without the native engine
//!   TEIDE_LIB=/path/libteide.so teide-bench --probe

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use teide_bench::adapters::duckdb_adapter::DuckDbAdapter;
use teide_bench::adapters::polars_adapter::PolarsAdapter;
use teide_bench::adapters::teide_adapter::TeideAdapter;
use teide_bench::adapters::ENGINES;
use teide_bench::native::TeideLib;
use teide_bench::runner::{run_engine, RunOptions};
use teide_bench::{
    report, BenchError, BenchResult, DatasetCatalog, EngineAdapter, ResultAggregator, Suite,
    SystemInfo,
};
use teide_datagen::{parse_count, DatasetSpec};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "teide-bench",
    about = "H2O.ai group-by/sort/join benchmark across DuckDB, Polars and Teide"
)]
struct Cli {
    /// Root directory produced by teide-datagen.
    #[arg(long, default_value = "datasets")]
    datasets: PathBuf,

    /// Rows of the group-by dataset.
    #[arg(long, default_value = "1e7", value_parser = parse_count)]
    rows: u64,

    /// Group cardinality K of the group-by dataset.
    #[arg(long, default_value = "1e2", value_parser = parse_count)]
    k: u64,

    /// NA percentage of the group-by dataset.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    na: u8,

    /// Seed of both datasets.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Rows of each join table.
    #[arg(long, default_value = "1e7", value_parser = parse_count)]
    join_rows: u64,

    /// Group cardinality K of the join pair.
    #[arg(long, default_value = "1e2", value_parser = parse_count)]
    join_k: u64,

    /// TOML suite file with [[query]] entries (default: the standard H2O suite).
    #[arg(long)]
    suite: Option<PathBuf>,

    /// Skip engines (comma-separated: duckdb, polars, teide).
    #[arg(long, value_delimiter = ',')]
    skip: Vec<String>,

    /// JSON result record.
    #[arg(short, long, default_value = "results.json")]
    output: PathBuf,

    /// Also export a CSV table.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Teide shared library.
    #[arg(long, env = "TEIDE_LIB")]
    teide_lib: Option<PathBuf>,

    /// Execute each query once more after measuring and log the result shape.
    #[arg(long)]
    probe: bool,
}

impl Cli {
    fn catalog(&self) -> BenchResult<DatasetCatalog> {
        let groupby = DatasetSpec::new(self.rows, self.k, self.na, self.seed)
            .map_err(|e| BenchError::Config(e.to_string()))?;
        let join = DatasetSpec::new(self.join_rows, self.join_k, 0, self.seed)
            .map_err(|e| BenchError::Config(e.to_string()))?;
        Ok(DatasetCatalog::from_specs(&self.datasets, &groupby, &join))
    }
}

fn open_engine(name: &str, cli: &Cli) -> BenchResult<Box<dyn EngineAdapter>> {
    Ok(match name {
        "duckdb" => Box::new(DuckDbAdapter::new()?),
        "polars" => Box::new(PolarsAdapter::new()),
        "teide" => {
            let lib = match &cli.teide_lib {
                Some(path) => TeideLib::open(path)?,
                None => TeideLib::from_env()?,
            };
            Box::new(TeideAdapter::with_api(lib))
        }
        other => return Err(BenchError::Config(format!("unknown engine '{}'", other))),
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> BenchResult<()> {
    let skip: Vec<String> = cli.skip.iter().map(|s| s.trim().to_lowercase()).collect();
    for s in &skip {
        if !ENGINES.contains(&s.as_str()) {
            return Err(BenchError::Config(format!("unknown engine in --skip: '{}'", s)));
        }
    }

    let suite = match &cli.suite {
        Some(path) => Suite::load(path)?,
        None => Suite::standard(),
    };

    let catalog = cli.catalog()?;
    if let Err(e) = catalog.verify() {
        if let BenchError::MissingDataset(path) = &e {
            eprintln!("Dataset not found: {}", path.display());
            eprintln!("Generate it with: teide-datagen --type all");
        }
        return Err(e);
    }

    println!(
        "\n{}",
        "╔══════════════════════════════════════════════════════╗"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "║     H2O.ai db-benchmark: DuckDB / Polars / Teide     ║"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════╝"
            .bold()
            .blue()
    );
    println!("  Group-by: {}", catalog.groupby.display());
    println!("  Join:     {}", catalog.join_left.display());
    println!("            {}", catalog.join_right.display());
    println!("  Queries:  {}", suite.queries.len());

    let opts = RunOptions { probe: cli.probe };
    let mut agg = ResultAggregator::new(SystemInfo::collect(), catalog.clone(), &suite.queries);

    for name in ENGINES {
        if skip.iter().any(|s| s == name) {
            println!("\n  {} {}", "SKIP".yellow(), name);
            continue;
        }
        match open_engine(name, &cli) {
            Ok(mut engine) => {
                run_engine(engine.as_mut(), &catalog, &suite.queries, &mut agg, &opts);
            }
            Err(e) => {
                println!("\n  {} {}: {}", "SKIP".yellow(), name, e);
                tracing::warn!(engine = name, error = %e, "engine unavailable");
                agg.mark_unavailable(name, &e.to_string());
            }
        }
    }

    let result = agg.finish();
    report::print_report(&result);

    println!();
    report::export_json(&result, &cli.output)?;
    if let Some(path) = &cli.csv {
        report::export_csv(&result, path)?;
    }
    Ok(())
}
