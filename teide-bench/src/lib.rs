//! Shared types, traits and the measurement protocol for teide-bench.
//!
//! Every engine implements [`EngineAdapter`]: it loads the dataset family once,
//! turns a [`QuerySpec`] into a [`QueryRun`] (query structure built once), and the
//! timing harness re-executes that run N times.

pub mod adapters;
pub mod native;
pub mod query;
pub mod report;
pub mod results;
pub mod runner;
pub mod timing;

pub use native::NativeError;
pub use query::{AggOp, Aggregation, JoinKind, QueryKind, QuerySpec, SortKey, SortOrder, Suite};
pub use results::{BenchmarkResult, QueryOutcome, ResultAggregator};
pub use timing::{measure, median, IterationPlan, Measurement};

use serde::Serialize;
use std::any::Any;
use std::path::{Path, PathBuf};
use teide_datagen::DatasetSpec;

// ────────────────────────────────────────────────────────────────────────────────
// Error type
// ────────────────────────────────────────────────────────────────────────────────

pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("suite file: {0}")]
    Suite(#[from] toml::de::Error),
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
    #[error("Teide error: {0}")]
    Native(#[from] NativeError),
    #[error("dataset not found: {}", .0.display())]
    MissingDataset(PathBuf),
    #[error("{engine}: table '{table}' is not loaded")]
    NotLoaded {
        engine: &'static str,
        table: &'static str,
    },
    #[error("invalid query '{id}': {reason}")]
    InvalidQuery { id: String, reason: String },
    #[error("Config error: {0}")]
    Config(String),
}

// ────────────────────────────────────────────────────────────────────────────────
// Dataset catalog
// ────────────────────────────────────────────────────────────────────────────────

/// File-path contract with the dataset generator.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetCatalog {
    /// Grouped-aggregation table (`id1..id6, v1, v2, v3`).
    pub groupby: PathBuf,
    /// Left join table (`id1..id6, v1`).
    pub join_left: PathBuf,
    /// Right join table (`id1..id6, v2`).
    pub join_right: PathBuf,
}

impl DatasetCatalog {
    pub fn new(groupby: PathBuf, join_left: PathBuf, join_right: PathBuf) -> Self {
        Self {
            groupby,
            join_left,
            join_right,
        }
    }

    /// Resolve the standard file names under `root`.
    pub fn from_specs(root: &Path, groupby: &DatasetSpec, join: &DatasetSpec) -> Self {
        Self {
            groupby: groupby.groupby_csv(root),
            join_left: join.join_left_csv(root),
            join_right: join.join_right_csv(root),
        }
    }

    pub fn paths(&self) -> [&Path; 3] {
        [&self.groupby, &self.join_left, &self.join_right]
    }

    /// Fail on the first missing file, before any engine is touched.
    pub fn verify(&self) -> BenchResult<()> {
        for path in self.paths() {
            if !path.is_file() {
                return Err(BenchError::MissingDataset(path.to_path_buf()));
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Engine adapter traits
// ────────────────────────────────────────────────────────────────────────────────

/// Engine metadata recorded alongside the timings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    /// What one timed execution covers for this engine.
    pub granularity: String,
}

/// The value produced by one execution. The harness drops it after the clock
/// stops, which is where engines with manual memory management give back the
/// materialized result.
pub struct Materialized(Option<Box<dyn Any>>);

impl Materialized {
    /// Nothing to hold on to (the engine kept the result itself).
    pub fn none() -> Self {
        Self(None)
    }

    pub fn holding<T: 'static>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

/// Shape of a materialized result, for sanity checks outside the timed loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResultProbe {
    pub rows: u64,
    /// Sum of the requested column, when the engine can expose values.
    pub column_total: Option<f64>,
}

/// A query whose structure has been built and which can be executed repeatedly.
pub trait QueryRun {
    /// Execute once, start to materialization.
    fn run(&mut self) -> BenchResult<Materialized>;

    /// Execute once more and inspect the result.
    fn probe(&mut self, total_column: Option<&str>) -> BenchResult<ResultProbe>;
}

/// Unified engine adapter.
pub trait EngineAdapter {
    fn name(&self) -> &str;
    fn info(&self) -> EngineInfo;

    /// Load all tables of the catalog into the engine.
    fn load(&mut self, catalog: &DatasetCatalog) -> BenchResult<()>;

    /// Translate `query` into an engine operation. The returned run borrows the
    /// adapter, so no teardown can happen while it is alive.
    fn build<'a>(&'a self, query: &QuerySpec) -> BenchResult<Box<dyn QueryRun + 'a>>;

    /// Release loaded tables.
    fn teardown(&mut self) -> BenchResult<()>;
}

// ────────────────────────────────────────────────────────────────────────────────
// System info
// ────────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpus: usize,
    pub timestamp: String,
}

impl SystemInfo {
    pub fn collect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpus: available_threads(),
            timestamp: unix_timestamp(),
        }
    }
}

pub(crate) fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

fn unix_timestamp() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{}s-since-epoch", secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_catalog_reports_first_missing_path() {
        let tmp = TempDir::new().unwrap();
        let gb = tmp.path().join("g.csv");
        std::fs::write(&gb, "id1\n").unwrap();
        let catalog = DatasetCatalog::new(gb, tmp.path().join("x.csv"), tmp.path().join("y.csv"));
        match catalog.verify() {
            Err(BenchError::MissingDataset(p)) => assert!(p.ends_with("x.csv")),
            other => panic!("expected MissingDataset, got {:?}", other),
        }
    }

    #[test]
    fn test_catalog_from_specs() {
        let gb = DatasetSpec::default();
        let catalog = DatasetCatalog::from_specs(Path::new("datasets"), &gb, &gb);
        assert!(catalog.groupby.ends_with("G1_1e7_1e2_0_0.csv"));
        assert!(catalog.join_left.ends_with("J1_1e7_NA_0_0.csv"));
        assert!(catalog.join_right.ends_with("J1_1e7_1e7_0_0.csv"));
    }

    #[test]
    fn test_materialized_drops_payload() {
        use std::rc::Rc;
        let marker = Rc::new(());
        let m = Materialized::holding(Rc::clone(&marker));
        assert_eq!(Rc::strong_count(&marker), 2);
        assert!(!m.is_empty());
        drop(m);
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
