//! Deterministic H2O.ai db-benchmark dataset generator.
//!
//! Produces the grouped-aggregation table (`G1_*`) and the left/right join pair
//! (`J1_*`) consumed by `teide-bench`, each with a `manifest.json` describing the
//! columns. Every draw comes from a seeded `ChaCha8Rng`, so identical arguments
//! always produce byte-identical files.

pub mod groupby;
pub mod join;
pub mod manifest;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub use groupby::generate_groupby;
pub use join::generate_join;
pub use manifest::{ColumnInfo, Manifest};

// ────────────────────────────────────────────────────────────────────────────────
// Error type
// ────────────────────────────────────────────────────────────────────────────────

pub type GenResult<T> = std::result::Result<T, DatagenError>;

#[derive(Debug, thiserror::Error)]
pub enum DatagenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid dataset parameters: {0}")]
    InvalidSpec(String),
}

// ────────────────────────────────────────────────────────────────────────────────
// Dataset parameters and naming
// ────────────────────────────────────────────────────────────────────────────────

/// Parameters identifying one member of the dataset family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSpec {
    /// Number of rows (N).
    pub rows: u64,
    /// Low-cardinality group count (K).
    pub k: u64,
    /// Percentage of rows carrying NA keys, 0-100.
    pub na_pct: u8,
    pub seed: u64,
}

impl Default for DatasetSpec {
    fn default() -> Self {
        Self {
            rows: 10_000_000,
            k: 100,
            na_pct: 0,
            seed: 0,
        }
    }
}

impl DatasetSpec {
    pub fn new(rows: u64, k: u64, na_pct: u8, seed: u64) -> GenResult<Self> {
        let spec = Self {
            rows,
            k,
            na_pct,
            seed,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> GenResult<()> {
        if self.rows == 0 {
            return Err(DatagenError::InvalidSpec("row count must be at least 1".into()));
        }
        if self.k == 0 {
            return Err(DatagenError::InvalidSpec("group cardinality K must be at least 1".into()));
        }
        if self.na_pct > 100 {
            return Err(DatagenError::InvalidSpec(format!(
                "NA percentage must be within 0..=100, got {}",
                self.na_pct
            )));
        }
        Ok(())
    }

    /// High-cardinality group count for the grouped table: `max(N/K, K)`.
    pub fn high_cardinality(&self) -> u64 {
        (self.rows / self.k).max(self.k)
    }

    /// `G1_1e7_1e2_0_0`
    pub fn groupby_name(&self) -> String {
        format!(
            "G1_{}_{}_{}_{}",
            sci_token(self.rows),
            sci_token(self.k),
            self.na_pct,
            self.seed
        )
    }

    /// `J1_1e7_1e2_0_0`
    pub fn join_name(&self) -> String {
        format!(
            "J1_{}_{}_0_{}",
            sci_token(self.rows),
            sci_token(self.k),
            self.seed
        )
    }

    pub fn groupby_dir(&self, root: &Path) -> PathBuf {
        root.join(self.groupby_name())
    }

    pub fn groupby_csv(&self, root: &Path) -> PathBuf {
        self.groupby_dir(root)
            .join(format!("{}.csv", self.groupby_name()))
    }

    pub fn join_dir(&self, root: &Path) -> PathBuf {
        root.join(self.join_name())
    }

    /// Left (x) join table: `J1_1e7_NA_0_0.csv`.
    pub fn join_left_csv(&self, root: &Path) -> PathBuf {
        self.join_dir(root)
            .join(format!("J1_{}_NA_0_{}.csv", sci_token(self.rows), self.seed))
    }

    /// Right (y) join table: `J1_1e7_1e7_0_0.csv`.
    pub fn join_right_csv(&self, root: &Path) -> PathBuf {
        let n = sci_token(self.rows);
        self.join_dir(root)
            .join(format!("J1_{}_{}_0_{}.csv", n, n, self.seed))
    }
}

/// Render a count the way H2O dataset names do: `10_000_000 -> "1e7"`,
/// `500 -> "5e2"`, anything that is not a single digit times a power of ten
/// stays decimal.
pub fn sci_token(n: u64) -> String {
    if n < 10 {
        return n.to_string();
    }
    let mut mantissa = n;
    let mut exp = 0u32;
    while mantissa % 10 == 0 {
        mantissa /= 10;
        exp += 1;
    }
    if mantissa < 10 && exp > 0 {
        format!("{}e{}", mantissa, exp)
    } else {
        n.to_string()
    }
}

/// Parse `"1e7"`, `"5e2"` or a plain integer into a row/group count.
pub fn parse_count(s: &str) -> Result<u64, String> {
    let s = s.trim().to_ascii_lowercase().replace('_', "");
    let parsed = match s.split_once('e') {
        Some((mantissa, exp)) => {
            let mantissa: u64 = mantissa
                .parse()
                .map_err(|_| format!("invalid mantissa in '{}'", s))?;
            let exp: u32 = exp.parse().map_err(|_| format!("invalid exponent in '{}'", s))?;
            10u64
                .checked_pow(exp)
                .and_then(|p| p.checked_mul(mantissa))
                .ok_or_else(|| format!("'{}' does not fit in 64 bits", s))?
        }
        None => s
            .parse()
            .map_err(|_| format!("'{}' is not a count (use e.g. 1e7 or 10000000)", s))?,
    };
    if parsed == 0 {
        return Err("count must be at least 1".into());
    }
    Ok(parsed)
}

// ────────────────────────────────────────────────────────────────────────────────
// Staged output
// ────────────────────────────────────────────────────────────────────────────────

pub(crate) type CsvSink = csv::Writer<BufWriter<File>>;

/// Write a CSV through `<dest>.tmp` and rename it into place only once `fill`
/// succeeds. On failure the temp file is removed, so `dest` is either complete
/// or absent.
pub(crate) fn write_staged<F>(dest: &Path, fill: F) -> GenResult<PathBuf>
where
    F: FnOnce(&mut CsvSink) -> GenResult<()>,
{
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = dest.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let result = File::create(&tmp)
        .map_err(DatagenError::from)
        .and_then(|file| {
            let mut writer = csv::WriterBuilder::new()
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(BufWriter::with_capacity(1 << 20, file));
            fill(&mut writer)?;
            writer.flush()?;
            Ok(())
        });

    match result {
        Ok(()) => {
            fs::rename(&tmp, dest)?;
            Ok(dest.to_path_buf())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Paths written by one generator call.
#[derive(Debug, Clone)]
pub struct GeneratedDataset {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub manifest: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sci_token() {
        assert_eq!(sci_token(10_000_000), "1e7");
        assert_eq!(sci_token(100), "1e2");
        assert_eq!(sci_token(500), "5e2");
        assert_eq!(sci_token(1_234), "1234");
        assert_eq!(sci_token(7), "7");
        assert_eq!(sci_token(10), "1e1");
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("1e7").unwrap(), 10_000_000);
        assert_eq!(parse_count("5e2").unwrap(), 500);
        assert_eq!(parse_count("1000").unwrap(), 1000);
        assert_eq!(parse_count("1_000").unwrap(), 1000);
        assert!(parse_count("0").is_err());
        assert!(parse_count("abc").is_err());
        assert!(parse_count("1e30").is_err());
    }

    #[test]
    fn test_dataset_names() {
        let spec = DatasetSpec::default();
        assert_eq!(spec.groupby_name(), "G1_1e7_1e2_0_0");
        let root = Path::new("datasets");
        assert_eq!(
            spec.groupby_csv(root),
            Path::new("datasets/G1_1e7_1e2_0_0/G1_1e7_1e2_0_0.csv")
        );
        assert_eq!(
            spec.join_left_csv(root),
            Path::new("datasets/J1_1e7_1e2_0_0/J1_1e7_NA_0_0.csv")
        );
        assert_eq!(
            spec.join_right_csv(root),
            Path::new("datasets/J1_1e7_1e2_0_0/J1_1e7_1e7_0_0.csv")
        );
    }

    #[test]
    fn test_validate() {
        assert!(DatasetSpec::new(0, 10, 0, 0).is_err());
        assert!(DatasetSpec::new(10, 0, 0, 0).is_err());
        assert!(DatasetSpec::new(10, 10, 101, 0).is_err());
        assert!(DatasetSpec::new(10, 10, 100, 0).is_ok());
    }

    #[test]
    fn test_high_cardinality_floor() {
        let spec = DatasetSpec::new(1_000, 100, 0, 0).unwrap();
        assert_eq!(spec.high_cardinality(), 100);
        let spec = DatasetSpec::new(1_000_000, 100, 0, 0).unwrap();
        assert_eq!(spec.high_cardinality(), 10_000);
    }
}
