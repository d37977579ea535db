//! Grouped-aggregation table (`G1_*`).

use crate::manifest::{ColumnInfo, Manifest};
use crate::{write_staged, DatasetSpec, GenResult, GeneratedDataset};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::path::Path;

pub const GROUPBY_HEADER: [&str; 9] = ["id1", "id2", "id3", "id4", "id5", "id6", "v1", "v2", "v3"];

const PROGRESS_EVERY: u64 = 1_000_000;

/// Write `G1_<N>_<K>_<NA>_<seed>/G1_<N>_<K>_<NA>_<seed>.csv` plus its manifest under `root`.
///
/// Column layout:
/// - `id1`, `id2`: `id%03d` with K distinct values
/// - `id3`: `id%09d` with `max(N/K, K)` distinct values
/// - `id4`, `id5`: integers `1..=K`
/// - `id6`: integer `1..=max(N/K, K)`
/// - `v1`: `1..=5`, `v2`: `1..=15`, `v3`: uniform `[0, 100)`
pub fn generate_groupby(spec: &DatasetSpec, root: &Path) -> GenResult<GeneratedDataset> {
    spec.validate()?;
    let dir = spec.groupby_dir(root);
    std::fs::create_dir_all(&dir)?;

    let k = spec.k;
    let n_high = spec.high_cardinality();
    tracing::info!(
        name = %spec.groupby_name(),
        rows = spec.rows,
        k,
        n_high,
        na_pct = spec.na_pct,
        seed = spec.seed,
        "generating group-by dataset"
    );

    let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
    let csv_path = write_staged(&spec.groupby_csv(root), |wtr| {
        wtr.write_record(GROUPBY_HEADER)?;
        for i in 0..spec.rows {
            let na_row = spec.na_pct > 0 && rng.gen_range(1..=100u8) <= spec.na_pct;

            let id1 = low_symbol(&mut rng, k, na_row);
            let id2 = low_symbol(&mut rng, k, na_row);
            let id3 = format!("id{:09}", rng.gen_range(1..=n_high));
            let id4 = rng.gen_range(1..=k);
            let id5 = rng.gen_range(1..=k);
            let id6 = rng.gen_range(1..=n_high);
            let v1 = rng.gen_range(1..=5u32);
            let v2 = rng.gen_range(1..=15u32);
            let v3: f64 = rng.gen_range(0.0..100.0);

            wtr.write_record([
                id1,
                id2,
                id3,
                id4.to_string(),
                id5.to_string(),
                id6.to_string(),
                v1.to_string(),
                v2.to_string(),
                format!("{:.6}", v3),
            ])?;

            let written = i + 1;
            if written % PROGRESS_EVERY == 0 {
                tracing::info!(
                    "  progress: {} / {} ({:.0}%)",
                    written,
                    spec.rows,
                    written as f64 * 100.0 / spec.rows as f64
                );
            }
        }
        Ok(())
    })?;

    let file_name = file_name(&csv_path);
    let manifest = Manifest {
        name: spec.groupby_name(),
        description: format!(
            "H2OAI Group By benchmark: {} rows, K={}, {}% NA",
            spec.rows, k, spec.na_pct
        ),
        format: "h2oai".into(),
        table_name: Some("t".into()),
        row_count: spec.rows,
        k: spec.k,
        na_pct: spec.na_pct,
        seed: spec.seed,
        columns: vec![
            ColumnInfo::grouped("id1", "SYMBOL", "low", k),
            ColumnInfo::grouped("id2", "SYMBOL", "low", k),
            ColumnInfo::grouped("id3", "SYMBOL", "high", n_high),
            ColumnInfo::grouped("id4", "I64", "low", k),
            ColumnInfo::grouped("id5", "I64", "low", k),
            ColumnInfo::grouped("id6", "I64", "high", n_high),
            ColumnInfo::ranged("v1", "I64", [1.0, 5.0]),
            ColumnInfo::ranged("v2", "I64", [1.0, 15.0]),
            ColumnInfo::ranged("v3", "F64", [0.0, 100.0]),
        ],
        files: vec![file_name],
        tables: None,
    };
    let manifest_path = manifest.write(&dir)?;

    tracing::info!("generated {} rows to {}", spec.rows, csv_path.display());
    Ok(GeneratedDataset {
        dir,
        files: vec![csv_path],
        manifest: manifest_path,
    })
}

/// `id%03d` over `1..=k`, blank half of the time on NA rows.
fn low_symbol(rng: &mut ChaCha8Rng, k: u64, na_row: bool) -> String {
    if na_row && rng.gen_bool(0.5) {
        String::new()
    } else {
        format!("id{:03}", rng.gen_range(1..=k))
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_groupby_shape() {
        let tmp = TempDir::new().unwrap();
        let spec = DatasetSpec::new(1_000, 10, 0, 7).unwrap();
        let out = generate_groupby(&spec, tmp.path()).unwrap();

        let mut rdr = csv::Reader::from_path(&out.files[0]).unwrap();
        assert_eq!(rdr.headers().unwrap().iter().collect::<Vec<_>>(), GROUPBY_HEADER);

        let mut id1 = std::collections::HashSet::new();
        let mut rows = 0;
        for rec in rdr.records() {
            let rec = rec.unwrap();
            id1.insert(rec[0].to_string());
            let v1: u32 = rec[6].parse().unwrap();
            assert!((1..=5).contains(&v1));
            let v3: f64 = rec[8].parse().unwrap();
            assert!((0.0..100.0).contains(&v3));
            rows += 1;
        }
        assert_eq!(rows, 1_000);
        assert_eq!(id1.len(), 10);
        assert!(out.manifest.exists());
    }

    #[test]
    fn test_na_rows_blank_low_keys() {
        let tmp = TempDir::new().unwrap();
        let spec = DatasetSpec::new(2_000, 10, 50, 1).unwrap();
        let out = generate_groupby(&spec, tmp.path()).unwrap();

        let mut rdr = csv::Reader::from_path(&out.files[0]).unwrap();
        let blanks = rdr
            .records()
            .map(|r| r.unwrap())
            .filter(|r| r[0].is_empty())
            .count();
        // ~50% NA rows, half of those blank id1.
        assert!(blanks > 300 && blanks < 700, "blanks = {}", blanks);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        let spec = DatasetSpec::new(100, 10, 0, 0).unwrap();
        let out = generate_groupby(&spec, tmp.path()).unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(&out.dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
