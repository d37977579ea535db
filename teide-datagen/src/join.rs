//! Left/right join pair (`J1_*`).
//!
//! Both tables draw keys from the same ranges (`id1`, `id2` over `1..=K`, `id3`
//! over `1..=max(N/K, 1)`), so the inner join on `(id1, id2, id3)` has a
//! predictable, non-trivial match count. The right table is seeded with
//! `seed + 1` so the two sides are independent.

use crate::groupby::file_name;
use crate::manifest::{ColumnInfo, Manifest};
use crate::{write_staged, DatasetSpec, GenResult, GeneratedDataset};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::path::Path;

pub const JOIN_LEFT_HEADER: [&str; 7] = ["id1", "id2", "id3", "id4", "id5", "id6", "v1"];
pub const JOIN_RIGHT_HEADER: [&str; 7] = ["id1", "id2", "id3", "id4", "id5", "id6", "v2"];

const PROGRESS_EVERY: u64 = 1_000_000;

/// Write both join tables and a manifest into `J1_<N>_<K>_0_<seed>/` under `root`.
pub fn generate_join(spec: &DatasetSpec, root: &Path) -> GenResult<GeneratedDataset> {
    spec.validate()?;
    let dir = spec.join_dir(root);
    std::fs::create_dir_all(&dir)?;

    tracing::info!(
        name = %spec.join_name(),
        rows = spec.rows,
        k = spec.k,
        seed = spec.seed,
        "generating join dataset"
    );

    let left = write_table(spec, &spec.join_left_csv(root), JOIN_LEFT_HEADER, spec.seed)?;
    let right = write_table(
        spec,
        &spec.join_right_csv(root),
        JOIN_RIGHT_HEADER,
        spec.seed.wrapping_add(1),
    )?;

    let mut tables = BTreeMap::new();
    tables.insert("x".to_string(), file_name(&left));
    tables.insert("y".to_string(), file_name(&right));

    let manifest = Manifest {
        name: spec.join_name(),
        description: format!("H2OAI Join benchmark: {} rows, K={}", spec.rows, spec.k),
        format: "h2oai".into(),
        table_name: None,
        row_count: spec.rows,
        k: spec.k,
        na_pct: 0,
        seed: spec.seed,
        columns: vec![
            ColumnInfo::grouped("id1", "I64", "low", spec.k),
            ColumnInfo::grouped("id2", "I64", "low", spec.k),
            ColumnInfo::grouped("id3", "I64", "high", high_keys(spec)),
            ColumnInfo::plain("id4", "SYMBOL"),
            ColumnInfo::plain("id5", "SYMBOL"),
            ColumnInfo::plain("id6", "SYMBOL"),
            ColumnInfo::ranged("v1", "F64", [0.0, 100.0]),
            ColumnInfo::ranged("v2", "F64", [0.0, 100.0]),
        ],
        files: Vec::new(),
        tables: Some(tables),
    };
    let manifest_path = manifest.write(&dir)?;

    Ok(GeneratedDataset {
        dir,
        files: vec![left, right],
        manifest: manifest_path,
    })
}

fn high_keys(spec: &DatasetSpec) -> u64 {
    (spec.rows / spec.k).max(1)
}

fn write_table(
    spec: &DatasetSpec,
    path: &Path,
    header: [&str; 7],
    seed: u64,
) -> GenResult<std::path::PathBuf> {
    let k = spec.k;
    let n_high = high_keys(spec);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let written = write_staged(path, |wtr| {
        wtr.write_record(header)?;
        for i in 0..spec.rows {
            let id1 = rng.gen_range(1..=k);
            let id2 = rng.gen_range(1..=k);
            let id3 = rng.gen_range(1..=n_high);
            let id4 = rng.gen_range(1..=k);
            let id5 = rng.gen_range(1..=k);
            let id6 = rng.gen_range(1..=n_high);
            let v: f64 = rng.gen_range(0.0..100.0);
            wtr.write_record([
                id1.to_string(),
                id2.to_string(),
                id3.to_string(),
                format!("id{}", id4),
                format!("id{}", id5),
                format!("id{}", id6),
                format!("{:.6}", v),
            ])?;
            if (i + 1) % PROGRESS_EVERY == 0 {
                tracing::info!("  {} rows...", i + 1);
            }
        }
        Ok(())
    })?;

    tracing::info!("  written to {}", written.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_join_pair_layout() {
        let tmp = TempDir::new().unwrap();
        let spec = DatasetSpec::new(500, 5, 0, 3).unwrap();
        let out = generate_join(&spec, tmp.path()).unwrap();
        assert_eq!(out.files.len(), 2);

        let mut left = csv::Reader::from_path(&out.files[0]).unwrap();
        assert_eq!(left.headers().unwrap().iter().collect::<Vec<_>>(), JOIN_LEFT_HEADER);
        assert_eq!(left.records().count(), 500);

        let mut right = csv::Reader::from_path(&out.files[1]).unwrap();
        assert_eq!(right.headers().unwrap().iter().collect::<Vec<_>>(), JOIN_RIGHT_HEADER);

        let manifest = Manifest::load(&out.dir).unwrap();
        assert_eq!(manifest.row_count, 500);
        assert!(manifest.tables.unwrap().contains_key("y"));
    }

    #[test]
    fn test_sides_differ() {
        let tmp = TempDir::new().unwrap();
        let spec = DatasetSpec::new(200, 5, 0, 3).unwrap();
        let out = generate_join(&spec, tmp.path()).unwrap();
        let left = std::fs::read_to_string(&out.files[0]).unwrap();
        let right = std::fs::read_to_string(&out.files[1]).unwrap();
        let body = |s: &str| s.lines().skip(1).collect::<Vec<_>>().join("\n");
        assert_ne!(body(&left), body(&right));
    }
}
