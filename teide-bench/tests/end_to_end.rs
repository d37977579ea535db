//! Generate small datasets, run real queries through each engine and compare
//! the result shape with values computed straight from the CSV files.

use std::collections::HashMap;
use std::path::Path;
use teide_bench::adapters::duckdb_adapter::DuckDbAdapter;
use teide_bench::adapters::polars_adapter::PolarsAdapter;
use teide_bench::adapters::teide_adapter::TeideAdapter;
use teide_bench::runner::{run_engine, RunOptions};
use teide_bench::{
    measure, AggOp, DatasetCatalog, EngineAdapter, IterationPlan, QuerySpec, ResultAggregator,
    SystemInfo,
};
use teide_datagen::{generate_groupby, generate_join, DatasetSpec};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    catalog: DatasetCatalog,
    v1_total: i64,
    join_matches: u64,
}

fn column_index(rdr: &mut csv::Reader<std::fs::File>, name: &str) -> usize {
    rdr.headers()
        .unwrap()
        .iter()
        .position(|h| h == name)
        .unwrap()
}

fn key_triples(path: &Path) -> Vec<(String, String, String)> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let idx: Vec<usize> = ["id1", "id2", "id3"]
        .iter()
        .map(|c| column_index(&mut rdr, c))
        .collect();
    rdr.records()
        .map(|r| {
            let r = r.unwrap();
            (r[idx[0]].to_string(), r[idx[1]].to_string(), r[idx[2]].to_string())
        })
        .collect()
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let groupby = DatasetSpec::new(1_000, 10, 0, 0).unwrap();
    let join = DatasetSpec::new(500, 5, 0, 0).unwrap();
    generate_groupby(&groupby, dir.path()).unwrap();
    generate_join(&join, dir.path()).unwrap();
    let catalog = DatasetCatalog::from_specs(dir.path(), &groupby, &join);
    catalog.verify().unwrap();

    let mut rdr = csv::Reader::from_path(&catalog.groupby).unwrap();
    let v1 = column_index(&mut rdr, "v1");
    let v1_total: i64 = rdr
        .records()
        .map(|r| r.unwrap()[v1].parse::<i64>().unwrap())
        .sum();

    let mut right: HashMap<(String, String, String), u64> = HashMap::new();
    for key in key_triples(&catalog.join_right) {
        *right.entry(key).or_default() += 1;
    }
    let join_matches = key_triples(&catalog.join_left)
        .iter()
        .map(|k| right.get(k).copied().unwrap_or(0))
        .sum();

    Fixture {
        _dir: dir,
        catalog,
        v1_total,
        join_matches,
    }
}

fn check_engine(engine: &mut dyn EngineAdapter, fx: &Fixture, exposes_values: bool) {
    engine.load(&fx.catalog).unwrap();
    let plan = IterationPlan::new(1, 2);

    {
        let q1 = QuerySpec::group_by("q1", "q1", &["id1"], &[(AggOp::Sum, "v1")]).with_plan(plan);
        let mut run = engine.build(&q1).unwrap();
        let m = measure("q1", || run.run(), q1.plan()).unwrap();
        assert_eq!(m.samples_ms.len(), 2);

        let probe = run.probe(q1.probe_column()).unwrap();
        assert_eq!(probe.rows, 10, "{}: group count", engine.name());
        if exposes_values {
            assert_eq!(probe.column_total, Some(fx.v1_total as f64));
        }
    }

    {
        let j1 = QuerySpec::standard_suite().pop().unwrap().with_plan(plan);
        assert!(j1.is_join());
        let mut run = engine.build(&j1).unwrap();
        measure("j1", || run.run(), j1.plan()).unwrap();
        let probe = run.probe(None).unwrap();
        assert!(fx.join_matches > 0);
        assert_eq!(probe.rows, fx.join_matches, "{}: join rows", engine.name());
    }

    engine.teardown().unwrap();
}

#[test]
fn duckdb_groupby_and_join() {
    let fx = fixture();
    let mut engine = DuckDbAdapter::new().unwrap();
    check_engine(&mut engine, &fx, true);
}

#[test]
fn polars_groupby_and_join() {
    let fx = fixture();
    let mut engine = PolarsAdapter::new();
    check_engine(&mut engine, &fx, true);
}

/// Needs the real engine; runs only when `TEIDE_LIB` points at it.
#[test]
fn teide_groupby_and_join() {
    if std::env::var_os("TEIDE_LIB").is_none() {
        eprintln!("TEIDE_LIB not set, skipping");
        return;
    }
    let fx = fixture();
    let mut engine = TeideAdapter::from_env().unwrap();
    check_engine(&mut engine, &fx, false);
}

#[test]
fn full_suite_records_every_query() {
    let fx = fixture();
    let suite: Vec<QuerySpec> = QuerySpec::standard_suite()
        .into_iter()
        .map(|q| q.with_plan(IterationPlan::new(0, 1)))
        .collect();
    let mut agg = ResultAggregator::new(SystemInfo::collect(), fx.catalog.clone(), &suite);

    let mut duck = DuckDbAdapter::new().unwrap();
    run_engine(&mut duck, &fx.catalog, &suite, &mut agg, &RunOptions::default());
    let mut polars = PolarsAdapter::new();
    run_engine(&mut polars, &fx.catalog, &suite, &mut agg, &RunOptions { probe: true });
    agg.mark_unavailable("teide", "not configured");

    let result = agg.finish();
    for q in &suite {
        assert!(result.median("duckdb", &q.id).is_some(), "duckdb {}", q.id);
        assert!(result.median("polars", &q.id).is_some(), "polars {}", q.id);
        assert!(result.median("teide", &q.id).is_none());
    }
}
