//! Polars adapter.
//!
//! Tables are read eagerly once. `build` assembles a `LazyFrame`; every run
//! clones and collects it, so a measurement covers query optimization plus
//! execution (Polars has no way to keep an optimized plan across collects).

use crate::query::{AggOp, QueryKind, QuerySpec};
use crate::{
    available_threads, BenchError, BenchResult, DatasetCatalog, EngineAdapter, EngineInfo,
    Materialized, QueryRun, ResultProbe,
};
use polars::prelude::*;
use std::path::Path;

/// Matches the `polars` requirement in Cargo.toml.
const POLARS_VERSION: &str = "0.46";

#[derive(Default)]
pub struct PolarsAdapter {
    groupby: Option<DataFrame>,
    join_left: Option<DataFrame>,
    join_right: Option<DataFrame>,
}

impl PolarsAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(frame: &Option<DataFrame>, name: &'static str) -> BenchResult<LazyFrame> {
        frame
            .as_ref()
            .map(|df| df.clone().lazy())
            .ok_or(BenchError::NotLoaded {
                engine: "polars",
                table: name,
            })
    }
}

fn read_csv(path: &Path) -> BenchResult<DataFrame> {
    let start = std::time::Instant::now();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    tracing::info!(
        engine = "polars",
        path = %path.display(),
        rows = df.height(),
        ms = start.elapsed().as_millis() as u64,
        "loaded"
    );
    Ok(df)
}

fn cols(names: &[String]) -> Vec<Expr> {
    names.iter().map(|n| col(n.as_str())).collect()
}

/// Translate a query into a lazy plan over the loaded frames.
fn to_lazy(
    query: &QuerySpec,
    groupby: impl FnOnce() -> BenchResult<LazyFrame>,
    join: impl FnOnce() -> BenchResult<(LazyFrame, LazyFrame)>,
) -> BenchResult<LazyFrame> {
    let plan = match &query.kind {
        QueryKind::GroupBy { keys, aggs } => {
            let exprs: Vec<Expr> = aggs
                .iter()
                .map(|agg| {
                    let expr = match agg.op {
                        AggOp::Sum => col(agg.column.as_str()).sum(),
                        AggOp::Avg => col(agg.column.as_str()).mean(),
                        AggOp::Count => len(),
                    };
                    expr.alias(agg.output_name())
                })
                .collect();
            groupby()?.group_by(cols(keys)).agg(exprs)
        }
        QueryKind::Sort { keys } => {
            let by: Vec<Expr> = keys.iter().map(|k| col(k.column.as_str())).collect();
            let options = SortMultipleOptions::default()
                .with_order_descending_multi(keys.iter().map(|k| k.is_descending()));
            groupby()?.sort_by_exprs(by, options)
        }
        QueryKind::Join {
            left_keys,
            right_keys,
            left_values,
            right_values,
            ..
        } => {
            let (left, right) = join()?;
            let mut projection = cols(left_keys);
            projection.extend(cols(left_values));
            projection.extend(cols(right_values));
            left.join(
                right,
                cols(left_keys),
                cols(right_keys),
                JoinArgs::new(JoinType::Inner),
            )
            .select(projection)
        }
    };
    Ok(plan)
}

struct PolarsRun {
    plan: LazyFrame,
}

impl QueryRun for PolarsRun {
    fn run(&mut self) -> BenchResult<Materialized> {
        let df = self.plan.clone().collect()?;
        Ok(Materialized::holding(df))
    }

    fn probe(&mut self, total_column: Option<&str>) -> BenchResult<ResultProbe> {
        let df = self.plan.clone().collect()?;
        let column_total = match total_column {
            Some(name) => df
                .column(name)?
                .cast(&DataType::Float64)?
                .as_materialized_series()
                .f64()?
                .sum(),
            None => None,
        };
        Ok(ResultProbe {
            rows: df.height() as u64,
            column_total,
        })
    }
}

impl EngineAdapter for PolarsAdapter {
    fn name(&self) -> &str {
        "polars"
    }

    fn info(&self) -> EngineInfo {
        let threads = std::env::var("POLARS_MAX_THREADS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(available_threads);
        EngineInfo {
            version: Some(POLARS_VERSION.to_string()),
            threads: Some(threads),
            granularity: "optimize + execute per run".into(),
        }
    }

    fn load(&mut self, catalog: &DatasetCatalog) -> BenchResult<()> {
        self.groupby = Some(read_csv(&catalog.groupby)?);
        self.join_left = Some(read_csv(&catalog.join_left)?);
        self.join_right = Some(read_csv(&catalog.join_right)?);
        Ok(())
    }

    fn build<'a>(&'a self, query: &QuerySpec) -> BenchResult<Box<dyn QueryRun + 'a>> {
        let plan = to_lazy(
            query,
            || Self::table(&self.groupby, "groupby"),
            || {
                Ok((
                    Self::table(&self.join_left, "join_left")?,
                    Self::table(&self.join_right, "join_right")?,
                ))
            },
        )?;
        tracing::debug!(engine = "polars", query = %query.id, "built");
        Ok(Box::new(PolarsRun { plan }))
    }

    fn teardown(&mut self) -> BenchResult<()> {
        self.groupby = None;
        self.join_left = None;
        self.join_right = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SortKey;

    fn frame() -> DataFrame {
        df! {
            "id1" => ["id001", "id002", "id001", "id002", "id001"],
            "id2" => ["id001", "id001", "id002", "id002", "id001"],
            "v1" => [1i64, 2, 3, 4, 5],
            "v3" => [1.0f64, 2.0, 3.0, 4.0, 5.0],
        }
        .unwrap()
    }

    fn adapter() -> PolarsAdapter {
        PolarsAdapter {
            groupby: Some(frame()),
            ..Default::default()
        }
    }

    #[test]
    fn test_groupby_sum_and_count() {
        let adapter = adapter();
        let q = QuerySpec::group_by(
            "g",
            "g",
            &["id1"],
            &[(AggOp::Sum, "v1"), (AggOp::Count, "v1")],
        );
        let mut run = adapter.build(&q).unwrap();
        let probe = run.probe(Some("v1")).unwrap();
        assert_eq!(probe.rows, 2);
        assert_eq!(probe.column_total, Some(15.0));
        let counts = run.probe(Some("cnt")).unwrap();
        assert_eq!(counts.column_total, Some(5.0));
    }

    #[test]
    fn test_sort_descending() {
        let adapter = adapter();
        let q = QuerySpec::sort("s", "s", vec![SortKey::desc("v1")]);
        let plan = to_lazy(&q, || PolarsAdapter::table(&adapter.groupby, "groupby"), || {
            unreachable!()
        })
        .unwrap();
        let df = plan.collect().unwrap();
        let v1 = df.column("v1").unwrap().as_materialized_series().i64().unwrap();
        assert_eq!(v1.get(0), Some(5));
        assert_eq!(v1.get(4), Some(1));
    }

    #[test]
    fn test_join_needs_loaded_tables() {
        let adapter = adapter();
        let q = QuerySpec::inner_join("j", "j", &["id1"], &[], &[]);
        assert!(matches!(
            adapter.build(&q).err().unwrap(),
            BenchError::NotLoaded { engine: "polars", .. }
        ));
    }
}
