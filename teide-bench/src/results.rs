//! Accumulates per-engine, per-query outcomes into one result record.

use crate::{DatasetCatalog, EngineInfo, Measurement, QuerySpec, SystemInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of one query on one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Measured {
        median_ms: f64,
        samples_ms: Vec<f64>,
        warmup: usize,
        iterations: usize,
    },
    NotAvailable {
        reason: String,
    },
}

impl QueryOutcome {
    pub fn median_ms(&self) -> Option<f64> {
        match self {
            QueryOutcome::Measured { median_ms, .. } => Some(*median_ms),
            QueryOutcome::NotAvailable { .. } => None,
        }
    }
}

impl From<&Measurement> for QueryOutcome {
    fn from(m: &Measurement) -> Self {
        QueryOutcome::Measured {
            median_ms: m.median_ms,
            samples_ms: m.samples_ms.clone(),
            warmup: m.plan.warmup,
            iterations: m.plan.iterations,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineRecord {
    #[serde(flatten)]
    pub info: EngineInfo,
    pub queries: BTreeMap<String, QueryOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryEntry {
    pub id: String,
    pub label: String,
}

/// The persisted result document.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    pub system: SystemInfo,
    pub dataset: DatasetCatalog,
    /// Suite order, used for report rows.
    pub queries: Vec<QueryEntry>,
    pub engines: BTreeMap<String, EngineRecord>,
}

impl BenchmarkResult {
    pub fn outcome(&self, engine: &str, query_id: &str) -> Option<&QueryOutcome> {
        self.engines.get(engine)?.queries.get(query_id)
    }

    /// `None` for a missing entry as well as a recorded failure.
    pub fn median(&self, engine: &str, query_id: &str) -> Option<f64> {
        self.outcome(engine, query_id)?.median_ms()
    }
}

pub struct ResultAggregator {
    result: BenchmarkResult,
}

impl ResultAggregator {
    pub fn new(system: SystemInfo, dataset: DatasetCatalog, suite: &[QuerySpec]) -> Self {
        let queries = suite
            .iter()
            .map(|q| QueryEntry {
                id: q.id.clone(),
                label: q.label.clone(),
            })
            .collect();
        Self {
            result: BenchmarkResult {
                system,
                dataset,
                queries,
                engines: BTreeMap::new(),
            },
        }
    }

    fn engine_mut(&mut self, engine: &str) -> &mut EngineRecord {
        self.result.engines.entry(engine.to_string()).or_default()
    }

    pub fn set_engine(&mut self, engine: &str, info: EngineInfo) {
        self.engine_mut(engine).info = info;
    }

    pub fn record(&mut self, engine: &str, query_id: &str, measurement: &Measurement) {
        self.engine_mut(engine)
            .queries
            .insert(query_id.to_string(), measurement.into());
    }

    pub fn record_failure(&mut self, engine: &str, query_id: &str, reason: impl Into<String>) {
        self.engine_mut(engine).queries.insert(
            query_id.to_string(),
            QueryOutcome::NotAvailable {
                reason: reason.into(),
            },
        );
    }

    /// Mark every suite query without an outcome as not available.
    pub fn mark_unavailable(&mut self, engine: &str, reason: &str) {
        let ids: Vec<String> = self.result.queries.iter().map(|q| q.id.clone()).collect();
        let record = self.engine_mut(engine);
        for id in ids {
            record
                .queries
                .entry(id)
                .or_insert_with(|| QueryOutcome::NotAvailable {
                    reason: reason.to_string(),
                });
        }
    }

    pub fn median(&self, engine: &str, query_id: &str) -> Option<f64> {
        self.result.median(engine, query_id)
    }

    pub fn result(&self) -> &BenchmarkResult {
        &self.result
    }

    pub fn finish(self) -> BenchmarkResult {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IterationPlan;
    use std::path::PathBuf;

    fn aggregator() -> ResultAggregator {
        let catalog = DatasetCatalog::new(
            PathBuf::from("g.csv"),
            PathBuf::from("x.csv"),
            PathBuf::from("y.csv"),
        );
        ResultAggregator::new(SystemInfo::collect(), catalog, &QuerySpec::standard_suite())
    }

    fn measurement(ms: f64) -> Measurement {
        Measurement {
            label: "q".into(),
            median_ms: ms,
            samples_ms: vec![ms],
            plan: IterationPlan::new(0, 1),
        }
    }

    #[test]
    fn test_record_and_lookup() {
        let mut agg = aggregator();
        agg.record("duckdb", "q1", &measurement(12.5));
        assert_eq!(agg.median("duckdb", "q1"), Some(12.5));
        assert_eq!(agg.median("duckdb", "q2"), None);
        assert_eq!(agg.median("polars", "q1"), None);
    }

    #[test]
    fn test_failure_is_not_a_zero() {
        let mut agg = aggregator();
        agg.record_failure("teide", "j1", "boom");
        let result = agg.finish();
        assert_eq!(result.median("teide", "j1"), None);
        assert!(matches!(
            result.outcome("teide", "j1"),
            Some(QueryOutcome::NotAvailable { reason }) if reason == "boom"
        ));
    }

    #[test]
    fn test_mark_unavailable_keeps_measured() {
        let mut agg = aggregator();
        agg.record("polars", "q1", &measurement(3.0));
        agg.mark_unavailable("polars", "crashed");
        let result = agg.finish();
        let queries = &result.engines["polars"].queries;
        assert_eq!(queries.len(), 8);
        assert_eq!(result.median("polars", "q1"), Some(3.0));
        assert!(queries["s6"].median_ms().is_none());
    }

    #[test]
    fn test_json_shape() {
        let mut agg = aggregator();
        agg.set_engine(
            "duckdb",
            EngineInfo {
                version: Some("v1.1.3".into()),
                threads: Some(8),
                granularity: "plan + execute".into(),
            },
        );
        agg.record("duckdb", "q1", &measurement(1.5));
        agg.record_failure("duckdb", "q2", "nope");
        let json = serde_json::to_value(agg.result()).unwrap();
        let duck = &json["engines"]["duckdb"];
        assert_eq!(duck["version"], "v1.1.3");
        assert_eq!(duck["threads"], 8);
        assert_eq!(duck["queries"]["q1"]["status"], "measured");
        assert_eq!(duck["queries"]["q1"]["median_ms"], 1.5);
        assert_eq!(duck["queries"]["q2"]["status"], "not_available");
        assert_eq!(json["queries"][0]["id"], "q1");
    }
}
