//! Engine-neutral query descriptions and the standard H2O suite.

use crate::timing::{IterationPlan, DEFAULT_ITERATIONS, DEFAULT_WARMUP, JOIN_ITERATIONS};
use crate::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggOp {
    Sum,
    Avg,
    Count,
}

impl AggOp {
    pub fn sql(&self) -> &'static str {
        match self {
            AggOp::Sum => "SUM",
            AggOp::Avg => "AVG",
            AggOp::Count => "COUNT",
        }
    }
}

/// One `(operator, input column)` pair of a group-by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub op: AggOp,
    pub column: String,
}

impl Aggregation {
    pub fn new(op: AggOp, column: &str) -> Self {
        Self {
            op,
            column: column.to_string(),
        }
    }

    /// SUM and AVG keep the input name, COUNT is `cnt`.
    pub fn output_name(&self) -> &str {
        match self.op {
            AggOp::Sum | AggOp::Avg => &self.column,
            AggOp::Count => "cnt",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            order: SortOrder::Desc,
        }
    }

    pub fn is_descending(&self) -> bool {
        self.order == SortOrder::Desc
    }
}

/// Only inner joins are benchmarked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Inner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryKind {
    /// Aggregate over the grouped table. Key order defines output order, not uniqueness.
    GroupBy {
        keys: Vec<String>,
        aggs: Vec<Aggregation>,
    },
    /// Order the grouped table by the keys.
    Sort { keys: Vec<SortKey> },
    /// Equi-join of the left and right join tables, keys paired by position.
    Join {
        left_keys: Vec<String>,
        right_keys: Vec<String>,
        #[serde(default)]
        join: JoinKind,
        /// Non-key columns carried from the left table.
        #[serde(default)]
        left_values: Vec<String>,
        /// Non-key columns carried from the right table.
        #[serde(default)]
        right_values: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: QueryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
}

impl QuerySpec {
    pub fn new(id: &str, label: &str, kind: QueryKind) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            kind,
            warmup: None,
            iterations: None,
        }
    }

    pub fn group_by(id: &str, label: &str, keys: &[&str], aggs: &[(AggOp, &str)]) -> Self {
        Self::new(
            id,
            label,
            QueryKind::GroupBy {
                keys: owned(keys),
                aggs: aggs.iter().map(|(op, c)| Aggregation::new(*op, c)).collect(),
            },
        )
    }

    pub fn sort(id: &str, label: &str, keys: Vec<SortKey>) -> Self {
        Self::new(id, label, QueryKind::Sort { keys })
    }

    pub fn inner_join(
        id: &str,
        label: &str,
        keys: &[&str],
        left_values: &[&str],
        right_values: &[&str],
    ) -> Self {
        Self::new(
            id,
            label,
            QueryKind::Join {
                left_keys: owned(keys),
                right_keys: owned(keys),
                join: JoinKind::Inner,
                left_values: owned(left_values),
                right_values: owned(right_values),
            },
        )
    }

    pub fn with_plan(mut self, plan: IterationPlan) -> Self {
        self.warmup = Some(plan.warmup);
        self.iterations = Some(plan.iterations);
        self
    }

    pub fn is_join(&self) -> bool {
        matches!(self.kind, QueryKind::Join { .. })
    }

    /// The kind's default plan with any per-query overrides applied.
    pub fn plan(&self) -> IterationPlan {
        let base = IterationPlan::for_query(self);
        IterationPlan::new(
            self.warmup.unwrap_or(base.warmup),
            self.iterations.unwrap_or(base.iterations),
        )
    }

    /// Column worth summing when probing the result (first aggregation output).
    pub fn probe_column(&self) -> Option<&str> {
        match &self.kind {
            QueryKind::GroupBy { aggs, .. } => aggs.first().map(|a| a.output_name()),
            _ => None,
        }
    }

    pub fn validate(&self) -> BenchResult<()> {
        let invalid = |reason: &str| BenchError::InvalidQuery {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.iterations == Some(0) {
            return Err(invalid("iterations must be at least 1"));
        }
        match &self.kind {
            QueryKind::GroupBy { keys, aggs } => {
                if keys.is_empty() {
                    return Err(invalid("group-by needs at least one key"));
                }
                if aggs.is_empty() {
                    return Err(invalid("group-by needs at least one aggregation"));
                }
                let mut seen: HashSet<&str> = keys.iter().map(String::as_str).collect();
                for agg in aggs {
                    if !seen.insert(agg.output_name()) {
                        return Err(invalid(&format!(
                            "duplicate output column '{}'",
                            agg.output_name()
                        )));
                    }
                }
            }
            QueryKind::Sort { keys } => {
                if keys.is_empty() {
                    return Err(invalid("sort needs at least one key"));
                }
            }
            QueryKind::Join {
                left_keys,
                right_keys,
                ..
            } => {
                if left_keys.is_empty() {
                    return Err(invalid("join needs at least one key pair"));
                }
                if left_keys.len() != right_keys.len() {
                    return Err(invalid("left and right key lists differ in length"));
                }
            }
        }
        Ok(())
    }

    /// The H2O.ai db-benchmark subset: five group-bys, two sorts, one join.
    pub fn standard_suite() -> Vec<QuerySpec> {
        use AggOp::*;
        vec![
            Self::group_by("q1", "q1 — id1, SUM", &["id1"], &[(Sum, "v1")]),
            Self::group_by("q2", "q2 — id1+id2, SUM", &["id1", "id2"], &[(Sum, "v1")]),
            Self::group_by("q3", "q3 — id3, SUM+AVG", &["id3"], &[(Sum, "v1"), (Avg, "v3")]),
            Self::group_by(
                "q5",
                "q5 — id6, 3xSUM",
                &["id6"],
                &[(Sum, "v1"), (Sum, "v2"), (Sum, "v3")],
            ),
            Self::group_by(
                "q7",
                "q7 — 6-key, SUM+COUNT",
                &["id1", "id2", "id3", "id4", "id5", "id6"],
                &[(Sum, "v3"), (Count, "v1")],
            ),
            Self::sort("s1", "sort s1 — id1 ASC", vec![SortKey::asc("id1")]),
            Self::sort(
                "s6",
                "sort s6 — 3-key ASC",
                vec![SortKey::asc("id1"), SortKey::asc("id2"), SortKey::asc("id3")],
            ),
            Self::inner_join(
                "j1",
                "join j1 — inner, 3-key",
                &["id1", "id2", "id3"],
                &["v1"],
                &["v2"],
            ),
        ]
    }
}

impl IterationPlan {
    /// 7 iterations / 3 warm-ups, joins 5 / 3.
    pub fn for_query(query: &QuerySpec) -> Self {
        let iterations = if query.is_join() {
            JOIN_ITERATIONS
        } else {
            DEFAULT_ITERATIONS
        };
        Self::new(DEFAULT_WARMUP, iterations)
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// A query suite loaded from TOML:
///
/// ```toml
/// [[query]]
/// id = "q1"
/// label = "q1 — id1, SUM"
/// kind = "group_by"
/// keys = ["id1"]
/// aggs = [{ op = "SUM", column = "v1" }]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    #[serde(rename = "query")]
    pub queries: Vec<QuerySpec>,
}

impl Suite {
    pub fn standard() -> Self {
        Self {
            queries: QuerySpec::standard_suite(),
        }
    }

    pub fn from_toml(content: &str) -> BenchResult<Self> {
        let suite: Suite = toml::from_str(content)?;
        suite.validate()?;
        Ok(suite)
    }

    pub fn load(path: &Path) -> BenchResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> BenchResult<()> {
        let mut ids = HashSet::new();
        for q in &self.queries {
            q.validate()?;
            if !ids.insert(q.id.as_str()) {
                return Err(BenchError::InvalidQuery {
                    id: q.id.clone(),
                    reason: "duplicate query id".into(),
                });
            }
        }
        Ok(())
    }
}
