//! DuckDB adapter.
//!
//! In-memory connection with DuckDB's default thread count. Each run re-plans
//! and executes `CREATE OR REPLACE TABLE _r AS <sql>`, so a measurement covers
//! planning plus execution plus materialization.

use crate::query::{AggOp, QueryKind, QuerySpec, SortOrder};
use crate::{
    BenchError, BenchResult, DatasetCatalog, EngineAdapter, EngineInfo, Materialized, QueryRun,
    ResultProbe,
};
use duckdb::Connection;
use std::path::Path;

const GROUPBY_TABLE: &str = "df";
const LEFT_TABLE: &str = "x";
const RIGHT_TABLE: &str = "y";
const RESULT_TABLE: &str = "_r";

pub struct DuckDbAdapter {
    conn: Connection,
    version: String,
    threads: usize,
    loaded: bool,
}

impl DuckDbAdapter {
    pub fn new() -> BenchResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("RESET threads;")?;
        let threads: i64 =
            conn.query_row("SELECT current_setting('threads')", [], |row| row.get(0))?;
        let version: String = conn.query_row("SELECT version()", [], |row| row.get(0))?;
        Ok(Self {
            conn,
            version,
            threads: threads.max(1) as usize,
            loaded: false,
        })
    }

    fn load_table(&self, table: &str, path: &Path) -> BenchResult<()> {
        let start = std::time::Instant::now();
        self.conn.execute_batch(&format!(
            "CREATE OR REPLACE TABLE {} AS SELECT * FROM read_csv_auto({});",
            table,
            quote_literal(&path.to_string_lossy())
        ))?;
        let rows: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        tracing::info!(
            engine = "duckdb",
            table,
            rows,
            ms = start.elapsed().as_millis() as u64,
            "loaded"
        );
        Ok(())
    }
}

/// `"name"` with embedded quotes doubled.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", table, quote_ident(column))
}

/// Translate a query into one SQL statement over `df`, `x` and `y`.
pub fn to_sql(query: &QuerySpec) -> String {
    match &query.kind {
        QueryKind::GroupBy { keys, aggs } => {
            let keys: Vec<String> = keys.iter().map(|k| quote_ident(k)).collect();
            let mut select = keys.clone();
            for agg in aggs {
                let expr = match agg.op {
                    AggOp::Count => "COUNT(*)".to_string(),
                    op => format!("{}({})", op.sql(), quote_ident(&agg.column)),
                };
                select.push(format!("{} AS {}", expr, quote_ident(agg.output_name())));
            }
            format!(
                "SELECT {} FROM {} GROUP BY {}",
                select.join(", "),
                GROUPBY_TABLE,
                keys.join(", ")
            )
        }
        QueryKind::Sort { keys } => {
            let order: Vec<String> = keys
                .iter()
                .map(|k| {
                    let dir = match k.order {
                        SortOrder::Asc => "ASC",
                        SortOrder::Desc => "DESC",
                    };
                    format!("{} {}", quote_ident(&k.column), dir)
                })
                .collect();
            format!("SELECT * FROM {} ORDER BY {}", GROUPBY_TABLE, order.join(", "))
        }
        QueryKind::Join {
            left_keys,
            right_keys,
            left_values,
            right_values,
            ..
        } => {
            let mut select: Vec<String> = left_keys
                .iter()
                .chain(left_values)
                .map(|c| qualified(LEFT_TABLE, c))
                .collect();
            select.extend(right_values.iter().map(|c| qualified(RIGHT_TABLE, c)));
            let on: Vec<String> = left_keys
                .iter()
                .zip(right_keys)
                .map(|(l, r)| format!("{} = {}", qualified(LEFT_TABLE, l), qualified(RIGHT_TABLE, r)))
                .collect();
            format!(
                "SELECT {} FROM {} INNER JOIN {} ON {}",
                select.join(", "),
                LEFT_TABLE,
                RIGHT_TABLE,
                on.join(" AND ")
            )
        }
    }
}

/// One query against the connection. Drops the scratch result table when done.
struct DuckRun<'a> {
    conn: &'a Connection,
    create: String,
}

impl QueryRun for DuckRun<'_> {
    fn run(&mut self) -> BenchResult<Materialized> {
        self.conn.execute_batch(&self.create)?;
        Ok(Materialized::none())
    }

    fn probe(&mut self, total_column: Option<&str>) -> BenchResult<ResultProbe> {
        self.run()?;
        let rows: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", RESULT_TABLE),
            [],
            |row| row.get(0),
        )?;
        let column_total = match total_column {
            Some(col) => self.conn.query_row(
                &format!(
                    "SELECT CAST(SUM({}) AS DOUBLE) FROM {}",
                    quote_ident(col),
                    RESULT_TABLE
                ),
                [],
                |row| row.get::<_, Option<f64>>(0),
            )?,
            None => None,
        };
        Ok(ResultProbe {
            rows: rows.max(0) as u64,
            column_total,
        })
    }
}

impl Drop for DuckRun<'_> {
    fn drop(&mut self) {
        if let Err(e) = self
            .conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {};", RESULT_TABLE))
        {
            tracing::warn!(engine = "duckdb", error = %e, "failed to drop result table");
        }
    }
}

impl EngineAdapter for DuckDbAdapter {
    fn name(&self) -> &str {
        "duckdb"
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            version: Some(self.version.clone()),
            threads: Some(self.threads),
            granularity: "plan + execute + materialize per run".into(),
        }
    }

    fn load(&mut self, catalog: &DatasetCatalog) -> BenchResult<()> {
        self.load_table(GROUPBY_TABLE, &catalog.groupby)?;
        self.load_table(LEFT_TABLE, &catalog.join_left)?;
        self.load_table(RIGHT_TABLE, &catalog.join_right)?;
        self.loaded = true;
        Ok(())
    }

    fn build<'a>(&'a self, query: &QuerySpec) -> BenchResult<Box<dyn QueryRun + 'a>> {
        if !self.loaded {
            return Err(BenchError::NotLoaded {
                engine: "duckdb",
                table: if query.is_join() { LEFT_TABLE } else { GROUPBY_TABLE },
            });
        }
        let sql = to_sql(query);
        tracing::debug!(engine = "duckdb", query = %query.id, %sql, "built");
        Ok(Box::new(DuckRun {
            conn: &self.conn,
            create: format!("CREATE OR REPLACE TABLE {} AS {};", RESULT_TABLE, sql),
        }))
    }

    fn teardown(&mut self) -> BenchResult<()> {
        if self.loaded {
            self.conn.execute_batch(&format!(
                "DROP TABLE IF EXISTS {}; DROP TABLE IF EXISTS {}; DROP TABLE IF EXISTS {};",
                GROUPBY_TABLE, LEFT_TABLE, RIGHT_TABLE
            ))?;
            self.loaded = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite_sql(id: &str) -> String {
        let q = QuerySpec::standard_suite()
            .into_iter()
            .find(|q| q.id == id)
            .unwrap();
        to_sql(&q)
    }

    #[test]
    fn test_groupby_sql() {
        assert_eq!(
            suite_sql("q3"),
            r#"SELECT "id3", SUM("v1") AS "v1", AVG("v3") AS "v3" FROM df GROUP BY "id3""#
        );
        assert!(suite_sql("q7").contains(r#"COUNT(*) AS "cnt""#));
    }

    #[test]
    fn test_sort_sql() {
        assert_eq!(
            suite_sql("s6"),
            r#"SELECT * FROM df ORDER BY "id1" ASC, "id2" ASC, "id3" ASC"#
        );
    }

    #[test]
    fn test_join_sql() {
        assert_eq!(
            suite_sql("j1"),
            concat!(
                r#"SELECT x."id1", x."id2", x."id3", x."v1", y."v2" FROM x INNER JOIN y ON "#,
                r#"x."id1" = y."id1" AND x."id2" = y."id2" AND x."id3" = y."id3""#
            )
        );
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident(r#"a"b"#), r#""a""b""#);
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_build_before_load() {
        let adapter = DuckDbAdapter::new().unwrap();
        let q = &QuerySpec::standard_suite()[0];
        assert!(matches!(
            adapter.build(q).err().unwrap(),
            BenchError::NotLoaded { engine: "duckdb", .. }
        ));
    }
}
