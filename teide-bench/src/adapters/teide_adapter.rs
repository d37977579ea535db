//! Teide adapter over the C engine.
//!
//! `build` constructs the operator graph and optimizes it once; each run is a
//! single `execute`. Results are released when the harness drops them, after
//! the clock stops and before the next call.

use crate::native::ffi::{TD_JOIN_INNER, TD_OP_AVG, TD_OP_COUNT, TD_OP_SUM};
use crate::native::{Graph, NativeApi, NativeResult, Node, Plan, Session, Table, TeideLib};
use crate::query::{AggOp, JoinKind, QueryKind, QuerySpec};
use crate::{
    BenchError, BenchResult, DatasetCatalog, EngineAdapter, EngineInfo, Materialized, QueryRun,
    ResultProbe,
};
use std::rc::Rc;

pub fn opcode(op: AggOp) -> u16 {
    match op {
        AggOp::Sum => TD_OP_SUM,
        AggOp::Avg => TD_OP_AVG,
        AggOp::Count => TD_OP_COUNT,
    }
}

fn join_kind(kind: JoinKind) -> u8 {
    match kind {
        JoinKind::Inner => TD_JOIN_INNER,
    }
}

/// Loaded tables. Fields drop in declaration order: join pair first, then the
/// grouped table.
struct Tables<A: NativeApi> {
    join_right: Table<A>,
    join_left: Table<A>,
    groupby: Table<A>,
}

pub struct TeideAdapter<A: NativeApi + 'static = TeideLib> {
    tables: Option<Tables<A>>,
    session: Rc<Session<A>>,
}

impl TeideAdapter<TeideLib> {
    /// Load the shared library named by `TEIDE_LIB`.
    pub fn from_env() -> BenchResult<Self> {
        Ok(Self::with_api(TeideLib::from_env()?))
    }
}

impl<A: NativeApi + 'static> TeideAdapter<A> {
    pub fn with_api(api: A) -> Self {
        Self {
            tables: None,
            session: Session::open(api),
        }
    }

    pub fn session(&self) -> &Rc<Session<A>> {
        &self.session
    }

    fn tables(&self) -> BenchResult<&Tables<A>> {
        self.tables.as_ref().ok_or(BenchError::NotLoaded {
            engine: "teide",
            table: "all",
        })
    }
}

/// Build and optimize the graph for `query`.
fn plan<'t, A: NativeApi>(tables: &'t Tables<A>, query: &QuerySpec) -> NativeResult<Plan<'t, A>> {
    match &query.kind {
        QueryKind::GroupBy { keys, aggs } => {
            let mut g = Graph::new(&tables.groupby)?;
            let keys = keys
                .iter()
                .map(|k| g.scan(k))
                .collect::<NativeResult<Vec<Node>>>()?;
            let inputs = aggs
                .iter()
                .map(|a| g.scan(&a.column))
                .collect::<NativeResult<Vec<Node>>>()?;
            let ops: Vec<u16> = aggs.iter().map(|a| opcode(a.op)).collect();
            let root = g.group(&keys, &ops, &inputs)?;
            g.optimize(root)
        }
        QueryKind::Sort { keys } => {
            let mut g = Graph::new(&tables.groupby)?;
            let source = g.const_table(&tables.groupby)?;
            let nodes = keys
                .iter()
                .map(|k| g.scan(&k.column))
                .collect::<NativeResult<Vec<Node>>>()?;
            let descending: Vec<bool> = keys.iter().map(|k| k.is_descending()).collect();
            let root = g.sort(source, &nodes, &descending)?;
            g.optimize(root)
        }
        QueryKind::Join {
            left_keys,
            right_keys,
            join,
            ..
        } => {
            let mut g = Graph::new(&tables.join_left)?;
            let left = g.const_table(&tables.join_left)?;
            let right = g.const_table(&tables.join_right)?;
            let lk = left_keys
                .iter()
                .map(|k| g.scan(k))
                .collect::<NativeResult<Vec<Node>>>()?;
            // Right keys come straight from the loaded table as borrowed vectors.
            let mut rk = Vec::with_capacity(right_keys.len());
            for k in right_keys {
                let column = tables.join_right.column(k)?;
                rk.push(g.const_vec(column)?);
            }
            let root = g.join(left, &lk, right, &rk, join_kind(*join))?;
            g.optimize(root)
        }
    }
}

struct NativeRun<'t, A: NativeApi> {
    plan: Plan<'t, A>,
}

impl<A: NativeApi + 'static> QueryRun for NativeRun<'_, A> {
    fn run(&mut self) -> BenchResult<Materialized> {
        let handle = self.plan.execute()?;
        Ok(Materialized::holding(handle))
    }

    /// Row count only; the engine exposes no column values here.
    fn probe(&mut self, _total_column: Option<&str>) -> BenchResult<ResultProbe> {
        let handle = self.plan.execute()?;
        Ok(ResultProbe {
            rows: handle.nrows().max(0) as u64,
            column_total: None,
        })
    }
}

impl<A: NativeApi + 'static> EngineAdapter for TeideAdapter<A> {
    fn name(&self) -> &str {
        "teide"
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            version: None,
            threads: None,
            granularity: "execute per run (graph built and optimized once)".into(),
        }
    }

    fn load(&mut self, catalog: &DatasetCatalog) -> BenchResult<()> {
        // Replacing already-loaded tables releases them first.
        self.tables = None;
        let groupby = self.session.read_csv(&catalog.groupby)?;
        let join_left = self.session.read_csv(&catalog.join_left)?;
        let join_right = self.session.read_csv(&catalog.join_right)?;
        for t in [&groupby, &join_left, &join_right] {
            tracing::info!(engine = "teide", path = %t.path().display(), rows = t.nrows(), "loaded");
        }
        self.tables = Some(Tables {
            join_right,
            join_left,
            groupby,
        });
        Ok(())
    }

    fn build<'a>(&'a self, query: &QuerySpec) -> BenchResult<Box<dyn QueryRun + 'a>> {
        let plan = plan(self.tables()?, query)?;
        tracing::debug!(engine = "teide", query = %query.id, root = plan.root().0, "built");
        Ok(Box::new(NativeRun { plan }))
    }

    fn teardown(&mut self) -> BenchResult<()> {
        if self.tables.take().is_some() {
            tracing::debug!(engine = "teide", "tables released");
        }
        Ok(())
    }
}
