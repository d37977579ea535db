//! Runs a query suite against one engine and records every outcome.
//!
//! Failures are isolated: a load failure marks the engine's queries as not
//! available, a query failure marks only that query.

use crate::timing::format_ms;
use crate::{
    measure, BenchResult, DatasetCatalog, EngineAdapter, Measurement, QuerySpec,
    ResultAggregator,
};
use colored::Colorize;
use std::io::Write;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Execute once more after measuring and log the result shape.
    pub probe: bool,
}

/// Build, measure and optionally probe one query.
pub fn run_query(
    engine: &dyn EngineAdapter,
    query: &QuerySpec,
    opts: &RunOptions,
) -> BenchResult<Measurement> {
    query.validate()?;
    let mut run = engine.build(query)?;
    let measurement = measure(&query.label, || run.run(), query.plan())?;
    if opts.probe {
        let probe = run.probe(query.probe_column())?;
        tracing::info!(
            engine = engine.name(),
            query = %query.id,
            rows = probe.rows,
            total = ?probe.column_total,
            "probe"
        );
    }
    Ok(measurement)
}

/// Load, run every query, tear down. Never fails; outcomes land in `agg`.
pub fn run_engine(
    engine: &mut dyn EngineAdapter,
    catalog: &DatasetCatalog,
    suite: &[QuerySpec],
    agg: &mut ResultAggregator,
    opts: &RunOptions,
) {
    let name = engine.name().to_string();
    let info = engine.info();
    println!(
        "\n{} {}",
        format!("▶ {}", name).bold().green(),
        info.version.as_deref().unwrap_or("").dimmed()
    );
    agg.set_engine(&name, info);

    if let Err(e) = engine.load(catalog) {
        println!("  {} load: {}", "ERR".red(), e);
        tracing::error!(engine = %name, error = %e, "load failed");
        agg.mark_unavailable(&name, &format!("load failed: {}", e));
        if let Err(e) = engine.teardown() {
            tracing::warn!(engine = %name, error = %e, "teardown failed");
        }
        return;
    }

    for query in suite {
        print!("  {:28} ", query.label);
        let _ = std::io::stdout().flush();
        match run_query(&*engine, query, opts) {
            Ok(m) => {
                println!("{:>10}", format_ms(m.median_ms));
                agg.record(&name, &query.id, &m);
            }
            Err(e) => {
                println!("{:>10} {}", "ERR".red(), e);
                tracing::error!(engine = %name, query = %query.id, error = %e, "query failed");
                agg.record_failure(&name, &query.id, e.to_string());
            }
        }
    }

    if let Err(e) = engine.teardown() {
        tracing::warn!(engine = %name, error = %e, "teardown failed");
    }
}
