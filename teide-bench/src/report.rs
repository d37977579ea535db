//! Comparison table, wins summary, CSV and JSON export.

use crate::results::{BenchmarkResult, QueryOutcome};
use crate::timing::format_ms;
use crate::BenchResult;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use std::collections::BTreeMap;
use std::path::Path;

const NOT_AVAILABLE: &str = "N/A";

// ────────────────────────────────────────────────────────────────────────────────
// Terminal output
// ────────────────────────────────────────────────────────────────────────────────

/// Fastest engine for one query, if any engine measured it.
pub fn fastest<'r>(result: &'r BenchmarkResult, query_id: &str) -> Option<(&'r str, f64)> {
    result
        .engines
        .keys()
        .filter_map(|engine| {
            result
                .median(engine, query_id)
                .map(|ms| (engine.as_str(), ms))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Rows are queries in suite order, columns are engines.
pub fn comparison_table(result: &BenchmarkResult) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);

    let mut header = vec!["Query".to_string()];
    header.extend(result.engines.keys().cloned());
    table.set_header(header);

    for query in &result.queries {
        let best = fastest(result, &query.id).map(|(engine, _)| engine);
        let mut row = vec![Cell::new(&query.label)];
        for engine in result.engines.keys() {
            let cell = match result.median(engine, &query.id) {
                Some(ms) if best == Some(engine.as_str()) => {
                    Cell::new(format!("★ {}", format_ms(ms))).fg(Color::Green)
                }
                Some(ms) => Cell::new(format_ms(ms)),
                None => Cell::new(NOT_AVAILABLE).fg(Color::DarkGrey),
            };
            row.push(cell);
        }
        table.add_row(row);
    }
    table
}

/// Queries won per engine, most wins first. Engines without wins are listed with zero.
pub fn wins(result: &BenchmarkResult) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> =
        result.engines.keys().map(|e| (e.as_str(), 0)).collect();
    for query in &result.queries {
        if let Some((engine, _)) = fastest(result, &query.id) {
            *counts.entry(engine).or_default() += 1;
        }
    }
    let mut list: Vec<_> = counts
        .into_iter()
        .map(|(engine, n)| (engine.to_string(), n))
        .collect();
    list.sort_by(|a, b| b.1.cmp(&a.1));
    list
}

pub fn print_report(result: &BenchmarkResult) {
    println!(
        "\n{}",
        "╔══════════════════════════════════════════════════════════════╗"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "║          H2O.ai db-benchmark Comparison Report              ║"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════════════╝"
            .bold()
            .blue()
    );
    println!(
        "  OS: {}  Arch: {}  CPUs: {}  Time: {}",
        result.system.os, result.system.arch, result.system.cpus, result.system.timestamp
    );

    for (name, record) in &result.engines {
        let version = record.info.version.as_deref().unwrap_or("unknown");
        let threads = record
            .info
            .threads
            .map(|t| format!("{} threads", t))
            .unwrap_or_else(|| "threads n/a".to_string());
        println!(
            "  {} {}",
            format!("{:>8}", name).bold(),
            format!("{} ({}), {}", version, threads, record.info.granularity).dimmed()
        );
    }

    println!("{}", comparison_table(result));

    for (name, record) in &result.engines {
        for (id, outcome) in &record.queries {
            if let QueryOutcome::NotAvailable { reason } = outcome {
                println!("  {} {} {}", name.dimmed(), id.dimmed(), reason.dimmed());
            }
        }
    }

    println!("\n{}", "── Summary: Wins by Engine ──".bold().yellow());
    for (engine, count) in wins(result) {
        println!("  {} {} wins", format!("{:>12}", engine).bold(), count);
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// CSV export
// ────────────────────────────────────────────────────────────────────────────────

pub fn export_csv(result: &BenchmarkResult, path: &Path) -> BenchResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "engine",
        "query",
        "label",
        "status",
        "median_ms",
        "warmup",
        "iterations",
        "samples_ms",
        "reason",
    ])?;

    for (engine, record) in &result.engines {
        for query in &result.queries {
            let label = query.label.as_str();
            match record.queries.get(&query.id) {
                Some(QueryOutcome::Measured {
                    median_ms,
                    samples_ms,
                    warmup,
                    iterations,
                }) => {
                    let samples = samples_ms
                        .iter()
                        .map(|s| format!("{:.4}", s))
                        .collect::<Vec<_>>()
                        .join(";");
                    let median = format!("{:.4}", median_ms);
                    let warmup = warmup.to_string();
                    let iterations = iterations.to_string();
                    wtr.write_record([
                        engine.as_str(),
                        query.id.as_str(),
                        label,
                        "measured",
                        median.as_str(),
                        warmup.as_str(),
                        iterations.as_str(),
                        samples.as_str(),
                        "",
                    ])?;
                }
                Some(QueryOutcome::NotAvailable { reason }) => {
                    wtr.write_record([
                        engine.as_str(),
                        query.id.as_str(),
                        label,
                        "not_available",
                        "",
                        "",
                        "",
                        "",
                        reason.as_str(),
                    ])?;
                }
                None => {
                    wtr.write_record([
                        engine.as_str(),
                        query.id.as_str(),
                        label,
                        "not_available",
                        "",
                        "",
                        "",
                        "",
                        "not run",
                    ])?;
                }
            }
        }
    }

    wtr.flush()?;
    println!("  CSV exported to {}", path.display());
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────────
// JSON export
// ────────────────────────────────────────────────────────────────────────────────

pub fn export_json(result: &BenchmarkResult, path: &Path) -> BenchResult<()> {
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)?;
    println!("  JSON exported to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DatasetCatalog, IterationPlan, Measurement, QuerySpec, ResultAggregator, SystemInfo};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample_result() -> BenchmarkResult {
        let catalog = DatasetCatalog::new(
            PathBuf::from("g.csv"),
            PathBuf::from("x.csv"),
            PathBuf::from("y.csv"),
        );
        let mut agg =
            ResultAggregator::new(SystemInfo::collect(), catalog, &QuerySpec::standard_suite());
        let m = |ms: f64| Measurement {
            label: String::new(),
            median_ms: ms,
            samples_ms: vec![ms, ms + 1.0],
            plan: IterationPlan::new(3, 2),
        };
        agg.record("duckdb", "q1", &m(10.0));
        agg.record("polars", "q1", &m(5.0));
        agg.record("duckdb", "q2", &m(2.0));
        agg.record("polars", "q2", &m(4.0));
        agg.record("duckdb", "q3", &m(1.0));
        agg.record_failure("teide", "q1", "library not found");
        agg.finish()
    }

    #[test]
    fn test_fastest_ignores_missing() {
        let result = sample_result();
        assert_eq!(fastest(&result, "q1"), Some(("polars", 5.0)));
        assert_eq!(fastest(&result, "q3"), Some(("duckdb", 1.0)));
        assert_eq!(fastest(&result, "j1"), None);
    }

    #[test]
    fn test_wins_summary() {
        let result = sample_result();
        let w = wins(&result);
        assert_eq!(w[0], ("duckdb".to_string(), 2));
        assert!(w.contains(&("polars".to_string(), 1)));
        assert!(w.contains(&("teide".to_string(), 0)));
    }

    #[test]
    fn test_table_marks_missing() {
        let rendered = comparison_table(&sample_result()).to_string();
        assert!(rendered.contains(NOT_AVAILABLE));
        assert!(rendered.contains("★ 5.0ms"));
        assert!(rendered.contains("teide"));
    }

    #[test]
    fn test_exports() {
        let tmp = TempDir::new().unwrap();
        let result = sample_result();

        let json_path = tmp.path().join("results.json");
        export_json(&result, &json_path).unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&json_path).unwrap()).unwrap();
        assert_eq!(value["engines"]["polars"]["queries"]["q1"]["median_ms"], 5.0);

        let csv_path = tmp.path().join("results.csv");
        export_csv(&result, &csv_path).unwrap();
        let mut rdr = csv::Reader::from_path(&csv_path).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        // 3 engines x 8 queries
        assert_eq!(rows.len(), 24);
        assert!(rows
            .iter()
            .any(|r| &r[0] == "teide" && &r[1] == "q1" && &r[8] == "library not found"));
    }
}
