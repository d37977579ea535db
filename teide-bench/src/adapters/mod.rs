//! Engine adapter modules.

pub mod duckdb_adapter;
pub mod polars_adapter;
pub mod teide_adapter;

/// Engines in run order.
pub const ENGINES: [&str; 3] = ["duckdb", "polars", "teide"];
