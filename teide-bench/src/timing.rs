//! Warm-up + repeated measurement + median reduction.

use crate::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const DEFAULT_WARMUP: usize = 3;
pub const DEFAULT_ITERATIONS: usize = 7;
/// Joins are costlier; fewer repetitions bound total run time.
pub const JOIN_ITERATIONS: usize = 5;

/// How many times to call the operation before and during measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationPlan {
    pub warmup: usize,
    pub iterations: usize,
}

impl IterationPlan {
    pub const fn new(warmup: usize, iterations: usize) -> Self {
        Self { warmup, iterations }
    }
}

impl Default for IterationPlan {
    fn default() -> Self {
        Self::new(DEFAULT_WARMUP, DEFAULT_ITERATIONS)
    }
}

/// Outcome of one [`measure`] call.
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub label: String,
    pub median_ms: f64,
    pub samples_ms: Vec<f64>,
    pub plan: IterationPlan,
}

/// Lower median: the middle element for odd counts, the smaller of the two
/// middle elements for even counts. `None` for an empty slice.
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted[(sorted.len() - 1) / 2])
}

/// Call `sample` `plan.warmup` times discarding the values, then
/// `plan.iterations` times keeping them.
pub fn collect_samples<F>(plan: IterationPlan, mut sample: F) -> BenchResult<Vec<f64>>
where
    F: FnMut() -> BenchResult<f64>,
{
    if plan.iterations == 0 {
        return Err(BenchError::Config("iteration count must be at least 1".into()));
    }
    for _ in 0..plan.warmup {
        sample()?;
    }
    let mut samples = Vec::with_capacity(plan.iterations);
    for _ in 0..plan.iterations {
        samples.push(sample()?);
    }
    Ok(samples)
}

/// Time `thunk` under `plan` and reduce to the median wall time in milliseconds.
///
/// The value returned by `thunk` is dropped after the clock stops, so whatever
/// it owns is freed between calls but outside the measurement. Warm-up calls
/// go through the same path.
pub fn measure<F, T>(label: &str, mut thunk: F, plan: IterationPlan) -> BenchResult<Measurement>
where
    F: FnMut() -> BenchResult<T>,
{
    let samples_ms = collect_samples(plan, || {
        let start = Instant::now();
        let out = thunk()?;
        let elapsed = start.elapsed();
        drop(out);
        Ok(elapsed.as_secs_f64() * 1_000.0)
    })?;
    let median_ms = median(&samples_ms).unwrap_or_default();
    tracing::debug!(label, median_ms, ?samples_ms, "measured");
    Ok(Measurement {
        label: label.to_string(),
        median_ms,
        samples_ms,
        plan,
    })
}

/// `850us`, `12.3ms`, `1.42s`.
pub fn format_ms(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.0}us", ms * 1_000.0)
    } else if ms < 1_000.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{:.2}s", ms / 1_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.0));
        assert_eq!(median(&[5.0]), Some(5.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_median_resists_outlier() {
        assert_eq!(median(&[10.0, 11.0, 9.0, 500.0, 10.5]), Some(10.5));
    }

    #[test]
    fn test_warmup_excluded() {
        let calls = Cell::new(0u32);
        let samples = collect_samples(IterationPlan::new(3, 1), || {
            calls.set(calls.get() + 1);
            Ok(calls.get() as f64)
        })
        .unwrap();
        assert_eq!(samples, vec![4.0]);
        assert_eq!(median(&samples), Some(4.0));
    }

    #[test]
    fn test_measure_call_count() {
        let mut calls = 0;
        let m = measure(
            "count",
            || {
                calls += 1;
                Ok(())
            },
            IterationPlan::new(3, 7),
        )
        .unwrap();
        assert_eq!(calls, 10);
        assert_eq!(m.samples_ms.len(), 7);
        assert!(m.median_ms >= 0.0);
    }

    #[test]
    fn test_measure_drops_output_before_next_call() {
        use std::rc::Rc;
        let live = Rc::new(());
        let mut max_seen = 0;
        measure(
            "drop",
            || {
                max_seen = max_seen.max(Rc::strong_count(&live));
                Ok(Rc::clone(&live))
            },
            IterationPlan::new(2, 3),
        )
        .unwrap();
        // Only the outer reference was ever alive when the thunk started.
        assert_eq!(max_seen, 1);
        assert_eq!(Rc::strong_count(&live), 1);
    }

    #[test]
    fn test_error_stops_protocol() {
        let mut calls = 0;
        let err = measure::<_, ()>(
            "fail",
            || {
                calls += 1;
                if calls == 2 {
                    Err(BenchError::Config("boom".into()))
                } else {
                    Ok(())
                }
            },
            IterationPlan::new(3, 3),
        );
        assert!(err.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(collect_samples(IterationPlan::new(1, 0), || Ok(1.0)).is_err());
    }

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(0.25), "250us");
        assert_eq!(format_ms(12.34), "12.3ms");
        assert_eq!(format_ms(1420.0), "1.42s");
    }
}
