//! Lightweight in-memory latency rollups for feed-build diagnostics.
//!
//! Keeps a bounded sample window per operation so p95 diagnostics are
//! available without persistent storage or any metrics exporter.

use std::collections::{HashMap, VecDeque};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

const MAX_SAMPLES_PER_OP: usize = 256;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpLatencyRollup {
    pub operation: String,
    pub sample_count: usize,
    pub p50_ms: u128,
    pub p95_ms: u128,
    pub max_ms: u128,
    pub budget_ms: u128,
    pub budget_violations: u64,
    /// Builds that completed degraded (one or more sources missing).
    pub degraded_count: u64,
    pub last_recorded_at: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct OpWindow {
    samples_ms: VecDeque<u128>,
    budget_ms: u128,
    budget_violations: u64,
    degraded_count: u64,
    last_recorded_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct LatencyRecorder {
    windows: Mutex<HashMap<String, OpWindow>>,
}

impl LatencyRecorder {
    fn global() -> &'static Self {
        static RECORDER: OnceLock<LatencyRecorder> = OnceLock::new();
        RECORDER.get_or_init(Self::default)
    }

    fn record_sample(&self, operation: &str, elapsed_ms: u128, budget_ms: u128) {
        let mut windows = self.windows.lock();
        let window = windows.entry(operation.to_string()).or_default();
        window.budget_ms = budget_ms;
        if elapsed_ms > budget_ms {
            window.budget_violations += 1;
        }
        if window.samples_ms.len() >= MAX_SAMPLES_PER_OP {
            window.samples_ms.pop_front();
        }
        window.samples_ms.push_back(elapsed_ms);
        window.last_recorded_at = Some(Utc::now());
    }

    fn increment_degraded(&self, operation: &str) {
        let mut windows = self.windows.lock();
        let window = windows.entry(operation.to_string()).or_default();
        window.degraded_count += 1;
    }

    fn snapshot(&self) -> Vec<OpLatencyRollup> {
        let windows = self.windows.lock();
        let mut rollups: Vec<OpLatencyRollup> = windows
            .iter()
            .map(|(operation, window)| {
                let mut values: Vec<u128> = window.samples_ms.iter().copied().collect();
                values.sort_unstable();

                OpLatencyRollup {
                    operation: operation.clone(),
                    sample_count: values.len(),
                    p50_ms: percentile(&values, 50.0).unwrap_or(0),
                    p95_ms: percentile(&values, 95.0).unwrap_or(0),
                    max_ms: values.last().copied().unwrap_or(0),
                    budget_ms: window.budget_ms,
                    budget_violations: window.budget_violations,
                    degraded_count: window.degraded_count,
                    last_recorded_at: window.last_recorded_at.map(|dt| dt.to_rfc3339()),
                }
            })
            .collect();

        rollups.sort_by(|a, b| b.p95_ms.cmp(&a.p95_ms).then(a.operation.cmp(&b.operation)));
        rollups
    }
}

fn percentile(values: &[u128], p: f64) -> Option<u128> {
    if values.is_empty() {
        return None;
    }
    let n = values.len();
    let rank = ((p / 100.0) * n as f64).ceil() as usize;
    Some(values[rank.saturating_sub(1).min(n - 1)])
}

pub fn record_latency(operation: &str, elapsed_ms: u128, budget_ms: u128) {
    LatencyRecorder::global().record_sample(operation, elapsed_ms, budget_ms);
}

pub fn increment_degraded(operation: &str) {
    LatencyRecorder::global().increment_degraded(operation);
}

pub fn get_rollups() -> Vec<OpLatencyRollup> {
    LatencyRecorder::global().snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_of_empty_window_is_none() {
        assert_eq!(percentile(&[], 95.0), None);
    }

    #[test]
    fn percentile_small_samples() {
        let values = vec![10_u128, 20, 30];
        assert_eq!(percentile(&values, 50.0), Some(20));
        assert_eq!(percentile(&values, 95.0), Some(30));
    }

    #[test]
    fn window_is_bounded() {
        let recorder = LatencyRecorder::default();
        for ms in 1..=400 {
            recorder.record_sample("compose_feed_test", ms, 50);
        }
        let rollups = recorder.snapshot();
        let rollup = rollups
            .iter()
            .find(|r| r.operation == "compose_feed_test")
            .expect("rollup");
        assert_eq!(rollup.sample_count, MAX_SAMPLES_PER_OP);
        assert_eq!(rollup.max_ms, 400);
    }

    #[test]
    fn violations_count_only_over_budget_samples() {
        let recorder = LatencyRecorder::default();
        recorder.record_sample("op", 40, 50);
        recorder.record_sample("op", 50, 50);
        recorder.record_sample("op", 51, 50);

        let rollups = recorder.snapshot();
        assert_eq!(rollups[0].budget_violations, 1);
    }

    #[test]
    fn degraded_counter_is_independent_of_samples() {
        let recorder = LatencyRecorder::default();
        recorder.increment_degraded("op");
        recorder.increment_degraded("op");

        let rollups = recorder.snapshot();
        assert_eq!(rollups[0].degraded_count, 2);
        assert_eq!(rollups[0].sample_count, 0);
    }
}
