// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Baseline-relative comparison of benchmark metrics.
//!
//! The first entry is the baseline. Ratios whose divisor is zero read 0,
//! which means "incomparable", not "zero speedup".

use serde::Serialize;

use super::runner::BenchmarkMetrics;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub backend_name: String,
    /// Average trial time in seconds.
    pub execution_time: f64,
    /// `baseline.avg_time / avg_time`; 0 when `avg_time` is 0.
    pub speedup_factor: f64,
    pub memory_usage_mb: f64,
    /// `avg_memory / baseline.avg_memory`; 0 when the baseline is 0.
    pub memory_ratio: f64,
    pub result_count: usize,
}

/// One row per metric, input order preserved.
#[must_use]
pub fn compare_results(metrics: &[BenchmarkMetrics]) -> Vec<ComparisonRow> {
    let Some(baseline) = metrics.first() else {
        return Vec::new();
    };

    metrics
        .iter()
        .map(|metric| ComparisonRow {
            backend_name: metric.backend_name.clone(),
            execution_time: metric.avg_time,
            speedup_factor: ratio(baseline.avg_time, metric.avg_time),
            memory_usage_mb: metric.avg_memory / BYTES_PER_MB,
            memory_ratio: ratio(metric.avg_memory, baseline.avg_memory),
            result_count: metric.result_count,
        })
        .collect()
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Lowest execution time. Ties are not broken: the first row seen wins.
#[must_use]
pub fn winner(rows: &[ComparisonRow]) -> Option<&ComparisonRow> {
    rows.iter().fold(None, |best: Option<&ComparisonRow>, row| match best {
        Some(b) if b.execution_time <= row.execution_time => Some(b),
        _ => Some(row),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "backends", rename_all = "snake_case")]
pub enum Standing {
    Winner(String),
    Tie(Vec<String>),
    NoResults,
}

/// Wins per backend across a catalog sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Scoreboard {
    /// Registration order.
    wins: Vec<(String, usize)>,
}

impl Scoreboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a backend appears even without wins.
    pub fn register(&mut self, backend: &str) {
        if !self.wins.iter().any(|(name, _)| name == backend) {
            self.wins.push((backend.to_string(), 0));
        }
    }

    /// Credit the winner of one case. Cases with fewer than two rows have
    /// nothing to compare and are skipped.
    pub fn record(&mut self, rows: &[ComparisonRow]) {
        for row in rows {
            self.register(&row.backend_name);
        }
        if rows.len() < 2 {
            return;
        }
        if let Some(best) = winner(rows) {
            if let Some(entry) = self.wins.iter_mut().find(|(name, _)| *name == best.backend_name) {
                entry.1 += 1;
            }
        }
    }

    #[must_use]
    pub fn wins(&self, backend: &str) -> usize {
        self.wins
            .iter()
            .find(|(name, _)| name == backend)
            .map_or(0, |(_, count)| *count)
    }

    pub fn tallies(&self) -> impl Iterator<Item = (&str, usize)> {
        self.wins.iter().map(|(name, count)| (name.as_str(), *count))
    }

    #[must_use]
    pub fn standing(&self) -> Standing {
        let Some(top) = self.wins.iter().map(|(_, count)| *count).max() else {
            return Standing::NoResults;
        };
        if top == 0 {
            return Standing::NoResults;
        }
        let mut leaders: Vec<String> = self
            .wins
            .iter()
            .filter(|(_, count)| *count == top)
            .map(|(name, _)| name.clone())
            .collect();
        if leaders.len() == 1 {
            Standing::Winner(leaders.remove(0))
        } else {
            Standing::Tie(leaders)
        }
    }
}
