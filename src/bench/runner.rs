// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Benchmark runner.
//!
//! Backends run one after another and trials run one after another, so the
//! compared systems never see concurrent load from the sweep.
//!
//! Per backend:
//!
//! 1. Acquire a session (held until the backend is done, on every exit path)
//! 2. Warm up once, untimed
//! 3. Run N timed trials, each bounded by the trial timeout, dropping the
//!    hits before the next trial starts
//! 4. Check the cancellation flag after every trial
//!
//! Structural errors (capability, translation, invalid criteria) abort the
//! whole call before any backend is touched. Execution faults only remove
//! the failing backend from the report.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::alloc::MemoryProbe;
use super::catalog::{CaseCategory, CatalogCase};
use super::compare::{compare_results, ComparisonRow, Scoreboard};
use crate::backend::{BackendSession, SearchBackend};
use crate::config::BenchmarkConfig;
use crate::criteria::SearchCriteria;
use crate::error::SearchError;
use crate::metrics;
use crate::search::QueryPlan;

/// Heuristic label for a criteria's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    SimpleFulltext,
    ComplexBoolean,
    HybridWithFilters,
}

impl QueryType {
    #[must_use]
    pub fn detect(criteria: &SearchCriteria) -> Self {
        if criteria.has_filters() {
            Self::HybridWithFilters
        } else if criteria.query().contains(" AND ") || criteria.query().contains(" OR ") {
            Self::ComplexBoolean
        } else {
            Self::SimpleFulltext
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimpleFulltext => "simple_fulltext",
            Self::ComplexBoolean => "complex_boolean",
            Self::HybridWithFilters => "hybrid_with_filters",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed trial. Lives only for the duration of a run.
#[derive(Debug, Clone, Copy)]
struct IterationSample {
    elapsed: Duration,
    peak_memory_delta: u64,
    result_count: usize,
}

/// Per-backend summary over N trials. Times are seconds, memory is bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkMetrics {
    pub backend_name: String,
    pub query_type: QueryType,
    pub query: String,
    pub avg_time: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub avg_memory: f64,
    /// From the last trial.
    pub result_count: usize,
    pub iterations: usize,
    pub executed_at: DateTime<Utc>,
}

impl BenchmarkMetrics {
    fn from_samples(backend_name: &str, criteria: &SearchCriteria, samples: &[IterationSample]) -> Self {
        let times: Vec<f64> = samples.iter().map(|s| s.elapsed.as_secs_f64()).collect();
        let n = samples.len().max(1) as f64;

        Self {
            backend_name: backend_name.to_string(),
            query_type: QueryType::detect(criteria),
            query: criteria.query().to_string(),
            avg_time: times.iter().sum::<f64>() / n,
            min_time: times.iter().copied().fold(f64::INFINITY, f64::min),
            max_time: times.iter().copied().fold(0.0, f64::max),
            avg_memory: samples.iter().map(|s| s.peak_memory_delta as f64).sum::<f64>() / n,
            result_count: samples.last().map_or(0, |s| s.result_count),
            iterations: samples.len(),
            executed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn avg_time_ms(&self) -> f64 {
        self.avg_time * 1000.0
    }
}

/// A backend dropped from a run, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendFailure {
    pub backend: String,
    #[serde(serialize_with = "error_message")]
    pub error: SearchError,
}

fn error_message<S: Serializer>(error: &SearchError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    /// Registration order, failed backends omitted.
    pub metrics: Vec<BenchmarkMetrics>,
    pub failures: Vec<BackendFailure>,
}

impl BenchmarkReport {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Result of one catalog case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub category: CaseCategory,
    pub query: String,
    pub metrics: Vec<BenchmarkMetrics>,
    pub comparison: Vec<ComparisonRow>,
    /// Execution faults during the trials.
    pub failures: Vec<BackendFailure>,
    /// Backends that cannot express the case at all.
    pub rejections: Vec<BackendFailure>,
    /// Set when the case's criteria are malformed; nothing ran.
    #[serde(serialize_with = "optional_error_message")]
    pub invalid: Option<SearchError>,
}

fn optional_error_message<S: Serializer>(error: &Option<SearchError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.collect_str(e),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogReport {
    pub cases: Vec<CaseReport>,
    pub scoreboard: Scoreboard,
}

/// Runs criteria against every registered backend, in registration order.
pub struct BenchmarkRunner {
    backends: Vec<Arc<SearchBackend>>,
    trial_timeout: Duration,
    warmup: bool,
    cancel: Option<watch::Receiver<bool>>,
}

impl BenchmarkRunner {
    /// Default trial timeout and warmup from [`BenchmarkConfig::default`].
    #[must_use]
    pub fn new(backends: Vec<Arc<SearchBackend>>) -> Self {
        Self::with_config(backends, &BenchmarkConfig::default())
    }

    #[must_use]
    pub fn with_config(backends: Vec<Arc<SearchBackend>>, config: &BenchmarkConfig) -> Self {
        Self {
            backends,
            trial_timeout: config.trial_timeout(),
            warmup: config.warmup,
            cancel: None,
        }
    }

    /// Connect every configured backend, in order.
    ///
    /// An unreachable backend stays registered and shows up under
    /// `failures` in every report; it never prevents the others from running.
    pub async fn connect(config: &BenchmarkConfig) -> Self {
        let mut backends = Vec::with_capacity(config.backends.len());
        for backend in &config.backends {
            info!(backend = %backend.name, kind = ?backend.kind, "Registering search backend");
            let backend = SearchBackend::from_config(backend, config.price_weighting, &config.connect_retry).await;
            backends.push(Arc::new(backend));
        }
        Self::with_config(backends, config)
    }

    #[must_use]
    pub fn with_trial_timeout(mut self, trial_timeout: Duration) -> Self {
        self.trial_timeout = trial_timeout;
        self
    }

    #[must_use]
    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    /// Stop between trials once the flag turns `true`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn backends(&self) -> &[Arc<SearchBackend>] {
        &self.backends
    }

    /// Run `iterations` timed trials per backend.
    ///
    /// Every backend translates first; a structural error from any of them
    /// is returned before a single connection is opened.
    pub async fn run_benchmark(
        &self,
        criteria: &SearchCriteria,
        iterations: usize,
    ) -> Result<BenchmarkReport, SearchError> {
        check_iterations(iterations)?;
        let planned = self
            .backends
            .iter()
            .map(|backend| backend.plan(criteria).map(|plan| (backend, plan)))
            .collect::<Result<Vec<_>, _>>()?;
        self.sweep(planned, criteria, iterations).await
    }

    /// Run every case (optionally only those whose category label contains
    /// `category_filter`) and tally wins.
    ///
    /// Unlike [`run_benchmark`](Self::run_benchmark), a backend that cannot
    /// express a case is reported as a rejection and the remaining backends
    /// still run it.
    pub async fn run_catalog(
        &self,
        cases: &[CatalogCase],
        iterations: usize,
        category_filter: Option<&str>,
    ) -> Result<CatalogReport, SearchError> {
        check_iterations(iterations)?;
        let mut scoreboard = Scoreboard::new();
        for backend in &self.backends {
            scoreboard.register(backend.name());
        }

        let mut reports = Vec::new();
        for case in cases {
            if category_filter.is_some_and(|filter| !case.matches_filter(filter)) {
                continue;
            }
            let category = case.category();
            info!(case = %case.name, category = %category, query = %case.criteria.query, "Running catalog case");

            let mut report = CaseReport {
                name: case.name.clone(),
                category,
                query: case.criteria.query.clone(),
                metrics: Vec::new(),
                comparison: Vec::new(),
                failures: Vec::new(),
                rejections: Vec::new(),
                invalid: None,
            };

            let criteria = match case.criteria() {
                Ok(criteria) => criteria,
                Err(e) => {
                    warn!(case = %case.name, error = %e, "Skipping case with invalid criteria");
                    report.invalid = Some(e);
                    reports.push(report);
                    continue;
                }
            };

            let mut planned = Vec::with_capacity(self.backends.len());
            for backend in &self.backends {
                match backend.plan(&criteria) {
                    Ok(plan) => planned.push((backend, plan)),
                    Err(error) => {
                        debug!(case = %case.name, backend = %backend.name(), error = %error, "Backend rejected case");
                        report.rejections.push(BackendFailure {
                            backend: backend.name().to_string(),
                            error,
                        });
                    }
                }
            }

            let outcome = self.sweep(planned, &criteria, iterations).await?;
            report.comparison = compare_results(&outcome.metrics);
            for row in &report.comparison {
                metrics::set_speedup(&row.backend_name, row.speedup_factor);
            }
            scoreboard.record(&report.comparison);
            report.metrics = outcome.metrics;
            report.failures = outcome.failures;
            reports.push(report);
        }

        Ok(CatalogReport {
            cases: reports,
            scoreboard,
        })
    }

    async fn sweep(
        &self,
        planned: Vec<(&Arc<SearchBackend>, QueryPlan)>,
        criteria: &SearchCriteria,
        iterations: usize,
    ) -> Result<BenchmarkReport, SearchError> {
        let mut report = BenchmarkReport {
            metrics: Vec::with_capacity(planned.len()),
            failures: Vec::new(),
        };

        for (backend, plan) in planned {
            match self.run_backend(backend, &plan, criteria, iterations).await {
                Ok(metric) => {
                    info!(
                        backend = %backend.name(),
                        avg_ms = metric.avg_time_ms(),
                        results = metric.result_count,
                        "Backend benchmark complete"
                    );
                    report.metrics.push(metric);
                }
                Err(SearchError::Cancelled) => {
                    info!(backend = %backend.name(), "Benchmark cancelled");
                    return Err(SearchError::Cancelled);
                }
                Err(error) if error.is_structural() => return Err(error),
                Err(error) => {
                    warn!(backend = %backend.name(), error = %error, "Backend dropped from benchmark");
                    report.failures.push(BackendFailure {
                        backend: backend.name().to_string(),
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn run_backend(
        &self,
        backend: &SearchBackend,
        plan: &QueryPlan,
        criteria: &SearchCriteria,
        iterations: usize,
    ) -> Result<BenchmarkMetrics, SearchError> {
        let name = backend.name();
        let query_type = QueryType::detect(criteria);
        let _timer = metrics::LatencyTimer::new(name, "benchmark");

        let mut session = match timeout(self.trial_timeout, self.prepare(backend)).await {
            Ok(session) => session?,
            Err(_) => {
                metrics::record_backend_error(name, "timeout");
                return Err(SearchError::BackendUnavailable {
                    backend: name.to_string(),
                    reason: format!("no session within {:?}", self.trial_timeout),
                });
            }
        };

        let mut samples = Vec::with_capacity(iterations);
        for iteration in 1..=iterations {
            let probe = MemoryProbe::start();
            let start = Instant::now();
            let hits = match timeout(self.trial_timeout, session.execute(plan)).await {
                Ok(result) => result?,
                Err(_) => {
                    metrics::record_backend_error(name, "timeout");
                    return Err(SearchError::Timeout {
                        backend: name.to_string(),
                        after: self.trial_timeout,
                    });
                }
            };
            let sample = IterationSample {
                elapsed: start.elapsed(),
                peak_memory_delta: probe.peak_delta(),
                result_count: hits.len(),
            };
            drop(hits);

            metrics::record_trial(name, query_type.as_str(), sample.elapsed, sample.result_count);
            metrics::record_trial_memory(name, sample.peak_memory_delta);
            debug!(
                backend = %name,
                iteration,
                elapsed_ms = sample.elapsed.as_secs_f64() * 1000.0,
                results = sample.result_count,
                "Trial complete"
            );
            samples.push(sample);

            self.checkpoint()?;
        }

        Ok(BenchmarkMetrics::from_samples(name, criteria, &samples))
    }

    /// Acquire a session and warm it up; bounded by the trial timeout.
    async fn prepare<'a>(&self, backend: &'a SearchBackend) -> Result<BackendSession<'a>, SearchError> {
        let mut session = backend.open_session().await?;
        if self.warmup {
            session.warmup().await?;
        }
        Ok(session)
    }

    fn checkpoint(&self) -> Result<(), SearchError> {
        match &self.cancel {
            Some(cancel) if *cancel.borrow() => Err(SearchError::Cancelled),
            _ => Ok(()),
        }
    }
}

fn check_iterations(iterations: usize) -> Result<(), SearchError> {
    if iterations == 0 {
        return Err(SearchError::invalid("iterations must be >= 1"));
    }
    Ok(())
}
