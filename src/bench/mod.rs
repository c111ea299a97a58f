// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Benchmarking and comparison.
//!
//! [`BenchmarkRunner`] times trials against registered backends and
//! [`compare_results`] turns the per-backend metrics into baseline-relative
//! rows. Neither prints anything; presentation is the caller's job.

mod alloc;
pub mod catalog;
mod compare;
mod runner;

pub use alloc::{current_bytes, is_tracking, MemoryProbe, TrackingAllocator};
pub use catalog::{default_catalog, CaseCategory, CatalogCase};
pub use compare::{compare_results, winner, ComparisonRow, Scoreboard, Standing};
pub use runner::{
    BackendFailure, BenchmarkMetrics, BenchmarkReport, BenchmarkRunner, CaseReport, CatalogReport, QueryType,
};
