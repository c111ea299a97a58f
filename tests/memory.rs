// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-trial memory deltas with the tracking allocator installed.
//!
//! Kept in its own test binary with a single test: the allocator counters
//! are process-wide and concurrent tests would disturb each other's peaks.

use std::sync::Arc;

use fulltext_bench::bench::{is_tracking, TrackingAllocator};
use fulltext_bench::search::Entity;
use fulltext_bench::{compare_results, BenchmarkRunner, HitRecord, InMemoryConnector, SearchBackend, SearchCriteria};

#[global_allocator]
static ALLOC: TrackingAllocator = TrackingAllocator;

fn connector(n: usize) -> InMemoryConnector {
    let hits = (0..n)
        .map(|i| HitRecord::new(format!("p{i}"), 1.0).with_field("description", "x".repeat(256)))
        .collect();
    InMemoryConnector::new().with_hits(Entity::Product, hits)
}

#[tokio::test(flavor = "current_thread")]
async fn test_memory_delta_tracks_result_size() {
    let small = connector(10);
    let large = connector(1000);
    let runner = BenchmarkRunner::new(vec![
        Arc::new(SearchBackend::mariadb(Arc::new(small))),
        Arc::new(SearchBackend::sphinx(Arc::new(large))),
    ]);
    let criteria = SearchCriteria::builder("laptop").limit(1000).build().unwrap();

    let report = runner.run_benchmark(&criteria, 3).await.unwrap();

    assert!(is_tracking());
    let (small, large) = (&report.metrics[0], &report.metrics[1]);
    assert_eq!(small.result_count, 10);
    assert_eq!(large.result_count, 1000);
    assert!(small.avg_memory > 0.0);
    assert!(large.avg_memory > small.avg_memory);

    let rows = compare_results(&report.metrics);
    assert_eq!(rows[0].memory_ratio, 1.0);
    assert!(rows[1].memory_ratio > 1.0);
    assert!(rows[1].memory_usage_mb > 0.0);
}
