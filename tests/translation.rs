// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Property-based tests for query translation.
//!
//! Random criteria must always translate to the same text and parameters,
//! every placeholder must have a parameter, and pagination windows must be
//! bounded and disjoint.
//!
//! Run with: `cargo test --test translation`

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use fulltext_bench::backend::InMemoryConnector;
use fulltext_bench::criteria::{AggregateDimension, SortDirection};
use fulltext_bench::search::Entity;
use fulltext_bench::{
    Capability, HitRecord, MatchMode, QueryPlan, SearchBackend, SearchCriteria, SearchError, Translator,
};

// =============================================================================
// Strategies
// =============================================================================

fn query_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}( (AND|OR) [a-z]{1,8}| [a-z]{1,8}){0,3}"
}

fn match_mode_strategy() -> impl Strategy<Value = MatchMode> {
    prop_oneof![
        Just(MatchMode::Natural),
        Just(MatchMode::Boolean),
        Just(MatchMode::QueryExpansion),
    ]
}

/// Criteria every backend can express.
fn portable_criteria() -> impl Strategy<Value = SearchCriteria> {
    (
        query_strategy(),
        match_mode_strategy(),
        prop::option::of("[A-Z][a-z]{2,10}"),
        prop::option::of("[A-Z][a-z]{2,10}"),
        0u64..200,
        0u64..5000,
        any::<bool>(),
    )
        .prop_map(|(query, mode, category, brand, limit, offset, newest_first)| {
            let mut builder = SearchCriteria::builder(query).match_mode(mode).limit(limit).offset(offset);
            if let Some(category) = category {
                builder = builder.filter("category", category);
            }
            if let Some(brand) = brand {
                builder = builder.filter("brand", brand);
            }
            if newest_first {
                builder = builder.order_by("created_at", SortDirection::Desc);
            }
            builder.build().expect("generated criteria are valid")
        })
}

/// Criteria using MariaDB-only features as well.
fn mariadb_criteria() -> impl Strategy<Value = SearchCriteria> {
    (
        portable_criteria(),
        prop::option::of((0u32..500, 500u32..5000)),
        prop::option::of("[a-z]{3,8}"),
        prop::option::of(prop_oneof![
            Just(AggregateDimension::Category),
            Just(AggregateDimension::Brand),
            Just(AggregateDimension::PriceRange),
            Just(AggregateDimension::Rating),
        ]),
        any::<bool>(),
    )
        .prop_map(|(base, price, tag, aggregate, in_stock)| {
            let mut builder = base.to_builder().in_stock_only(in_stock);
            if let Some((min, max)) = price {
                builder = builder.filter("min_price", f64::from(min)).filter("max_price", f64::from(max));
            }
            if let Some(tag) = tag {
                builder = builder.json_filter("tags", tag);
            }
            if let Some(dimension) = aggregate {
                builder = builder.aggregate_by(dimension);
            }
            builder.build().expect("generated criteria are valid")
        })
}

fn assert_well_formed(plan: &QueryPlan) {
    for query in plan.queries() {
        assert_eq!(
            query.placeholder_count(),
            query.params.len(),
            "placeholders and params disagree in {}",
            query.text
        );
        assert!(!query.inline().contains('?'), "unbound placeholder in {}", query.inline());
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn mariadb_translation_is_deterministic(criteria in mariadb_criteria()) {
        let translator = Translator::mariadb();
        let first = translator.translate(&criteria).unwrap();
        let second = translator.translate(&criteria.clone()).unwrap();
        prop_assert_eq!(&first, &second);
        assert_well_formed(&first);
    }

    #[test]
    fn sphinx_translation_is_deterministic(criteria in portable_criteria()) {
        let translator = Translator::sphinx();
        let first = translator.translate(&criteria).unwrap();
        let second = translator.translate(&criteria).unwrap();
        prop_assert_eq!(&first, &second);
        assert_well_formed(&first);
    }

    #[test]
    fn json_filters_never_translate_on_sphinx(criteria in portable_criteria(), tag in "[a-z]{3,8}") {
        let criteria = criteria.to_builder().json_filter("tags", tag).build().unwrap();
        let err = Translator::sphinx().translate(&criteria).unwrap_err();
        prop_assert_eq!(err, SearchError::CapabilityUnsupported {
            backend: "Sphinx".into(),
            capability: Capability::JsonFiltering,
        });
    }

    #[test]
    fn pagination_is_bounded_and_disjoint(limit in 1u64..40, fixture_size in 0usize..120, tie_width in 1usize..6) {
        // Runs of `tie_width` rows share a relevance score
        let fixtures: Vec<HitRecord> = (0..fixture_size)
            .map(|i| HitRecord::new(format!("p{i:03}"), ((fixture_size - i) / tie_width) as f64))
            .collect();
        let connector = InMemoryConnector::new().with_hits(Entity::Product, fixtures);
        let backend = SearchBackend::mariadb(Arc::new(connector));

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let (first, second, both) = runtime.block_on(async {
            let page = |offset, limit| SearchCriteria::builder("laptop").limit(limit).offset(offset).build().unwrap();
            let first = backend.search(&page(0, limit)).await.unwrap();
            let second = backend.search(&page(limit, limit)).await.unwrap();
            let both = backend.search(&page(0, limit * 2)).await.unwrap();
            (first, second, both)
        });

        prop_assert!(first.len() as u64 <= limit);
        prop_assert!(second.len() as u64 <= limit);
        let seen: HashSet<&str> = first.iter().map(|h| h.id.as_str()).collect();
        prop_assert!(second.iter().all(|h| !seen.contains(h.id.as_str())));

        let paged: Vec<&str> = first.iter().chain(&second).map(|h| h.id.as_str()).collect();
        let whole: Vec<&str> = both.iter().map(|h| h.id.as_str()).collect();
        prop_assert_eq!(paged, whole);
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn price_range_aggregation_has_four_buckets() {
    let criteria = SearchCriteria::builder("electronics")
        .aggregate_by(AggregateDimension::PriceRange)
        .build()
        .unwrap();
    let plan = Translator::mariadb().translate(&criteria).unwrap();
    let QueryPlan::Single(query) = plan else {
        panic!("aggregation is a single query");
    };

    for bucket in ["'0-100'", "'100-500'", "'500-1000'", "'1000+'"] {
        assert!(query.text.contains(bucket), "missing bucket {bucket} in {}", query.text);
    }
    assert!(query.text.contains("HAVING count > 0"));
    assert!(query.text.contains("ORDER BY avg_relevance DESC, group_key ASC"));
}

#[test]
fn price_range_aggregation_unsupported_on_sphinx() {
    let criteria = SearchCriteria::builder("electronics")
        .aggregate_by(AggregateDimension::PriceRange)
        .build()
        .unwrap();
    let err = Translator::sphinx().translate(&criteria).unwrap_err();
    assert!(matches!(err, SearchError::CapabilityUnsupported { .. }));
}

#[test]
fn union_paginates_combined_set() {
    let criteria = SearchCriteria::builder("john")
        .union(["products", "customers"])
        .limit(20)
        .offset(40)
        .build()
        .unwrap();

    let QueryPlan::Single(native) = Translator::mariadb().translate(&criteria).unwrap() else {
        panic!("MariaDB has native UNION");
    };
    assert_eq!(native.text.matches("UNION ALL").count(), 1);
    assert!(native.inline().ends_with("LIMIT 20 OFFSET 40"));

    let QueryPlan::Fanout { parts, page } = Translator::sphinx().translate(&criteria).unwrap() else {
        panic!("Sphinx fans out");
    };
    assert_eq!(parts.len(), 2);
    assert_eq!((page.offset, page.limit), (40, 20));
    for part in &parts {
        assert_eq!((part.page.offset, part.page.limit), (0, 60));
    }
}

#[test]
fn unknown_join_table_is_a_translation_error() {
    let criteria = SearchCriteria::builder("laptop").join("warehouses").build().unwrap();
    let err = Translator::mariadb().translate(&criteria).unwrap_err();
    assert!(matches!(err, SearchError::Translation(_)));
    assert!(err.is_structural());
}
