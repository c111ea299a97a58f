// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Named benchmark cases.
//!
//! A case holds unvalidated [`RawCriteria`] so that catalogs can come from
//! configuration files; validation happens when the sweep reaches the case.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::criteria::{FilterValue, RawCriteria, SearchCriteria};
use crate::error::SearchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseCategory {
    Basic,
    SearchModes,
    Filtering,
    Aggregations,
    MultiTable,
    Sorting,
    Pagination,
}

impl CaseCategory {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::SearchModes => "Search Modes",
            Self::Filtering => "Filtering",
            Self::Aggregations => "Aggregations",
            Self::MultiTable => "Multi-Table",
            Self::Sorting => "Sorting",
            Self::Pagination => "Pagination",
        }
    }

    /// Guess a category from a case name; first matching keyword wins.
    #[must_use]
    pub fn for_case_name(name: &str) -> Self {
        let has = |needle: &str| name.contains(needle);
        if has("boolean") || has("phrase") || has("wildcard") || has("expansion") {
            Self::SearchModes
        } else if has("filter") || has("with_") {
            Self::Filtering
        } else if has("aggregate") {
            Self::Aggregations
        } else if has("join") || has("union") {
            Self::MultiTable
        } else if has("sort") {
            Self::Sorting
        } else if has("pagination") {
            Self::Pagination
        } else {
            Self::Basic
        }
    }
}

impl fmt::Display for CaseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogCase {
    pub name: String,
    /// Derived from the name when absent.
    #[serde(default)]
    pub category: Option<CaseCategory>,
    pub criteria: RawCriteria,
}

impl CatalogCase {
    pub fn new(name: impl Into<String>, criteria: RawCriteria) -> Self {
        Self {
            name: name.into(),
            category: None,
            criteria,
        }
    }

    #[must_use]
    pub fn category(&self) -> CaseCategory {
        self.category.unwrap_or_else(|| CaseCategory::for_case_name(&self.name))
    }

    /// Case-insensitive substring match on the category label.
    #[must_use]
    pub fn matches_filter(&self, filter: &str) -> bool {
        self.category()
            .label()
            .to_lowercase()
            .contains(&filter.trim().to_lowercase())
    }

    pub fn criteria(&self) -> Result<SearchCriteria, SearchError> {
        SearchCriteria::try_from(self.criteria.clone())
    }
}

fn text(query: &str, mode: &str) -> RawCriteria {
    RawCriteria {
        query: query.to_string(),
        match_mode: Some(mode.to_string()),
        ..Default::default()
    }
}

fn natural(query: &str) -> RawCriteria {
    text(query, "NATURAL")
}

fn filtered(query: &str, filters: &[(&str, FilterValue)]) -> RawCriteria {
    RawCriteria {
        filters: Some(
            filters
                .iter()
                .map(|(key, value)| ((*key).to_string(), value.clone()))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..natural(query)
    }
}

fn aggregated(query: &str, dimension: &str) -> RawCriteria {
    RawCriteria {
        aggregate_by: Some(dimension.to_string()),
        ..natural(query)
    }
}

fn tables(query: &str, names: &[&str], union: bool) -> RawCriteria {
    RawCriteria {
        join_tables: Some(names.iter().map(|n| (*n).to_string()).collect()),
        use_union: union,
        ..natural(query)
    }
}

fn sorted(query: &str, field: &str, direction: &str) -> RawCriteria {
    RawCriteria {
        order_by: Some(vec![(field.to_string(), direction.to_string())]),
        ..natural(query)
    }
}

/// The canonical sweep: basic text, search modes, filtering, aggregations,
/// multi-table, sorting, pagination and edge cases.
#[must_use]
pub fn default_catalog() -> Vec<CatalogCase> {
    vec![
        CatalogCase::new("simple", natural("laptop computer")),
        CatalogCase::new("complex", natural("wireless bluetooth headphones premium quality")),
        CatalogCase::new("partial", natural("elect")),
        CatalogCase::new("boolean_required", text("+wireless +headphones", "BOOLEAN")),
        CatalogCase::new("boolean_exclude", text("phone -samsung", "BOOLEAN")),
        CatalogCase::new("boolean_complex", text("(wireless OR bluetooth) +headphones", "BOOLEAN")),
        CatalogCase::new("phrase_match", text("\"gaming laptop\"", "BOOLEAN")),
        CatalogCase::new("wildcard", text("electron*", "BOOLEAN")),
        CatalogCase::new("query_expansion", text("laptop", "QUERY_EXPANSION")),
        CatalogCase::new("with_category", filtered("laptop", &[("category", "Electronics".into())])),
        CatalogCase::new(
            "with_price_range",
            filtered("phone", &[("min_price", 100.into()), ("max_price", 500.into())]),
        ),
        CatalogCase::new("with_json_filter", filtered("laptop", &[("color", "black".into())])),
        CatalogCase::new("aggregate_category", aggregated("wireless", "category")),
        CatalogCase::new("aggregate_brand", aggregated("phone", "brand")),
        CatalogCase::new("aggregate_price_range", aggregated("electronics", "price_range")),
        CatalogCase::new("join_customers", tables("laptop", &["customers", "orders"], false)),
        CatalogCase::new("union_search", tables("john", &["products", "customers"], true)),
        CatalogCase::new("sort_price_asc", sorted("laptop", "price", "ASC")),
        CatalogCase::new("sort_price_desc", sorted("phone", "price", "DESC")),
        CatalogCase::new(
            "deep_pagination",
            RawCriteria {
                offset: Some(1000),
                limit: Some(20),
                ..natural("product")
            },
        ),
        CatalogCase::new("single_char", natural("a")),
        CatalogCase::new("common_words", natural("the best product")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{AggregateDimension, MatchMode};

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 22);
        for case in &catalog {
            let criteria = case.criteria().unwrap_or_else(|e| panic!("{}: {e}", case.name));
            assert!(!criteria.query().is_empty());
        }
    }

    #[test]
    fn test_categories_from_names() {
        let category = |name: &str| CaseCategory::for_case_name(name);
        assert_eq!(category("simple"), CaseCategory::Basic);
        assert_eq!(category("boolean_complex"), CaseCategory::SearchModes);
        assert_eq!(category("query_expansion"), CaseCategory::SearchModes);
        assert_eq!(category("with_json_filter"), CaseCategory::Filtering);
        assert_eq!(category("aggregate_brand"), CaseCategory::Aggregations);
        assert_eq!(category("union_search"), CaseCategory::MultiTable);
        assert_eq!(category("sort_price_asc"), CaseCategory::Sorting);
        assert_eq!(category("deep_pagination"), CaseCategory::Pagination);
        assert_eq!(category("common_words"), CaseCategory::Basic);
    }

    #[test]
    fn test_category_filter_matches_label() {
        let catalog = default_catalog();
        let multi: Vec<&str> = catalog
            .iter()
            .filter(|c| c.matches_filter("multi"))
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(multi, vec!["join_customers", "union_search"]);
        assert_eq!(catalog.iter().filter(|c| c.matches_filter("Search Modes")).count(), 6);
    }

    #[test]
    fn test_explicit_category_overrides_name() {
        let mut case = CatalogCase::new("simple", natural("x"));
        case.category = Some(CaseCategory::Sorting);
        assert_eq!(case.category(), CaseCategory::Sorting);
    }

    #[test]
    fn test_case_criteria_fields() {
        let catalog = default_catalog();
        let find = |name: &str| catalog.iter().find(|c| c.name == name).unwrap().criteria().unwrap();

        assert_eq!(find("wildcard").match_mode(), MatchMode::Boolean);
        assert_eq!(find("aggregate_price_range").aggregate_by(), Some(AggregateDimension::PriceRange));
        assert!(find("union_search").use_union());
        let deep = find("deep_pagination");
        assert_eq!((deep.offset(), deep.limit()), (1000, 20));
    }
}
