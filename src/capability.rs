// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Capability descriptors.
//!
//! Each backend declares, as plain data, which query features it supports.
//! Translators consult the descriptor before building any query text, so an
//! unsupported request fails with [`SearchError::CapabilityUnsupported`]
//! without touching the network.
//!
//! ```text
//! capability               MariaDB  Sphinx
//! multi_table_joins           ✓        ✗
//! native_union                ✓        ✗   (union simulated by client-side merge)
//! json_filtering              ✓        ✗
//! proximity_search            ✗        ✓
//! price_filtering             ✓        ✗   (price is not an index attribute)
//! price_weighted_ranking      ✓        ✗   (degrades to relevance order)
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::criteria::{AggregateDimension, MatchMode, SearchCriteria};
use crate::error::SearchError;

/// A named query feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    NaturalLanguageSearch,
    BooleanModeSearch,
    QueryExpansion,
    PhraseMatching,
    WildcardSearch,
    ProximitySearch,
    MultiTableJoins,
    UnionSearch,
    NativeUnion,
    JsonFiltering,
    JsonVirtualColumns,
    Aggregations,
    FacetedSearch,
    CustomerSearch,
    OrderSearch,
    ReviewSearch,
    DateFiltering,
    PriceFiltering,
    StockFiltering,
    CategoryFiltering,
    BrandFiltering,
    AttributeFiltering,
    CustomSorting,
    RelevanceWeighting,
    PriceWeightedRanking,
    DeepPagination,
}

impl Capability {
    pub const ALL: [Capability; 26] = [
        Self::NaturalLanguageSearch,
        Self::BooleanModeSearch,
        Self::QueryExpansion,
        Self::PhraseMatching,
        Self::WildcardSearch,
        Self::ProximitySearch,
        Self::MultiTableJoins,
        Self::UnionSearch,
        Self::NativeUnion,
        Self::JsonFiltering,
        Self::JsonVirtualColumns,
        Self::Aggregations,
        Self::FacetedSearch,
        Self::CustomerSearch,
        Self::OrderSearch,
        Self::ReviewSearch,
        Self::DateFiltering,
        Self::PriceFiltering,
        Self::StockFiltering,
        Self::CategoryFiltering,
        Self::BrandFiltering,
        Self::AttributeFiltering,
        Self::CustomSorting,
        Self::RelevanceWeighting,
        Self::PriceWeightedRanking,
        Self::DeepPagination,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NaturalLanguageSearch => "natural_language_search",
            Self::BooleanModeSearch => "boolean_mode_search",
            Self::QueryExpansion => "query_expansion",
            Self::PhraseMatching => "phrase_matching",
            Self::WildcardSearch => "wildcard_search",
            Self::ProximitySearch => "proximity_search",
            Self::MultiTableJoins => "multi_table_joins",
            Self::UnionSearch => "union_search",
            Self::NativeUnion => "native_union",
            Self::JsonFiltering => "json_filtering",
            Self::JsonVirtualColumns => "json_virtual_columns",
            Self::Aggregations => "aggregations",
            Self::FacetedSearch => "faceted_search",
            Self::CustomerSearch => "customer_search",
            Self::OrderSearch => "order_search",
            Self::ReviewSearch => "review_search",
            Self::DateFiltering => "date_filtering",
            Self::PriceFiltering => "price_filtering",
            Self::StockFiltering => "stock_filtering",
            Self::CategoryFiltering => "category_filtering",
            Self::BrandFiltering => "brand_filtering",
            Self::AttributeFiltering => "attribute_filtering",
            Self::CustomSorting => "custom_sorting",
            Self::RelevanceWeighting => "relevance_weighting",
            Self::PriceWeightedRanking => "price_weighted_ranking",
            Self::DeepPagination => "deep_pagination",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Capability a grouping dimension depends on.
    #[must_use]
    pub fn for_dimension(dimension: AggregateDimension) -> Self {
        match dimension {
            AggregateDimension::Category => Self::CategoryFiltering,
            AggregateDimension::Brand => Self::BrandFiltering,
            AggregateDimension::PriceRange => Self::PriceFiltering,
            AggregateDimension::Rating => Self::ReviewSearch,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static feature table for one backend. Read-only after registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityDescriptor {
    backend: String,
    flags: BTreeMap<Capability, bool>,
    boolean_operators: Vec<&'static str>,
}

impl CapabilityDescriptor {
    /// Descriptor with every capability off.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            flags: Capability::ALL.into_iter().map(|c| (c, false)).collect(),
            boolean_operators: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, capability: Capability, supported: bool) -> Self {
        self.flags.insert(capability, supported);
        self
    }

    /// Same table under another backend name.
    #[must_use]
    pub fn renamed(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    #[must_use]
    pub fn with_operators(mut self, operators: &[&'static str]) -> Self {
        self.boolean_operators = operators.to_vec();
        self
    }

    /// MariaDB `MATCH ... AGAINST` over InnoDB full-text indexes.
    #[must_use]
    pub fn mariadb() -> Self {
        let unsupported = [Capability::ProximitySearch];
        Capability::ALL
            .into_iter()
            .fold(Self::new("MariaDB"), |d, c| d.with(c, !unsupported.contains(&c)))
            .with_operators(&["+", "-", ">", "<", "(", ")", "~", "*", "\"", "AND", "OR", "NOT"])
    }

    /// Sphinx/Manticore real-time indexes queried over SphinxQL.
    #[must_use]
    pub fn sphinx() -> Self {
        let unsupported = [
            Capability::MultiTableJoins,
            Capability::NativeUnion,
            Capability::JsonFiltering,
            Capability::JsonVirtualColumns,
            Capability::PriceFiltering,
            Capability::StockFiltering,
            Capability::AttributeFiltering,
            Capability::PriceWeightedRanking,
        ];
        Capability::ALL
            .into_iter()
            .fold(Self::new("Sphinx"), |d, c| d.with(c, !unsupported.contains(&c)))
            .with_operators(&["AND", "OR", "NOT", "|", "!", "\"", "(", ")"])
    }

    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.flags.get(&capability).copied().unwrap_or(false)
    }

    /// Fail loudly when the capability is missing.
    pub fn require(&self, capability: Capability) -> Result<(), SearchError> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(SearchError::unsupported(&self.backend, capability))
        }
    }

    /// Full `name → supported` table, in stable order.
    #[must_use]
    pub fn as_map(&self) -> BTreeMap<&'static str, bool> {
        self.flags.iter().map(|(c, s)| (c.name(), *s)).collect()
    }

    #[must_use]
    pub fn boolean_operators(&self) -> &[&'static str] {
        &self.boolean_operators
    }

    /// Check every feature the criteria asks for, in routing order.
    ///
    /// Route-independent: a filter the backend cannot apply is an error even
    /// when the chosen route would not have used it.
    pub fn check(&self, criteria: &SearchCriteria) -> Result<(), SearchError> {
        if let Some(dimension) = criteria.aggregate_by() {
            self.require(Capability::Aggregations)?;
            self.require(Capability::for_dimension(dimension))?;
        } else if !criteria.join_tables().is_empty() {
            if criteria.use_union() {
                self.require(Capability::UnionSearch)?;
                for table in criteria.join_tables() {
                    match table.as_str() {
                        "customers" => self.require(Capability::CustomerSearch)?,
                        "reviews" => self.require(Capability::ReviewSearch)?,
                        "orders" => self.require(Capability::OrderSearch)?,
                        _ => {}
                    }
                }
            } else {
                self.require(Capability::MultiTableJoins)?;
            }
        }

        self.check_filters(criteria)
    }

    /// Match mode, filters and sort keys; shared by every entry point.
    pub fn check_filters(&self, criteria: &SearchCriteria) -> Result<(), SearchError> {
        match criteria.match_mode() {
            MatchMode::Boolean => self.require(Capability::BooleanModeSearch)?,
            _ => self.require(Capability::NaturalLanguageSearch)?,
        }

        if criteria.filter("category").is_some() {
            self.require(Capability::CategoryFiltering)?;
        }
        if criteria.filter("min_price").is_some() || criteria.filter("max_price").is_some() {
            self.require(Capability::PriceFiltering)?;
        }
        if criteria.filter("color").is_some() {
            self.require(Capability::AttributeFiltering)?;
        }
        if criteria.filter("brand").is_some() {
            self.require(Capability::BrandFiltering)?;
        }
        if !criteria.json_filters().is_empty() {
            self.require(Capability::JsonFiltering)?;
        }
        if !criteria.date_filters().is_empty() {
            self.require(Capability::DateFiltering)?;
        }
        if criteria.in_stock_only() {
            self.require(Capability::StockFiltering)?;
        }
        if !criteria.order_by().is_empty() {
            self.require(Capability::CustomSorting)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::SearchCriteria;

    #[test]
    fn test_feature_asymmetry() {
        let mariadb = CapabilityDescriptor::mariadb();
        let sphinx = CapabilityDescriptor::sphinx();

        assert!(mariadb.supports(Capability::MultiTableJoins));
        assert!(!sphinx.supports(Capability::MultiTableJoins));
        assert!(mariadb.supports(Capability::JsonFiltering));
        assert!(!sphinx.supports(Capability::JsonFiltering));
        assert!(!mariadb.supports(Capability::ProximitySearch));
        assert!(sphinx.supports(Capability::ProximitySearch));
        assert!(sphinx.supports(Capability::UnionSearch));
        assert!(!sphinx.supports(Capability::NativeUnion));
    }

    #[test]
    fn test_names_round_trip() {
        for capability in Capability::ALL {
            assert_eq!(Capability::from_name(capability.name()), Some(capability));
        }
        assert_eq!(Capability::from_name("teleportation"), None);
    }

    #[test]
    fn test_as_map_is_complete() {
        let map = CapabilityDescriptor::sphinx().as_map();
        assert_eq!(map.len(), Capability::ALL.len());
        assert_eq!(map["json_filtering"], false);
        assert_eq!(map["faceted_search"], true);
    }

    #[test]
    fn test_check_json_filter_on_sphinx() {
        let criteria = SearchCriteria::builder("laptop")
            .json_filter("tags", "premium")
            .build()
            .unwrap();
        let err = CapabilityDescriptor::sphinx().check(&criteria).unwrap_err();
        assert_eq!(err, SearchError::unsupported("Sphinx", Capability::JsonFiltering));
        assert!(CapabilityDescriptor::mariadb().check(&criteria).is_ok());
    }

    #[test]
    fn test_check_join_on_sphinx() {
        let criteria = SearchCriteria::builder("laptop")
            .join("customers")
            .join("orders")
            .build()
            .unwrap();
        let err = CapabilityDescriptor::sphinx().check(&criteria).unwrap_err();
        assert_eq!(err, SearchError::unsupported("Sphinx", Capability::MultiTableJoins));
    }

    #[test]
    fn test_check_union_allowed_on_sphinx() {
        let criteria = SearchCriteria::builder("john")
            .union(["products", "customers"])
            .build()
            .unwrap();
        assert!(CapabilityDescriptor::sphinx().check(&criteria).is_ok());
    }

    #[test]
    fn test_check_price_range_aggregation_on_sphinx() {
        let criteria = SearchCriteria::builder("electronics")
            .aggregate_by(AggregateDimension::PriceRange)
            .build()
            .unwrap();
        let err = CapabilityDescriptor::sphinx().check(&criteria).unwrap_err();
        assert_eq!(err, SearchError::unsupported("Sphinx", Capability::PriceFiltering));
    }

    #[test]
    fn test_empty_descriptor_rejects_everything() {
        let criteria = SearchCriteria::builder("x").build().unwrap();
        let err = CapabilityDescriptor::new("Null").check(&criteria).unwrap_err();
        assert_eq!(err, SearchError::unsupported("Null", Capability::NaturalLanguageSearch));
    }
}
