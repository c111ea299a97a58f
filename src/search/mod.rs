// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query Translation
//!
//! Turns one [`SearchCriteria`] into the native query dialect of a backend.
//!
//! # Architecture
//!
//! ```text
//! SearchCriteria
//!     ↓  CapabilityDescriptor::check (plain data, no I/O)
//! Translator ─┬─→ MariaDbDialect → MATCH ... AGAINST, JOIN, UNION ALL
//!             └─→ SphinxDialect  → SphinxQL MATCH(), GROUP BY, fan-out union
//!     ↓
//! QueryPlan (Single | Fanout | Empty)
//! ```
//!
//! # Routing
//!
//! First match wins:
//!
//! ```text
//! aggregate_by set                → aggregation
//! use_union + join_tables         → union (native, or fan-out + client merge)
//! join_tables                     → multi-table join
//! otherwise                       → single-source relevance query
//! ```
//!
//! # Example
//!
//! ```rust
//! use fulltext_bench::criteria::SearchCriteria;
//! use fulltext_bench::search::{QueryPlan, Translator};
//!
//! let criteria = SearchCriteria::builder("laptop").limit(20).build().unwrap();
//! let plan = Translator::mariadb().translate(&criteria).unwrap();
//! let QueryPlan::Single(query) = plan else { unreachable!() };
//! assert!(query.text.ends_with("LIMIT ? OFFSET ?"));
//! ```

mod mariadb;
pub mod merge;
mod query;
mod sphinx;

pub use mariadb::MariaDbDialect;
pub use merge::merge_ranked;
pub use query::{Entity, Page, QueryFragments, QueryKind, SqlParam, SqlQuery};
pub use sphinx::{convert_query, SphinxDialect, SPHINX_DEFAULT_MAX_MATCHES};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::capability::{Capability, CapabilityDescriptor};
use crate::criteria::{AggregateDimension, MatchMode, SearchCriteria};
use crate::error::SearchError;

/// Sort key that blends relevance with cheapness.
pub const PRICE_WEIGHTED_SORT: &str = "relevance_price_weighted";

/// Price buckets for `price_range` aggregation: label and exclusive upper bound.
pub const PRICE_BUCKETS: [(&str, Option<u32>); 4] = [
    ("0-100", Some(100)),
    ("100-500", Some(500)),
    ("500-1000", Some(1000)),
    ("1000+", None),
];

/// Bucket label for a price.
#[must_use]
pub fn price_bucket(price: f64) -> &'static str {
    PRICE_BUCKETS
        .iter()
        .find(|(_, upper)| upper.map_or(true, |u| price < f64::from(u)))
        .map_or("1000+", |(label, _)| label)
}

/// `relevance * weight + (ceiling - price)` ranking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceWeighting {
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_ceiling")]
    pub ceiling: f64,
}

fn default_weight() -> f64 {
    10.0
}

fn default_ceiling() -> f64 {
    1000.0
}

impl Default for PriceWeighting {
    fn default() -> Self {
        Self {
            weight: default_weight(),
            ceiling: default_ceiling(),
        }
    }
}

/// Which native dialect a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[serde(alias = "mysql")]
    Mariadb,
    #[serde(alias = "manticore")]
    Sphinx,
}

/// Translated, ready-to-execute work for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// One native query; the backend's order and window are final.
    Single(SqlQuery),
    /// Independent per-source queries, each fetching `offset + limit` rows,
    /// merged client-side by relevance and then windowed by `page`.
    Fanout { parts: Vec<SqlQuery>, page: Page },
    /// Nothing to run (union with no sources).
    Empty,
}

impl QueryPlan {
    /// Every native query in execution order.
    pub fn queries(&self) -> impl Iterator<Item = &SqlQuery> {
        let slice: &[SqlQuery] = match self {
            Self::Single(query) => std::slice::from_ref(query),
            Self::Fanout { parts, .. } => parts,
            Self::Empty => &[],
        };
        slice.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Per-dialect query construction. Routing and capability checks live in
/// [`Translator`]; a dialect only builds text.
pub trait QueryDialect: Send + Sync {
    fn capabilities(&self) -> &CapabilityDescriptor;

    /// Products, honoring filters and custom sort keys.
    fn relevance_query(&self, criteria: &SearchCriteria) -> Result<SqlQuery, SearchError>;

    /// One entity ranked by relevance, with that entity's own filters.
    fn entity_query(&self, entity: Entity, criteria: &SearchCriteria) -> Result<SqlQuery, SearchError>;

    fn aggregation_query(
        &self,
        dimension: AggregateDimension,
        criteria: &SearchCriteria,
    ) -> Result<SqlQuery, SearchError>;

    fn join_query(&self, tables: &BTreeSet<Entity>, criteria: &SearchCriteria) -> Result<SqlQuery, SearchError>;

    /// Single-statement union; only called when `native_union` is supported.
    fn union_query(&self, sources: &BTreeSet<Entity>, criteria: &SearchCriteria) -> Result<SqlQuery, SearchError>;
}

/// Closed set of translators, one per backend kind.
#[derive(Debug, Clone)]
pub enum Translator {
    MariaDb(MariaDbDialect),
    Sphinx(SphinxDialect),
}

impl Translator {
    #[must_use]
    pub fn mariadb() -> Self {
        Self::MariaDb(MariaDbDialect::new(CapabilityDescriptor::mariadb()))
    }

    #[must_use]
    pub fn sphinx() -> Self {
        Self::Sphinx(SphinxDialect::new(CapabilityDescriptor::sphinx()))
    }

    /// Translator for `kind` whose descriptor reports `name` as the backend.
    #[must_use]
    pub fn for_kind(kind: BackendKind, name: &str) -> Self {
        match kind {
            BackendKind::Mariadb => Self::MariaDb(MariaDbDialect::new(CapabilityDescriptor::mariadb().renamed(name))),
            BackendKind::Sphinx => Self::Sphinx(SphinxDialect::new(CapabilityDescriptor::sphinx().renamed(name))),
        }
    }

    /// Override price-weighted ranking parameters. No effect on dialects
    /// without `price_weighted_ranking`.
    #[must_use]
    pub fn with_price_weighting(self, weighting: PriceWeighting) -> Self {
        match self {
            Self::MariaDb(dialect) => Self::MariaDb(dialect.with_price_weighting(weighting)),
            other => other,
        }
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::MariaDb(_) => BackendKind::Mariadb,
            Self::Sphinx(_) => BackendKind::Sphinx,
        }
    }

    fn dialect(&self) -> &dyn QueryDialect {
        match self {
            Self::MariaDb(dialect) => dialect,
            Self::Sphinx(dialect) => dialect,
        }
    }

    #[must_use]
    pub fn capabilities(&self) -> &CapabilityDescriptor {
        self.dialect().capabilities()
    }

    /// Route and translate. Capability checks run before any text is built.
    pub fn translate(&self, criteria: &SearchCriteria) -> Result<QueryPlan, SearchError> {
        self.capabilities().check(criteria)?;

        if let Some(dimension) = criteria.aggregate_by() {
            return self.dialect().aggregation_query(dimension, criteria).map(QueryPlan::Single);
        }
        if !criteria.join_tables().is_empty() {
            let tables = resolve_tables(criteria.join_tables())?;
            if criteria.use_union() {
                return self.union_plan(&tables, criteria);
            }
            return self.dialect().join_query(&tables, criteria).map(QueryPlan::Single);
        }
        self.dialect().relevance_query(criteria).map(QueryPlan::Single)
    }

    /// Facet counts; dimension defaults to `category`.
    pub fn aggregation(&self, criteria: &SearchCriteria) -> Result<QueryPlan, SearchError> {
        let dimension = criteria.aggregate_by().unwrap_or(AggregateDimension::Category);
        let caps = self.capabilities();
        caps.require(Capability::Aggregations)?;
        caps.require(Capability::for_dimension(dimension))?;
        caps.check_filters(criteria)?;
        self.dialect().aggregation_query(dimension, criteria).map(QueryPlan::Single)
    }

    /// Products correlated with related entities; defaults to customers + orders.
    pub fn join(&self, criteria: &SearchCriteria) -> Result<QueryPlan, SearchError> {
        let caps = self.capabilities();
        caps.require(Capability::MultiTableJoins)?;
        caps.check_filters(criteria)?;

        let tables = if criteria.join_tables().is_empty() {
            BTreeSet::from([Entity::Customer, Entity::Order])
        } else {
            resolve_tables(criteria.join_tables())?
        };
        self.dialect().join_query(&tables, criteria).map(QueryPlan::Single)
    }

    /// Cross-entity union over `join_tables`; no sources yields an empty plan.
    pub fn union(&self, criteria: &SearchCriteria) -> Result<QueryPlan, SearchError> {
        let caps = self.capabilities();
        caps.require(Capability::UnionSearch)?;
        caps.check_filters(criteria)?;

        let sources = resolve_tables(criteria.join_tables())?;
        self.union_plan(&sources, criteria)
    }

    /// Search a single entity ranked by relevance.
    pub fn entity(&self, entity: Entity, criteria: &SearchCriteria) -> Result<QueryPlan, SearchError> {
        self.require_match_mode(criteria.match_mode())?;
        self.require_entity(entity)?;
        self.dialect().entity_query(entity, criteria).map(QueryPlan::Single)
    }

    fn union_plan(&self, sources: &BTreeSet<Entity>, criteria: &SearchCriteria) -> Result<QueryPlan, SearchError> {
        if sources.is_empty() {
            return Ok(QueryPlan::Empty);
        }
        for entity in sources {
            self.require_entity(*entity)?;
        }

        if self.capabilities().supports(Capability::NativeUnion) {
            return self.dialect().union_query(sources, criteria).map(QueryPlan::Single);
        }

        let window = criteria.offset().saturating_add(criteria.limit());
        let per_source = criteria.with_page(window, 0);
        let parts = sources
            .iter()
            .map(|entity| self.dialect().entity_query(*entity, &per_source))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QueryPlan::Fanout {
            parts,
            page: Page {
                offset: criteria.offset(),
                limit: criteria.limit(),
            },
        })
    }

    fn require_match_mode(&self, mode: MatchMode) -> Result<(), SearchError> {
        match mode {
            MatchMode::Boolean => self.capabilities().require(Capability::BooleanModeSearch),
            _ => self.capabilities().require(Capability::NaturalLanguageSearch),
        }
    }

    fn require_entity(&self, entity: Entity) -> Result<(), SearchError> {
        match entity {
            Entity::Product => Ok(()),
            Entity::Customer => self.capabilities().require(Capability::CustomerSearch),
            Entity::Review => self.capabilities().require(Capability::ReviewSearch),
            Entity::Order => self.capabilities().require(Capability::OrderSearch),
        }
    }
}

/// Table names to entities in canonical source order.
fn resolve_tables<'a, I>(names: I) -> Result<BTreeSet<Entity>, SearchError>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = HashSet::new();
    let mut tables = BTreeSet::new();
    for name in names {
        if seen.insert(name.as_str()) {
            tables.insert(Entity::from_table_name(name)?);
        }
    }
    Ok(tables)
}

/// Bind value for a page bound.
pub(crate) fn page_param(value: u64) -> SqlParam {
    SqlParam::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(query: &str) -> crate::criteria::SearchCriteriaBuilder {
        SearchCriteria::builder(query)
    }

    #[test]
    fn test_price_buckets() {
        assert_eq!(price_bucket(0.0), "0-100");
        assert_eq!(price_bucket(99.99), "0-100");
        assert_eq!(price_bucket(100.0), "100-500");
        assert_eq!(price_bucket(999.0), "500-1000");
        assert_eq!(price_bucket(1000.0), "1000+");
        assert_eq!(price_bucket(25_000.0), "1000+");
    }

    #[test]
    fn test_routing_aggregation_wins_over_union() {
        let c = criteria("phone")
            .aggregate_by(AggregateDimension::Brand)
            .union(["products", "customers"])
            .build()
            .unwrap();
        let QueryPlan::Single(query) = Translator::mariadb().translate(&c).unwrap() else {
            panic!("expected single query");
        };
        assert_eq!(query.kind, QueryKind::Aggregation(AggregateDimension::Brand));
    }

    #[test]
    fn test_routing_join_vs_union() {
        let join = criteria("john").join("customers").build().unwrap();
        let plan = Translator::mariadb().translate(&join).unwrap();
        assert!(matches!(plan, QueryPlan::Single(ref q) if q.kind == QueryKind::Join));

        let union = criteria("john").union(["products", "customers"]).build().unwrap();
        let plan = Translator::mariadb().translate(&union).unwrap();
        assert!(matches!(plan, QueryPlan::Single(ref q) if q.kind == QueryKind::Union));
    }

    #[test]
    fn test_sphinx_union_is_fanout() {
        let c = criteria("john")
            .union(["customers", "products"])
            .limit(10)
            .offset(5)
            .build()
            .unwrap();
        let QueryPlan::Fanout { parts, page } = Translator::sphinx().translate(&c).unwrap() else {
            panic!("expected fan-out");
        };
        assert_eq!(page, Page { offset: 5, limit: 10 });
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].entity, Entity::Product);
        assert_eq!(parts[1].entity, Entity::Customer);
        for part in &parts {
            assert_eq!(part.page, Page { offset: 0, limit: 15 });
        }
    }

    #[test]
    fn test_unknown_table_is_translation_error() {
        let c = criteria("x").join("invoices").build().unwrap();
        let err = Translator::mariadb().translate(&c).unwrap_err();
        assert!(matches!(err, SearchError::Translation(_)));
    }

    #[test]
    fn test_join_on_sphinx_is_unsupported() {
        let c = criteria("x").build().unwrap();
        let err = Translator::sphinx().join(&c).unwrap_err();
        assert_eq!(err, SearchError::unsupported("Sphinx", Capability::MultiTableJoins));
    }

    #[test]
    fn test_empty_union_plan() {
        let c = criteria("x").build().unwrap();
        let plan = Translator::mariadb().union(&c).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.queries().count(), 0);
    }

    #[test]
    fn test_aggregation_defaults_to_category() {
        let c = criteria("x").build().unwrap();
        let plan = Translator::sphinx().aggregation(&c).unwrap();
        let query = plan.queries().next().unwrap();
        assert!(query.text.contains("GROUP BY category"));
    }

    #[test]
    fn test_for_kind_renames_descriptor() {
        let translator = Translator::for_kind(BackendKind::Sphinx, "Manticore");
        assert_eq!(translator.capabilities().backend(), "Manticore");
        assert_eq!(translator.kind(), BackendKind::Sphinx);
    }

    #[test]
    fn test_backend_kind_aliases() {
        let kind: BackendKind = serde_json::from_str("\"manticore\"").unwrap();
        assert_eq!(kind, BackendKind::Sphinx);
    }
}
