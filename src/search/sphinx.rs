// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sphinx dialect
//!
//! SphinxQL over real-time indexes. Each entity has its own index, so there
//! are no joins and unions are fanned out per index and merged client-side.
//!
//! # Query syntax
//!
//! ```text
//! laptop computer         → laptop | computer      (natural: any word)
//! +wireless +headphones   → wireless headphones    (required is implicit)
//! apple OR samsung        → apple | samsung
//! phone NOT case          → phone -case
//! "exact phrase"          → "exact phrase"         (passed through)
//! ```
//!
//! # Aggregations
//!
//! Category, brand and rating facets use a plain `GROUP BY` over the match
//! rather than a trailing `FACET` clause. `FACET` returns a second result set
//! per facet, which the MySQL protocol client reads as a separate query; one
//! grouped result set keeps the row shape identical to MariaDB's
//! (`group_key`, `count`, `avg_relevance`).

use chrono::{NaiveDate, NaiveTime};
use std::collections::BTreeSet;
use tracing::debug;

use super::query::{Entity, Page, QueryFragments, QueryKind, SqlParam, SqlQuery};
use super::{page_param, QueryDialect, PRICE_WEIGHTED_SORT};
use crate::capability::{Capability, CapabilityDescriptor};
use crate::criteria::{AggregateDimension, MatchMode, SearchCriteria};
use crate::error::SearchError;

/// Result window Sphinx keeps per query unless `max_matches` is raised.
pub const SPHINX_DEFAULT_MAX_MATCHES: u64 = 1000;

/// Product index attributes usable in `ORDER BY`.
const SORTABLE_ATTRIBUTES: [&str; 4] = ["id", "category", "brand", "created_at"];

const SECONDS_PER_DAY: i64 = 86_400;

/// Rewrite a query for SphinxQL extended syntax.
#[must_use]
pub fn convert_query(query: &str, mode: MatchMode) -> String {
    let has_operators = [" OR ", " AND ", " NOT "].iter().any(|op| query.contains(op));
    if mode == MatchMode::Boolean || has_operators {
        let rewritten = query
            .replace(" OR ", " | ")
            .replace(" AND ", " ")
            .replace(" NOT ", " -");
        return rewritten
            .split_whitespace()
            .map(|term| term.strip_prefix('+').unwrap_or(term))
            .filter(|term| !term.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
    }

    if !query.contains(['"', '+', '-', '|', '(', '*']) {
        let words: Vec<&str> = query.split_whitespace().collect();
        if words.len() > 1 {
            return words.join(" | ");
        }
    }
    query.to_string()
}

/// Sphinx/Manticore query builder.
#[derive(Debug, Clone)]
pub struct SphinxDialect {
    capabilities: CapabilityDescriptor,
}

impl SphinxDialect {
    pub fn new(capabilities: CapabilityDescriptor) -> Self {
        Self { capabilities }
    }

    fn unsupported(&self, capability: Capability) -> SearchError {
        SearchError::unsupported(self.capabilities.backend(), capability)
    }

    fn match_clause(criteria: &SearchCriteria) -> (&'static str, [SqlParam; 1]) {
        (
            "WHERE MATCH(?)",
            [SqlParam::Text(convert_query(criteria.query(), criteria.match_mode()))],
        )
    }

    fn columns(entity: Entity) -> &'static str {
        match entity {
            Entity::Product => "id, category, brand",
            Entity::Customer => "id",
            Entity::Review => "id, product_id, rating",
            Entity::Order => "id, order_number, status",
        }
    }

    /// `SELECT <columns>, WEIGHT() AS relevance FROM <index> WHERE MATCH(?) <filters>`
    fn ranked_source(&self, entity: Entity, criteria: &SearchCriteria) -> Result<QueryFragments, SearchError> {
        let (clause, param) = Self::match_clause(criteria);
        let mut fragments = QueryFragments::new();
        fragments.push(format!(
            "SELECT {}, WEIGHT() AS relevance FROM {}",
            Self::columns(entity),
            entity.table()
        ));
        fragments.push_with(clause, param);
        fragments.append(self.entity_filters(entity, criteria)?);
        Ok(fragments)
    }

    fn entity_filters(&self, entity: Entity, criteria: &SearchCriteria) -> Result<QueryFragments, SearchError> {
        let mut fragments = QueryFragments::new();
        match entity {
            Entity::Product => return self.product_filters(criteria),
            Entity::Customer => {}
            Entity::Review => {
                if let Some(min) = criteria.filter("min_rating").and_then(|v| v.as_f64()) {
                    fragments.push_with("AND rating >= ?", [SqlParam::Numeric(min)]);
                }
                if criteria.filter("verified_only").is_some_and(|v| v.is_truthy()) {
                    fragments.push_with("AND verified_purchase = ?", [SqlParam::Integer(1)]);
                }
            }
            Entity::Order => {
                if let Some(status) = criteria.filter("status") {
                    fragments.push_with("AND status = ?", [SqlParam::from(status)]);
                }
            }
        }
        Ok(fragments)
    }

    /// Only attributes present in the products index: category, brand and
    /// the `created_at` timestamp.
    fn product_filters(&self, criteria: &SearchCriteria) -> Result<QueryFragments, SearchError> {
        let mut fragments = QueryFragments::new();

        if let Some(category) = criteria.filter("category") {
            fragments.push_with("AND category = ?", [SqlParam::from(category)]);
        }
        if criteria.filter("min_price").is_some() || criteria.filter("max_price").is_some() {
            return Err(self.unsupported(Capability::PriceFiltering));
        }
        if criteria.filter("color").is_some() {
            return Err(self.unsupported(Capability::AttributeFiltering));
        }
        if let Some(brand) = criteria.filter("brand") {
            fragments.push_with("AND brand = ?", [SqlParam::from(brand)]);
        }
        if !criteria.json_filters().is_empty() {
            return Err(self.unsupported(Capability::JsonFiltering));
        }

        let dates = criteria.date_filters();
        if let Some(from) = dates.from {
            fragments.push_with("AND created_at >= ?", [SqlParam::Integer(day_start(from))]);
        }
        if let Some(to) = dates.to {
            fragments.push_with(
                "AND created_at <= ?",
                [SqlParam::Integer(day_start(to) + SECONDS_PER_DAY - 1)],
            );
        }

        if criteria.in_stock_only() {
            return Err(self.unsupported(Capability::StockFiltering));
        }
        Ok(fragments)
    }

    fn order_by(&self, criteria: &SearchCriteria) -> Result<String, SearchError> {
        let mut keys: Vec<String> = Vec::new();
        for (field, direction) in criteria.order_by() {
            let key = match field.as_str() {
                PRICE_WEIGHTED_SORT => {
                    debug!(
                        backend = %self.capabilities.backend(),
                        "price-weighted ranking unavailable, ordering by relevance"
                    );
                    "relevance DESC".to_string()
                }
                "relevance" => format!("relevance {}", direction.as_sql()),
                "price" => return Err(self.unsupported(Capability::PriceFiltering)),
                attr if SORTABLE_ATTRIBUTES.contains(&attr) => format!("{attr} {}", direction.as_sql()),
                other => {
                    return Err(SearchError::translation(format!(
                        "'{other}' is not a sortable attribute of the products index"
                    )))
                }
            };
            let column = key.split(' ').next().unwrap_or_default();
            if !keys.iter().any(|k| k.split(' ').next() == Some(column)) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            keys.push("relevance DESC".to_string());
        }
        if !keys.iter().any(|k| k.split(' ').next() == Some("id")) {
            keys.push("id ASC".to_string());
        }
        Ok(format!("ORDER BY {}", keys.join(", ")))
    }

    /// `LIMIT offset, limit` plus `OPTION max_matches` past the default window.
    fn paginate(fragments: &mut QueryFragments, criteria: &SearchCriteria) {
        fragments.push_with(
            "LIMIT ?, ?",
            [page_param(criteria.offset()), page_param(criteria.limit())],
        );
        let window = criteria.offset().saturating_add(criteria.limit());
        if window > SPHINX_DEFAULT_MAX_MATCHES {
            fragments.push(format!("OPTION max_matches={window}"));
        }
    }

    fn page(criteria: &SearchCriteria) -> Page {
        Page {
            offset: criteria.offset(),
            limit: criteria.limit(),
        }
    }
}

impl QueryDialect for SphinxDialect {
    fn capabilities(&self) -> &CapabilityDescriptor {
        &self.capabilities
    }

    fn relevance_query(&self, criteria: &SearchCriteria) -> Result<SqlQuery, SearchError> {
        let mut fragments = self.ranked_source(Entity::Product, criteria)?;
        fragments.push(self.order_by(criteria)?);
        Self::paginate(&mut fragments, criteria);
        Ok(fragments.finish(Entity::Product, QueryKind::Relevance, Self::page(criteria)))
    }

    fn entity_query(&self, entity: Entity, criteria: &SearchCriteria) -> Result<SqlQuery, SearchError> {
        let mut fragments = self.ranked_source(entity, criteria)?;
        fragments.push("ORDER BY relevance DESC, id ASC");
        Self::paginate(&mut fragments, criteria);
        Ok(fragments.finish(entity, QueryKind::Relevance, Self::page(criteria)))
    }

    fn aggregation_query(
        &self,
        dimension: AggregateDimension,
        criteria: &SearchCriteria,
    ) -> Result<SqlQuery, SearchError> {
        let (entity, attribute) = match dimension {
            AggregateDimension::Category => (Entity::Product, "category"),
            AggregateDimension::Brand => (Entity::Product, "brand"),
            AggregateDimension::Rating => (Entity::Review, "rating"),
            AggregateDimension::PriceRange => return Err(self.unsupported(Capability::PriceFiltering)),
        };
        let (clause, param) = Self::match_clause(criteria);

        let mut fragments = QueryFragments::new();
        fragments.push(format!(
            "SELECT {attribute} AS group_key, COUNT(*) AS count, AVG(WEIGHT()) AS avg_relevance FROM {}",
            entity.table()
        ));
        fragments.push_with(clause, param);
        fragments.append(self.entity_filters(entity, criteria)?);
        fragments.push(format!("GROUP BY {attribute} ORDER BY avg_relevance DESC, {attribute} ASC"));
        Self::paginate(&mut fragments, criteria);
        Ok(fragments.finish(entity, QueryKind::Aggregation(dimension), Self::page(criteria)))
    }

    fn join_query(&self, _tables: &BTreeSet<Entity>, _criteria: &SearchCriteria) -> Result<SqlQuery, SearchError> {
        Err(self.unsupported(Capability::MultiTableJoins))
    }

    fn union_query(&self, _sources: &BTreeSet<Entity>, _criteria: &SearchCriteria) -> Result<SqlQuery, SearchError> {
        Err(self.unsupported(Capability::NativeUnion))
    }
}

/// Unix timestamp of midnight UTC.
fn day_start(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}
