// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search criteria - the single backend-agnostic request contract.
//!
//! Every presentation layer (CLI, HTTP) fills in a [`SearchCriteria`] before
//! invoking the core. Criteria are validated once, at construction, and are
//! immutable afterwards.
//!
//! # Example
//!
//! ```rust
//! use fulltext_bench::criteria::{SearchCriteria, MatchMode, AggregateDimension};
//!
//! // Plain natural-language search
//! let criteria = SearchCriteria::builder("laptop computer").limit(100).build().unwrap();
//! assert_eq!(criteria.match_mode(), MatchMode::Natural);
//!
//! // Boolean search with filters and a facet
//! let criteria = SearchCriteria::builder("+wireless +headphones")
//!     .match_mode(MatchMode::Boolean)
//!     .filter("category", "Electronics")
//!     .filter("max_price", 500)
//!     .aggregate_by(AggregateDimension::Brand)
//!     .build()
//!     .unwrap();
//! assert!(criteria.has_filters());
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::SearchError;

/// Default page size when the caller does not give one.
pub const DEFAULT_LIMIT: u64 = 100;

/// Filter keys understood by at least one entry point.
///
/// `min_rating` and `verified_only` target reviews, `status` targets orders;
/// product searches ignore them.
pub const KNOWN_FILTERS: &[&str] = &[
    "category",
    "brand",
    "min_price",
    "max_price",
    "color",
    "min_rating",
    "verified_only",
    "status",
];

/// How the raw query text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchMode {
    #[default]
    Natural,
    Boolean,
    QueryExpansion,
}

impl MatchMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Natural => "NATURAL",
            Self::Boolean => "BOOLEAN",
            Self::QueryExpansion => "QUERY_EXPANSION",
        }
    }
}

impl FromStr for MatchMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NATURAL" => Ok(Self::Natural),
            "BOOLEAN" => Ok(Self::Boolean),
            "QUERY_EXPANSION" => Ok(Self::QueryExpansion),
            other => Err(SearchError::invalid(format!("unknown match mode '{other}'"))),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grouping dimension for aggregation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateDimension {
    Category,
    Brand,
    PriceRange,
    Rating,
}

impl AggregateDimension {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Brand => "brand",
            Self::PriceRange => "price_range",
            Self::Rating => "rating",
        }
    }
}

impl FromStr for AggregateDimension {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" => Ok(Self::Category),
            "brand" => Ok(Self::Brand),
            "price_range" => Ok(Self::PriceRange),
            "rating" => Ok(Self::Rating),
            other => Err(SearchError::invalid(format!("unknown aggregation dimension '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(SearchError::invalid(format!("unknown sort direction '{other}'"))),
        }
    }
}

/// Scalar filter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FilterValue {
    /// Numeric view; numeric-looking text counts.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    /// Truthiness, matching how query-string flags are usually written.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Inclusive creation-date bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// Immutable, validated search request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchCriteria {
    query: String,
    filters: BTreeMap<String, FilterValue>,
    limit: u64,
    offset: u64,
    order_by: Vec<(String, SortDirection)>,
    match_mode: MatchMode,
    aggregate_by: Option<AggregateDimension>,
    join_tables: BTreeSet<String>,
    use_union: bool,
    json_filters: BTreeMap<String, serde_json::Value>,
    date_filters: DateRange,
    in_stock_only: bool,
}

impl SearchCriteria {
    /// Start building criteria for the given raw query text.
    pub fn builder(query: impl Into<String>) -> SearchCriteriaBuilder {
        SearchCriteriaBuilder::new(query)
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn filters(&self) -> &BTreeMap<String, FilterValue> {
        &self.filters
    }

    #[must_use]
    pub fn filter(&self, key: &str) -> Option<&FilterValue> {
        self.filters.get(key)
    }

    #[must_use]
    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Sort keys in priority order.
    #[must_use]
    pub fn order_by(&self) -> &[(String, SortDirection)] {
        &self.order_by
    }

    #[must_use]
    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    #[must_use]
    pub fn aggregate_by(&self) -> Option<AggregateDimension> {
        self.aggregate_by
    }

    #[must_use]
    pub fn join_tables(&self) -> &BTreeSet<String> {
        &self.join_tables
    }

    #[must_use]
    pub fn use_union(&self) -> bool {
        self.use_union
    }

    #[must_use]
    pub fn json_filters(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.json_filters
    }

    #[must_use]
    pub fn date_filters(&self) -> &DateRange {
        &self.date_filters
    }

    #[must_use]
    pub fn in_stock_only(&self) -> bool {
        self.in_stock_only
    }

    /// Same request with a different page window.
    #[must_use]
    pub fn with_page(&self, limit: u64, offset: u64) -> Self {
        Self {
            limit,
            offset,
            ..self.clone()
        }
    }

    /// Reopen as a builder, for derived requests.
    #[must_use]
    pub fn to_builder(&self) -> SearchCriteriaBuilder {
        SearchCriteriaBuilder {
            criteria: self.clone(),
            errors: Vec::new(),
        }
    }
}

/// Builder collecting criteria fields; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct SearchCriteriaBuilder {
    criteria: SearchCriteria,
    errors: Vec<String>,
}

impl SearchCriteriaBuilder {
    fn new(query: impl Into<String>) -> Self {
        Self {
            criteria: SearchCriteria {
                query: query.into(),
                filters: BTreeMap::new(),
                limit: DEFAULT_LIMIT,
                offset: 0,
                order_by: Vec::new(),
                match_mode: MatchMode::default(),
                aggregate_by: None,
                join_tables: BTreeSet::new(),
                use_union: false,
                json_filters: BTreeMap::new(),
                date_filters: DateRange::default(),
                in_stock_only: false,
            },
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.criteria.filters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.criteria.limit = limit;
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.criteria.offset = offset;
        self
    }

    /// Append a sort key; earlier keys take priority.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        let field = field.into();
        if self.criteria.order_by.iter().any(|(f, _)| *f == field) {
            self.errors.push(format!("duplicate sort key '{field}'"));
        } else {
            self.criteria.order_by.push((field, direction));
        }
        self
    }

    #[must_use]
    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.criteria.match_mode = mode;
        self
    }

    #[must_use]
    pub fn aggregate_by(mut self, dimension: AggregateDimension) -> Self {
        self.criteria.aggregate_by = Some(dimension);
        self
    }

    /// Name an auxiliary entity to join (or, with [`union`](Self::union), to merge).
    #[must_use]
    pub fn join(mut self, table: impl Into<String>) -> Self {
        self.criteria
            .join_tables
            .insert(table.into().trim().to_ascii_lowercase());
        self
    }

    /// Merge the given tables as independent sources.
    #[must_use]
    pub fn union<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for table in tables {
            self = self.join(table);
        }
        self.criteria.use_union = true;
        self
    }

    #[must_use]
    pub fn use_union(mut self, use_union: bool) -> Self {
        self.criteria.use_union = use_union;
        self
    }

    /// Nested-document filter, e.g. `tags` or `specs.weight`.
    #[must_use]
    pub fn json_filter(mut self, path: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.criteria.json_filters.insert(path.into(), value.into());
        self
    }

    #[must_use]
    pub fn date_from(mut self, from: NaiveDate) -> Self {
        self.criteria.date_filters.from = Some(from);
        self
    }

    #[must_use]
    pub fn date_to(mut self, to: NaiveDate) -> Self {
        self.criteria.date_filters.to = Some(to);
        self
    }

    #[must_use]
    pub fn in_stock_only(mut self, in_stock_only: bool) -> Self {
        self.criteria.in_stock_only = in_stock_only;
        self
    }

    /// Validate and freeze the criteria.
    pub fn build(self) -> Result<SearchCriteria, SearchError> {
        if let Some(first) = self.errors.into_iter().next() {
            return Err(SearchError::invalid(first));
        }
        let criteria = self.criteria;

        for key in criteria.filters.keys() {
            if !KNOWN_FILTERS.contains(&key.as_str()) {
                return Err(SearchError::invalid(format!("unknown filter '{key}'")));
            }
        }
        for key in ["min_price", "max_price", "min_rating"] {
            if let Some(value) = criteria.filters.get(key) {
                if value.as_f64().is_none() {
                    return Err(SearchError::invalid(format!("filter '{key}' must be numeric, got '{value}'")));
                }
            }
        }
        if let (Some(min), Some(max)) = (
            criteria.filters.get("min_price").and_then(FilterValue::as_f64),
            criteria.filters.get("max_price").and_then(FilterValue::as_f64),
        ) {
            if min > max {
                return Err(SearchError::invalid(format!("min_price {min} exceeds max_price {max}")));
            }
        }

        for (field, _) in &criteria.order_by {
            if !is_identifier(field) {
                return Err(SearchError::invalid(format!("sort key '{field}' is not a column name")));
            }
        }
        for table in &criteria.join_tables {
            if table.is_empty() {
                return Err(SearchError::invalid("empty table name"));
            }
        }
        for path in criteria.json_filters.keys() {
            if path.is_empty() || !path.split('.').all(is_identifier) {
                return Err(SearchError::invalid(format!("json path '{path}' is not a dotted identifier path")));
            }
        }
        if let (Some(from), Some(to)) = (criteria.date_filters.from, criteria.date_filters.to) {
            if from > to {
                return Err(SearchError::invalid(format!("date range starts ({from}) after it ends ({to})")));
            }
        }

        Ok(criteria)
    }
}

/// Unvalidated criteria as presentation layers receive them.
///
/// Signed integers and string tokens so that malformed input (negative
/// limits, unknown modes) is rejected here instead of at the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCriteria {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: Option<BTreeMap<String, FilterValue>>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    /// `[["price", "ASC"], ...]`, priority order.
    #[serde(default)]
    pub order_by: Option<Vec<(String, String)>>,
    #[serde(default)]
    pub match_mode: Option<String>,
    #[serde(default)]
    pub aggregate_by: Option<String>,
    #[serde(default)]
    pub join_tables: Option<Vec<String>>,
    #[serde(default)]
    pub use_union: bool,
    #[serde(default)]
    pub json_filters: Option<BTreeMap<String, serde_json::Value>>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub in_stock_only: bool,
}

impl TryFrom<RawCriteria> for SearchCriteria {
    type Error = SearchError;

    fn try_from(raw: RawCriteria) -> Result<Self, Self::Error> {
        let mut builder = SearchCriteria::builder(raw.query)
            .limit(non_negative("limit", raw.limit.unwrap_or(DEFAULT_LIMIT as i64))?)
            .offset(non_negative("offset", raw.offset.unwrap_or(0))?)
            .use_union(raw.use_union)
            .in_stock_only(raw.in_stock_only);

        if let Some(mode) = raw.match_mode {
            builder = builder.match_mode(mode.parse()?);
        }
        if let Some(dimension) = raw.aggregate_by {
            builder = builder.aggregate_by(dimension.parse()?);
        }
        for (key, value) in raw.filters.unwrap_or_default() {
            builder = builder.filter(key, value);
        }
        for (field, direction) in raw.order_by.unwrap_or_default() {
            builder = builder.order_by(field, direction.parse()?);
        }
        for table in raw.join_tables.unwrap_or_default() {
            builder = builder.join(table);
        }
        for (path, value) in raw.json_filters.unwrap_or_default() {
            builder = builder.json_filter(path, value);
        }
        if let Some(from) = raw.date_from {
            builder = builder.date_from(parse_date("date_from", &from)?);
        }
        if let Some(to) = raw.date_to {
            builder = builder.date_to(parse_date("date_to", &to)?);
        }

        builder.build()
    }
}

fn non_negative(name: &str, value: i64) -> Result<u64, SearchError> {
    u64::try_from(value).map_err(|_| SearchError::invalid(format!("{name} must be >= 0, got {value}")))
}

fn parse_date(name: &str, value: &str) -> Result<NaiveDate, SearchError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| SearchError::invalid(format!("{name} '{value}' is not YYYY-MM-DD: {e}")))
}

/// `[A-Za-z_][A-Za-z0-9_]*` - safe to splice into native query text.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
