// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! MariaDB dialect
//!
//! Builds `MATCH ... AGAINST` queries over InnoDB full-text indexes.
//!
//! # SQL Generated
//!
//! ```sql
//! SELECT p.id, ..., MATCH(p.name, ...) AGAINST (? IN BOOLEAN MODE) AS relevance
//! FROM products p
//! WHERE MATCH(p.name, ...) AGAINST (? IN BOOLEAN MODE)
//!   AND p.category = ?                                   -- attribute filter
//!   AND JSON_CONTAINS(p.tags, ?)                          -- tag membership
//!   AND JSON_UNQUOTE(JSON_EXTRACT(p.specifications, '$.color')) = ?
//!   AND JSON_EXTRACT(p.specifications, '$.weight') < ?    -- "<2" comparison
//! ORDER BY relevance DESC, p.id ASC                     -- id breaks score ties
//! LIMIT ? OFFSET ?
//! ```

use serde_json::Value;
use std::collections::BTreeSet;

use super::query::{Entity, Page, QueryFragments, QueryKind, SqlParam, SqlQuery};
use super::{page_param, PriceWeighting, QueryDialect, PRICE_BUCKETS, PRICE_WEIGHTED_SORT};
use crate::capability::{Capability, CapabilityDescriptor};
use crate::criteria::{AggregateDimension, MatchMode, SearchCriteria};
use crate::error::SearchError;

const PRODUCT_MATCH: &str = "MATCH(p.name, p.description, p.long_description, p.category, p.brand)";
const CUSTOMER_MATCH: &str = "MATCH(c.first_name, c.last_name, c.email, c.address, c.notes)";
const REVIEW_MATCH: &str = "MATCH(pr.title, pr.review_text)";
const ORDER_MATCH: &str = "MATCH(o.notes, o.shipping_address, o.billing_address)";
/// Order notes only; the join path has no index over the address columns.
const ORDER_NOTES_MATCH: &str = "MATCH(o.notes)";

/// MariaDB/MySQL query builder.
#[derive(Debug, Clone)]
pub struct MariaDbDialect {
    capabilities: CapabilityDescriptor,
    price_weighting: PriceWeighting,
}

impl MariaDbDialect {
    pub fn new(capabilities: CapabilityDescriptor) -> Self {
        Self {
            capabilities,
            price_weighting: PriceWeighting::default(),
        }
    }

    #[must_use]
    pub fn with_price_weighting(mut self, weighting: PriceWeighting) -> Self {
        self.price_weighting = weighting;
        self
    }

    /// `AGAINST` modifier; query expansion falls back to natural language
    /// when the descriptor disables it.
    fn mode(&self, mode: MatchMode) -> &'static str {
        match mode {
            MatchMode::Boolean => "IN BOOLEAN MODE",
            MatchMode::QueryExpansion if self.capabilities.supports(Capability::QueryExpansion) => {
                "WITH QUERY EXPANSION"
            }
            _ => "IN NATURAL LANGUAGE MODE",
        }
    }

    /// `MATCH(...) AGAINST (? mode)` bound to the raw query.
    fn against(&self, match_expr: &str, criteria: &SearchCriteria) -> (String, [SqlParam; 1]) {
        (
            format!("{match_expr} AGAINST (? {})", self.mode(criteria.match_mode())),
            [SqlParam::Text(criteria.query().to_string())],
        )
    }

    fn shape(entity: Entity) -> (&'static str, &'static str) {
        match entity {
            Entity::Product => ("products p", PRODUCT_MATCH),
            Entity::Customer => ("customers c", CUSTOMER_MATCH),
            Entity::Review => ("product_reviews pr", REVIEW_MATCH),
            Entity::Order => ("orders o", ORDER_MATCH),
        }
    }

    fn id_column(entity: Entity) -> &'static str {
        match entity {
            Entity::Product => "p.id",
            Entity::Customer => "c.id",
            Entity::Review => "pr.id",
            Entity::Order => "o.id",
        }
    }

    // DECIMAL, TINYINT and DATETIME are cast to types the `Any` driver decodes.
    fn columns(entity: Entity) -> &'static str {
        match entity {
            Entity::Product => "p.id, p.name, p.description, p.category, p.brand, CAST(p.price AS DOUBLE) AS price",
            Entity::Customer => "c.id, c.first_name, c.last_name, c.email, c.city, c.country",
            Entity::Review => "pr.id, pr.product_id, pr.title, pr.review_text, CAST(pr.rating AS SIGNED) AS rating, \
                 CAST(pr.verified_purchase AS SIGNED) AS verified_purchase",
            Entity::Order => "o.id, o.order_number, o.status, CAST(o.total_amount AS DOUBLE) AS total_amount, \
                 DATE_FORMAT(o.created_at, '%Y-%m-%d %H:%i:%s') AS created_at",
        }
    }

    /// Shared `title`/`description` projection for union branches.
    fn union_columns(entity: Entity) -> &'static str {
        match entity {
            Entity::Product => "p.id, p.name AS title, p.description",
            Entity::Customer => "c.id, CONCAT(c.first_name, ' ', c.last_name) AS title, c.email AS description",
            Entity::Review => "pr.id, pr.title, pr.review_text AS description",
            Entity::Order => "o.id, o.order_number AS title, o.notes AS description",
        }
    }

    /// `SELECT <columns>, MATCH AS relevance FROM t WHERE MATCH <filters>`
    fn ranked_source(
        &self,
        entity: Entity,
        columns: &str,
        criteria: &SearchCriteria,
    ) -> Result<QueryFragments, SearchError> {
        let (table, match_expr) = Self::shape(entity);
        let (against, param) = self.against(match_expr, criteria);

        let mut fragments = QueryFragments::new();
        fragments.push_with(format!("SELECT {columns}, {against} AS relevance"), param.clone());
        fragments.push(format!("FROM {table}"));
        fragments.push_with(format!("WHERE {against}"), param);
        fragments.append(self.entity_filters(entity, criteria)?);
        Ok(fragments)
    }

    fn entity_filters(&self, entity: Entity, criteria: &SearchCriteria) -> Result<QueryFragments, SearchError> {
        match entity {
            Entity::Product => self.product_filters(criteria),
            Entity::Customer => Ok(QueryFragments::new()),
            Entity::Review => {
                let mut fragments = QueryFragments::new();
                if let Some(min) = criteria.filter("min_rating").and_then(|v| v.as_f64()) {
                    fragments.push_with("AND pr.rating >= ?", [SqlParam::Numeric(min)]);
                }
                if criteria.filter("verified_only").is_some_and(|v| v.is_truthy()) {
                    fragments.push_with("AND pr.verified_purchase = ?", [SqlParam::Boolean(true)]);
                }
                Ok(fragments)
            }
            Entity::Order => {
                let mut fragments = QueryFragments::new();
                if let Some(status) = criteria.filter("status") {
                    fragments.push_with("AND o.status = ?", [SqlParam::from(status)]);
                }
                Ok(fragments)
            }
        }
    }

    /// Product filters in fixed order: category, price bounds, color, brand,
    /// JSON paths, creation date, stock.
    fn product_filters(&self, criteria: &SearchCriteria) -> Result<QueryFragments, SearchError> {
        let mut fragments = QueryFragments::new();

        if let Some(category) = criteria.filter("category") {
            fragments.push_with("AND p.category = ?", [SqlParam::from(category)]);
        }
        if let Some(min) = criteria.filter("min_price").and_then(|v| v.as_f64()) {
            fragments.push_with("AND p.price >= ?", [SqlParam::Numeric(min)]);
        }
        if let Some(max) = criteria.filter("max_price").and_then(|v| v.as_f64()) {
            fragments.push_with("AND p.price <= ?", [SqlParam::Numeric(max)]);
        }
        if let Some(color) = criteria.filter("color") {
            fragments.push_with("AND p.attr_color = ?", [SqlParam::from(color)]);
        }
        if let Some(brand) = criteria.filter("brand") {
            fragments.push_with("AND p.brand = ?", [SqlParam::from(brand)]);
        }

        for (path, value) in criteria.json_filters() {
            let (clause, params) = json_filter(path, value)?;
            fragments.push_with(clause, params);
        }

        let dates = criteria.date_filters();
        if let Some(from) = dates.from {
            fragments.push_with(
                "AND p.created_at >= ?",
                [SqlParam::Text(format!("{} 00:00:00", from.format("%Y-%m-%d")))],
            );
        }
        if let Some(to) = dates.to {
            fragments.push_with(
                "AND p.created_at <= ?",
                [SqlParam::Text(format!("{} 23:59:59", to.format("%Y-%m-%d")))],
            );
        }

        if criteria.in_stock_only() {
            fragments.push("AND p.stock_quantity > 0");
        }
        Ok(fragments)
    }

    /// Requested sort keys, then `p.id` so tied rows page deterministically.
    fn order_by(&self, criteria: &SearchCriteria) -> QueryFragments {
        let mut fragments = QueryFragments::new();
        if criteria.order_by().is_empty() {
            fragments.push("relevance DESC");
        }

        for (field, direction) in criteria.order_by() {
            let dir = direction.as_sql();
            match field.as_str() {
                PRICE_WEIGHTED_SORT => {
                    let (against, param) = self.against(PRODUCT_MATCH, criteria);
                    let PriceWeighting { weight, ceiling } = self.price_weighting;
                    fragments.push_with(format!("({against} * {weight} + ({ceiling} - p.price)) {dir}"), param);
                }
                "relevance" => {
                    fragments.push(format!("relevance {dir}"));
                }
                column => {
                    fragments.push(format!("p.{column} {dir}"));
                }
            }
        }
        fragments.push("p.id ASC");
        fragments.joined(", ")
    }

    fn paginate(fragments: &mut QueryFragments, criteria: &SearchCriteria) {
        fragments.push_with(
            "LIMIT ? OFFSET ?",
            [page_param(criteria.limit()), page_param(criteria.offset())],
        );
    }

    fn page(criteria: &SearchCriteria) -> Page {
        Page {
            offset: criteria.offset(),
            limit: criteria.limit(),
        }
    }
}

impl QueryDialect for MariaDbDialect {
    fn capabilities(&self) -> &CapabilityDescriptor {
        &self.capabilities
    }

    fn relevance_query(&self, criteria: &SearchCriteria) -> Result<SqlQuery, SearchError> {
        let mut fragments = self.ranked_source(Entity::Product, Self::columns(Entity::Product), criteria)?;
        fragments.push("ORDER BY");
        fragments.append(self.order_by(criteria));
        Self::paginate(&mut fragments, criteria);
        Ok(fragments.finish(Entity::Product, QueryKind::Relevance, Self::page(criteria)))
    }

    fn entity_query(&self, entity: Entity, criteria: &SearchCriteria) -> Result<SqlQuery, SearchError> {
        let mut fragments = self.ranked_source(entity, Self::columns(entity), criteria)?;
        fragments.push(format!("ORDER BY relevance DESC, {} ASC", Self::id_column(entity)));
        Self::paginate(&mut fragments, criteria);
        Ok(fragments.finish(entity, QueryKind::Relevance, Self::page(criteria)))
    }

    fn aggregation_query(
        &self,
        dimension: AggregateDimension,
        criteria: &SearchCriteria,
    ) -> Result<SqlQuery, SearchError> {
        let (entity, key, extra) = match dimension {
            AggregateDimension::Category => (Entity::Product, "p.category".to_string(), ", CAST(AVG(p.price) AS DOUBLE) AS avg_price"),
            AggregateDimension::Brand => (Entity::Product, "p.brand".to_string(), ", CAST(AVG(p.price) AS DOUBLE) AS avg_price"),
            AggregateDimension::PriceRange => (Entity::Product, price_case(), ""),
            AggregateDimension::Rating => (Entity::Review, "CAST(pr.rating AS SIGNED)".to_string(), ""),
        };
        let (table, match_expr) = Self::shape(entity);
        let (against, param) = self.against(match_expr, criteria);

        let mut fragments = QueryFragments::new();
        fragments.push_with(
            format!("SELECT {key} AS group_key, COUNT(*) AS count, AVG({against}) AS avg_relevance{extra}"),
            param.clone(),
        );
        fragments.push(format!("FROM {table}"));
        fragments.push_with(format!("WHERE {against}"), param);
        fragments.append(self.entity_filters(entity, criteria)?);
        fragments.push("GROUP BY group_key HAVING count > 0 ORDER BY avg_relevance DESC, group_key ASC");
        Self::paginate(&mut fragments, criteria);
        Ok(fragments.finish(entity, QueryKind::Aggregation(dimension), Self::page(criteria)))
    }

    fn join_query(&self, tables: &BTreeSet<Entity>, criteria: &SearchCriteria) -> Result<SqlQuery, SearchError> {
        let mut select = QueryFragments::new();
        let mut where_any = QueryFragments::new();
        let mut joins = vec!["INNER JOIN order_items oi ON oi.product_id = p.id"];
        let mut relevance = Vec::new();
        select.push("p.id, p.name, p.description");

        let wants_orders = tables.contains(&Entity::Order);
        let wants_customers = tables.contains(&Entity::Customer);
        if wants_orders || wants_customers {
            joins.push("INNER JOIN orders o ON o.id = oi.order_id");
        }
        if wants_orders {
            let (against, param) = self.against(ORDER_NOTES_MATCH, criteria);
            select.push("o.order_number");
            select.push_with(format!("{against} AS o_relevance"), param.clone());
            where_any.push_with(against, param);
            relevance.push("o_relevance");
        }
        if wants_customers {
            let (against, param) = self.against(CUSTOMER_MATCH, criteria);
            joins.push("INNER JOIN customers c ON c.id = o.customer_id");
            select.push("c.first_name, c.last_name");
            select.push_with(format!("{against} AS c_relevance"), param.clone());
            where_any.push_with(against, param);
            relevance.push("c_relevance");
        }
        if tables.contains(&Entity::Review) {
            let (against, param) = self.against(REVIEW_MATCH, criteria);
            joins.push("LEFT JOIN product_reviews pr ON pr.product_id = p.id");
            select.push("CAST(pr.rating AS SIGNED) AS rating");
            select.push_with(format!("COALESCE({against}, 0) AS r_relevance"), param.clone());
            where_any.push_with(against, param);
            relevance.push("r_relevance");
        }
        let (against, param) = self.against(PRODUCT_MATCH, criteria);
        select.push_with(format!("{against} AS p_relevance"), param.clone());
        where_any.push_with(against, param);
        relevance.push("p_relevance");

        let mut fragments = QueryFragments::new();
        fragments.push("SELECT");
        fragments.append(select.joined(", "));
        fragments.push(format!("FROM products p {}", joins.join(" ")));
        fragments.push("WHERE");
        fragments.append(where_any.joined(" OR ").enclosed());
        fragments.append(self.product_filters(criteria)?);
        // A product repeats once per matching order or review row
        let mut tie_breakers = vec!["p.id ASC"];
        if wants_orders || wants_customers {
            tie_breakers.push("o.id ASC");
        }
        if tables.contains(&Entity::Review) {
            tie_breakers.push("pr.id ASC");
        }
        fragments.push(format!("ORDER BY ({}) DESC, {}", relevance.join(" + "), tie_breakers.join(", ")));
        Self::paginate(&mut fragments, criteria);
        Ok(fragments.finish(Entity::Product, QueryKind::Join, Self::page(criteria)))
    }

    fn union_query(&self, sources: &BTreeSet<Entity>, criteria: &SearchCriteria) -> Result<SqlQuery, SearchError> {
        let mut branches = QueryFragments::new();
        for entity in sources {
            let columns = format!("'{}' AS source_type, {}", entity.source_type(), Self::union_columns(*entity));
            branches.append(self.ranked_source(*entity, &columns, criteria)?.enclosed());
        }
        if branches.is_empty() {
            return Err(SearchError::translation("union without sources"));
        }

        let mut fragments = branches.joined(" UNION ALL ");
        fragments.push("ORDER BY relevance DESC, source_type ASC, id ASC");
        Self::paginate(&mut fragments, criteria);
        let primary = sources.iter().next().copied().unwrap_or(Entity::Product);
        Ok(fragments.finish(primary, QueryKind::Union, Self::page(criteria)))
    }
}

/// `CASE WHEN p.price < 100 THEN '0-100' ... ELSE '1000+' END`
fn price_case() -> String {
    let mut case = String::from("CASE");
    for (label, upper) in PRICE_BUCKETS {
        match upper {
            Some(bound) => case.push_str(&format!(" WHEN p.price < {bound} THEN '{label}'")),
            None => case.push_str(&format!(" ELSE '{label}'")),
        }
    }
    case.push_str(" END");
    case
}

/// One JSON-path filter: `tags` membership or a `specs.<path>` comparison.
fn json_filter(path: &str, value: &Value) -> Result<(String, Vec<SqlParam>), SearchError> {
    if path == "tags" {
        return Ok((
            "AND JSON_CONTAINS(p.tags, ?)".to_string(),
            vec![SqlParam::Text(encode_json(value)?)],
        ));
    }

    let Some(spec_path) = path.strip_prefix("specs.") else {
        return Err(SearchError::translation(format!(
            "json path '{path}' is neither 'tags' nor under 'specs.'"
        )));
    };
    let extract = format!("JSON_EXTRACT(p.specifications, '$.{spec_path}')");

    let filter = match value {
        Value::String(text) => match parse_comparison(text) {
            Some((op, number)) => (format!("AND {extract} {op} ?"), vec![SqlParam::Numeric(number)]),
            None => (format!("AND JSON_UNQUOTE({extract}) = ?"), vec![SqlParam::Text(text.clone())]),
        },
        Value::Number(number) => {
            let param = match number.as_i64() {
                Some(i) => SqlParam::Integer(i),
                None => SqlParam::Numeric(number.as_f64().unwrap_or(f64::NAN)),
            };
            (format!("AND {extract} = ?"), vec![param])
        }
        // JSON_EXTRACT yields the JSON text `true`/`false`
        Value::Bool(b) => (format!("AND {extract} = ?"), vec![SqlParam::Text(b.to_string())]),
        Value::Array(_) | Value::Object(_) => (
            format!("AND JSON_CONTAINS({extract}, ?)"),
            vec![SqlParam::Text(encode_json(value)?)],
        ),
        Value::Null => (format!("AND {extract} IS NULL"), Vec::new()),
    };
    Ok(filter)
}

fn encode_json(value: &Value) -> Result<String, SearchError> {
    serde_json::to_string(value).map_err(|e| SearchError::translation(format!("json filter value: {e}")))
}

/// `"<2"`, `">= 1.5"`, `"!=0"` → operator and number.
pub(crate) fn parse_comparison(text: &str) -> Option<(&'static str, f64)> {
    const OPERATORS: [&str; 7] = [">=", "<=", "!=", "<>", "<", ">", "="];
    let trimmed = text.trim();
    OPERATORS.iter().find_map(|op| {
        let rest = trimmed.strip_prefix(op)?;
        let number: f64 = rest.trim().parse().ok()?;
        let op = if *op == "<>" { "!=" } else { *op };
        number.is_finite().then_some((op, number))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::SortDirection;
    use chrono::NaiveDate;
    use serde_json::json;

    fn dialect() -> MariaDbDialect {
        MariaDbDialect::new(CapabilityDescriptor::mariadb())
    }

    #[test]
    fn test_simple_relevance_query() {
        let criteria = SearchCriteria::builder("laptop").limit(20).build().unwrap();
        let query = dialect().relevance_query(&criteria).unwrap();

        assert!(query.text.starts_with("SELECT p.id, p.name"));
        assert!(query.text.contains("AGAINST (? IN NATURAL LANGUAGE MODE) AS relevance"));
        assert!(query.text.contains("ORDER BY relevance DESC, p.id ASC LIMIT ? OFFSET ?"));
        assert_eq!(query.params.len(), query.placeholder_count());
        assert_eq!(query.params[0], SqlParam::Text("laptop".into()));
        assert_eq!(query.params[2..], [SqlParam::Integer(20), SqlParam::Integer(0)]);
    }

    #[test]
    fn test_match_modes() {
        let boolean = SearchCriteria::builder("+a -b").match_mode(MatchMode::Boolean).build().unwrap();
        assert!(dialect().relevance_query(&boolean).unwrap().text.contains("IN BOOLEAN MODE"));

        let expansion = SearchCriteria::builder("db").match_mode(MatchMode::QueryExpansion).build().unwrap();
        assert!(dialect().relevance_query(&expansion).unwrap().text.contains("WITH QUERY EXPANSION"));

        let no_expansion = MariaDbDialect::new(CapabilityDescriptor::mariadb().with(Capability::QueryExpansion, false));
        assert!(no_expansion
            .relevance_query(&expansion)
            .unwrap()
            .text
            .contains("IN NATURAL LANGUAGE MODE"));
    }

    #[test]
    fn test_filter_order_is_fixed() {
        let criteria = SearchCriteria::builder("phone")
            .filter("brand", "Acme")
            .filter("max_price", 500)
            .filter("category", "Electronics")
            .filter("min_price", 100)
            .in_stock_only(true)
            .date_from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .build()
            .unwrap();
        let text = dialect().relevance_query(&criteria).unwrap().text;

        let positions: Vec<usize> = [
            "p.category = ?",
            "p.price >= ?",
            "p.price <= ?",
            "p.brand = ?",
            "p.created_at >= ?",
            "p.stock_quantity > 0",
        ]
        .iter()
        .map(|needle| text.find(needle).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{text}");
    }

    #[test]
    fn test_date_bounds_cover_whole_days() {
        let criteria = SearchCriteria::builder("x")
            .date_from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .date_to(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
            .build()
            .unwrap();
        let params = dialect().relevance_query(&criteria).unwrap().params;
        assert!(params.contains(&SqlParam::Text("2024-01-01 00:00:00".into())));
        assert!(params.contains(&SqlParam::Text("2024-12-31 23:59:59".into())));
    }

    #[test]
    fn test_json_filters() {
        let criteria = SearchCriteria::builder("laptop")
            .json_filter("tags", "premium")
            .json_filter("specs.weight", "<2")
            .json_filter("specs.color", "silver")
            .build()
            .unwrap();
        let query = dialect().relevance_query(&criteria).unwrap();

        assert!(query.text.contains("JSON_CONTAINS(p.tags, ?)"));
        assert!(query.text.contains("JSON_UNQUOTE(JSON_EXTRACT(p.specifications, '$.color')) = ?"));
        assert!(query.text.contains("JSON_EXTRACT(p.specifications, '$.weight') < ?"));
        assert!(query.params.contains(&SqlParam::Text("\"premium\"".into())));
        assert!(query.params.contains(&SqlParam::Numeric(2.0)));
        // lexicographic path order: specs.color, specs.weight, tags
        let color = query.text.find("'$.color'").unwrap();
        let weight = query.text.find("'$.weight'").unwrap();
        let tags = query.text.find("p.tags").unwrap();
        assert!(color < weight && weight < tags);
    }

    #[test]
    fn test_json_filter_unknown_root() {
        let err = json_filter("meta.owner", &json!("bob")).unwrap_err();
        assert!(matches!(err, SearchError::Translation(_)));
    }

    #[test]
    fn test_json_filter_scalars() {
        let (clause, params) = json_filter("specs.cores", &json!(8)).unwrap();
        assert_eq!(clause, "AND JSON_EXTRACT(p.specifications, '$.cores') = ?");
        assert_eq!(params, vec![SqlParam::Integer(8)]);

        let (clause, params) = json_filter("specs.wifi", &json!(true)).unwrap();
        assert!(clause.ends_with("= ?"));
        assert_eq!(params, vec![SqlParam::Text("true".into())]);

        let (clause, params) = json_filter("specs.ports", &json!(["usb-c"])).unwrap();
        assert!(clause.starts_with("AND JSON_CONTAINS(JSON_EXTRACT"));
        assert_eq!(params, vec![SqlParam::Text("[\"usb-c\"]".into())]);

        let (clause, params) = json_filter("specs.discontinued", &Value::Null).unwrap();
        assert!(clause.ends_with("IS NULL"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_parse_comparison() {
        assert_eq!(parse_comparison("<2"), Some(("<", 2.0)));
        assert_eq!(parse_comparison(">= 1.5"), Some((">=", 1.5)));
        assert_eq!(parse_comparison("<>3"), Some(("!=", 3.0)));
        assert_eq!(parse_comparison("silver"), None);
        assert_eq!(parse_comparison("<abc"), None);
    }

    #[test]
    fn test_price_weighted_ordering() {
        let criteria = SearchCriteria::builder("headphones")
            .order_by(PRICE_WEIGHTED_SORT, SortDirection::Desc)
            .build()
            .unwrap();
        let query = dialect()
            .with_price_weighting(PriceWeighting { weight: 5.0, ceiling: 2000.0 })
            .relevance_query(&criteria)
            .unwrap();
        assert!(query.text.contains("* 5 + (2000 - p.price)) DESC"));
        assert_eq!(query.params.len(), query.placeholder_count());
        // select, where, order by
        assert_eq!(
            query.params.iter().filter(|p| **p == SqlParam::Text("headphones".into())).count(),
            3
        );
    }

    #[test]
    fn test_multiple_sort_keys() {
        let criteria = SearchCriteria::builder("x")
            .order_by("price", SortDirection::Asc)
            .order_by("relevance", SortDirection::Desc)
            .build()
            .unwrap();
        let text = dialect().relevance_query(&criteria).unwrap().text;
        assert!(text.contains("ORDER BY p.price ASC, relevance DESC, p.id ASC LIMIT"));
    }

    #[test]
    fn test_tied_relevance_has_unique_order() {
        let criteria = SearchCriteria::builder("refund").build().unwrap();
        let customers = dialect().entity_query(Entity::Customer, &criteria).unwrap();
        assert!(customers.text.contains("ORDER BY relevance DESC, c.id ASC LIMIT"));

        let by_id = SearchCriteria::builder("x").order_by("created_at", SortDirection::Desc).build().unwrap();
        let text = dialect().relevance_query(&by_id).unwrap().text;
        assert!(text.contains("ORDER BY p.created_at DESC, p.id ASC LIMIT"));

        let products_only = dialect().join_query(&BTreeSet::from([Entity::Review]), &criteria).unwrap();
        assert!(products_only.text.contains("DESC, p.id ASC, pr.id ASC LIMIT"));
        assert!(!products_only.text.contains("o.id ASC"));
    }

    #[test]
    fn test_aggregation_price_range() {
        let criteria = SearchCriteria::builder("electronics").build().unwrap();
        let query = dialect()
            .aggregation_query(AggregateDimension::PriceRange, &criteria)
            .unwrap();
        assert!(query.text.contains("WHEN p.price < 100 THEN '0-100'"));
        assert!(query.text.contains("ELSE '1000+' END AS group_key"));
        assert!(query.text.contains("HAVING count > 0 ORDER BY avg_relevance DESC, group_key ASC"));
        assert_eq!(query.kind, QueryKind::Aggregation(AggregateDimension::PriceRange));
    }

    #[test]
    fn test_aggregation_rating_uses_reviews() {
        let criteria = SearchCriteria::builder("great").build().unwrap();
        let query = dialect().aggregation_query(AggregateDimension::Rating, &criteria).unwrap();
        assert!(query.text.contains("FROM product_reviews pr"));
        assert!(query.text.contains("CAST(pr.rating AS SIGNED) AS group_key"));
        assert_eq!(query.entity, Entity::Review);
    }

    #[test]
    fn test_join_query() {
        let criteria = SearchCriteria::builder("john").build().unwrap();
        let tables = BTreeSet::from([Entity::Customer, Entity::Order, Entity::Review]);
        let query = dialect().join_query(&tables, &criteria).unwrap();

        assert!(query.text.contains("INNER JOIN order_items oi ON oi.product_id = p.id"));
        assert_eq!(query.text.matches("INNER JOIN orders o").count(), 1);
        assert!(query.text.contains("INNER JOIN customers c ON c.id = o.customer_id"));
        assert!(query.text.contains("LEFT JOIN product_reviews pr"));
        assert!(query.text.contains(
            "ORDER BY (o_relevance + c_relevance + r_relevance + p_relevance) DESC, p.id ASC, o.id ASC, pr.id ASC"
        ));
        assert_eq!(query.params.len(), query.placeholder_count());
    }

    #[test]
    fn test_customers_only_join_still_joins_orders() {
        let criteria = SearchCriteria::builder("john").build().unwrap();
        let query = dialect()
            .join_query(&BTreeSet::from([Entity::Customer]), &criteria)
            .unwrap();
        assert!(query.text.contains("INNER JOIN orders o ON o.id = oi.order_id"));
        assert!(!query.text.contains("o_relevance"));
    }

    #[test]
    fn test_union_query() {
        let criteria = SearchCriteria::builder("john").limit(10).build().unwrap();
        let sources = BTreeSet::from([Entity::Customer, Entity::Product]);
        let query = dialect().union_query(&sources, &criteria).unwrap();

        assert!(query.text.starts_with("(SELECT 'product' AS source_type"));
        assert!(query.text.contains(") UNION ALL (SELECT 'customer' AS source_type"));
        assert!(query.text.ends_with("ORDER BY relevance DESC, source_type ASC, id ASC LIMIT ? OFFSET ?"));
        assert_eq!(query.params.len(), query.placeholder_count());
    }

    #[test]
    fn test_review_entity_filters() {
        let criteria = SearchCriteria::builder("battery")
            .filter("min_rating", 4)
            .filter("verified_only", true)
            .build()
            .unwrap();
        let query = dialect().entity_query(Entity::Review, &criteria).unwrap();
        assert!(query.text.contains("AND pr.rating >= ?"));
        assert!(query.text.contains("AND pr.verified_purchase = ?"));
        assert!(query.params.contains(&SqlParam::Numeric(4.0)));
    }

    #[test]
    fn test_order_status_filter() {
        let criteria = SearchCriteria::builder("express").filter("status", "shipped").build().unwrap();
        let query = dialect().entity_query(Entity::Order, &criteria).unwrap();
        assert!(query.text.contains("FROM orders o"));
        assert!(query.text.contains("AND o.status = ?"));
    }
}
