// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Native query values produced by the translators.
//!
//! A query is assembled from independent, order-stable fragments (select
//! list, match clause, one fragment per filter, ordering, pagination) and
//! joined exactly once, so the same criteria always yields the same text and
//! the same parameter vector.

use serde::Serialize;
use std::fmt;

use crate::criteria::{AggregateDimension, FilterValue};
use crate::error::SearchError;

/// Entities that can be searched or correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Product,
    Customer,
    Review,
    Order,
}

impl Entity {
    /// Union/merge order.
    pub const ALL: [Entity; 4] = [Self::Product, Self::Customer, Self::Review, Self::Order];

    /// Resolve a join/union table name as callers write it.
    pub fn from_table_name(name: &str) -> Result<Self, SearchError> {
        match name {
            "products" => Ok(Self::Product),
            "customers" => Ok(Self::Customer),
            "reviews" | "product_reviews" => Ok(Self::Review),
            "orders" => Ok(Self::Order),
            other => Err(SearchError::translation(format!("unknown table '{other}'"))),
        }
    }

    /// Physical table / index name.
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Self::Product => "products",
            Self::Customer => "customers",
            Self::Review => "product_reviews",
            Self::Order => "orders",
        }
    }

    /// Literal union discriminator.
    #[must_use]
    pub fn source_type(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Customer => "customer",
            Self::Review => "review",
            Self::Order => "order",
        }
    }
}

/// Which route produced a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Relevance,
    Join,
    Union,
    Aggregation(AggregateDimension),
}

/// Page window the query was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

/// Bound parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Numeric(f64),
    Boolean(bool),
}

impl SqlParam {
    /// MySQL literal for text-protocol execution.
    #[must_use]
    pub fn to_literal(&self) -> String {
        match self {
            Self::Text(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('\'');
                for c in s.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '\0' => out.push_str("\\0"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        _ => out.push(c),
                    }
                }
                out.push('\'');
                out
            }
            Self::Integer(i) => i.to_string(),
            Self::Numeric(n) if n.is_finite() => n.to_string(),
            Self::Numeric(_) => "NULL".to_string(),
            Self::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

impl From<&FilterValue> for SqlParam {
    fn from(value: &FilterValue) -> Self {
        match value {
            FilterValue::Bool(b) => Self::Boolean(*b),
            FilterValue::Integer(i) => Self::Integer(*i),
            FilterValue::Float(f) => Self::Numeric(*f),
            FilterValue::Text(s) => Self::Text(s.clone()),
        }
    }
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

/// Native query text with `?` placeholders and its parameters in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlQuery {
    pub text: String,
    pub params: Vec<SqlParam>,
    /// Primary entity searched.
    pub entity: Entity,
    pub kind: QueryKind,
    pub page: Page,
}

impl SqlQuery {
    /// Render parameters into the text.
    ///
    /// Used for SphinxQL, which has no server-side prepare, and for logs.
    /// Translators never emit a literal `?` outside placeholders.
    #[must_use]
    pub fn inline(&self) -> String {
        let mut params = self.params.iter();
        let mut out = String::with_capacity(self.text.len() + self.params.len() * 8);
        for c in self.text.chars() {
            if c == '?' {
                match params.next() {
                    Some(param) => out.push_str(&param.to_literal()),
                    None => out.push(c),
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.text.matches('?').count()
    }
}

/// Ordered fragment list; each step appends text and the params it binds.
#[derive(Debug, Clone, Default)]
pub struct QueryFragments {
    parts: Vec<String>,
    params: Vec<SqlParam>,
}

impl QueryFragments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: impl Into<String>) -> &mut Self {
        self.parts.push(text.into());
        self
    }

    pub fn push_with<I>(&mut self, text: impl Into<String>, params: I) -> &mut Self
    where
        I: IntoIterator<Item = SqlParam>,
    {
        self.parts.push(text.into());
        self.params.extend(params);
        self
    }

    pub fn append(&mut self, other: QueryFragments) -> &mut Self {
        self.parts.extend(other.parts);
        self.params.extend(other.params);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Join with `separator` into one fragment, keeping params in order.
    #[must_use]
    pub fn joined(self, separator: &str) -> QueryFragments {
        QueryFragments {
            parts: vec![self.parts.join(separator)],
            params: self.params,
        }
    }

    /// Join into one parenthesized fragment.
    #[must_use]
    pub fn enclosed(self) -> QueryFragments {
        QueryFragments {
            parts: vec![format!("({})", self.parts.join(" "))],
            params: self.params,
        }
    }

    #[must_use]
    pub fn finish(self, entity: Entity, kind: QueryKind, page: Page) -> SqlQuery {
        SqlQuery {
            text: self.parts.join(" "),
            params: self.params,
            entity,
            kind,
            page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(text: &str, params: Vec<SqlParam>) -> SqlQuery {
        SqlQuery {
            text: text.to_string(),
            params,
            entity: Entity::Product,
            kind: QueryKind::Relevance,
            page: Page::default(),
        }
    }

    #[test]
    fn test_inline_simple() {
        let q = query("SELECT id FROM products WHERE MATCH(?) LIMIT ?, ?", vec![
            SqlParam::Text("laptop".into()),
            SqlParam::Integer(0),
            SqlParam::Integer(20),
        ]);
        assert_eq!(q.inline(), "SELECT id FROM products WHERE MATCH('laptop') LIMIT 0, 20");
    }

    #[test]
    fn test_inline_escapes_quotes_and_backslashes() {
        let q = query("MATCH(?)", vec![SqlParam::Text("it's a \\ test".into())]);
        assert_eq!(q.inline(), "MATCH('it\\'s a \\\\ test')");
    }

    #[test]
    fn test_inline_does_not_rescan_inserted_text() {
        let q = query("a = ? AND b = ?", vec![
            SqlParam::Text("what?".into()),
            SqlParam::Integer(2),
        ]);
        assert_eq!(q.inline(), "a = 'what?' AND b = 2");
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(SqlParam::Numeric(100.0).to_literal(), "100");
        assert_eq!(SqlParam::Numeric(2.5).to_literal(), "2.5");
        assert_eq!(SqlParam::Numeric(f64::NAN).to_literal(), "NULL");
        assert_eq!(SqlParam::Boolean(true).to_literal(), "TRUE");
    }

    #[test]
    fn test_fragments_keep_param_order() {
        let mut select = QueryFragments::new();
        select.push_with("MATCH(a) AGAINST (?)", [SqlParam::Text("x".into())]);
        let mut fragments = QueryFragments::new();
        fragments.push("SELECT");
        fragments.append(select);
        fragments.push_with("LIMIT ?", [SqlParam::Integer(5)]);

        let q = fragments.finish(Entity::Product, QueryKind::Relevance, Page { offset: 0, limit: 5 });
        assert_eq!(q.text, "SELECT MATCH(a) AGAINST (?) LIMIT ?");
        assert_eq!(q.params, vec![SqlParam::Text("x".into()), SqlParam::Integer(5)]);
        assert_eq!(q.placeholder_count(), q.params.len());
    }

    #[test]
    fn test_entity_table_names() {
        assert_eq!(Entity::from_table_name("reviews").unwrap(), Entity::Review);
        assert_eq!(Entity::Review.table(), "product_reviews");
        assert!(matches!(Entity::from_table_name("invoices"), Err(SearchError::Translation(_))));
    }
}
