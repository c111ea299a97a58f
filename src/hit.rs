// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Normalized result row.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Column carrying the union discriminator.
pub const SOURCE_TYPE_FIELD: &str = "source_type";

/// The minimum every backend produces regardless of native result shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRecord {
    /// Row id, or the group key for aggregation rows.
    pub id: String,
    pub primary_fields: BTreeMap<String, Value>,
    pub relevance: f64,
}

impl HitRecord {
    pub fn new(id: impl Into<String>, relevance: f64) -> Self {
        Self {
            id: id.into(),
            primary_fields: BTreeMap::new(),
            relevance,
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.primary_fields.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.primary_fields.get(name)
    }

    /// `product`, `customer`, `review` or `order` for union hits.
    #[must_use]
    pub fn source_type(&self) -> Option<&str> {
        self.field(SOURCE_TYPE_FIELD).and_then(Value::as_str)
    }

    /// Group size for aggregation rows.
    #[must_use]
    pub fn count(&self) -> Option<u64> {
        self.field("count").and_then(Value::as_u64)
    }
}
