// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory connector for tests and dry runs.
//!
//! Serves fixture hits per entity, honoring each query's page window, and
//! records every executed query. Aggregations group the fixtures by their
//! `category`, `brand`, `rating` or `price` field. Latency and failures can be injected to
//! exercise timeouts and per-backend fault isolation.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::normalize_row;
use super::traits::{Connector, ConnectorError, Session};
use crate::criteria::AggregateDimension;
use crate::hit::HitRecord;
use crate::search::{merge_ranked, price_bucket, Entity, Page, QueryKind, SqlQuery};

#[derive(Default)]
struct Shared {
    fixtures: DashMap<Entity, Vec<HitRecord>>,
    /// `(needle, hits)`: a query whose inlined text contains `needle` gets `hits`.
    scripted: Mutex<Vec<(String, Vec<HitRecord>)>>,
    executed: Mutex<Vec<String>>,
    latency: Mutex<Duration>,
    fail_connect: AtomicBool,
    fail_queries: AtomicBool,
    stall_pings: AtomicBool,
    open_sessions: AtomicUsize,
    sessions_opened: AtomicUsize,
}

/// Cheap to clone; clones share fixtures and the execution log.
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    shared: Arc<Shared>,
}

impl InMemoryConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows served for `entity`.
    #[must_use]
    pub fn with_hits(self, entity: Entity, hits: Vec<HitRecord>) -> Self {
        self.shared.fixtures.insert(entity, hits);
        self
    }

    /// Serve `hits` for any query whose inlined text contains `needle`.
    #[must_use]
    pub fn with_response(self, needle: impl Into<String>, hits: Vec<HitRecord>) -> Self {
        self.shared.scripted.lock().push((needle.into(), hits));
        self
    }

    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.shared.latency.lock() = latency;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.shared.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.shared.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make `ping` (the warmup round trip) never complete.
    pub fn stall_pings(&self, stall: bool) {
        self.shared.stall_pings.store(stall, Ordering::SeqCst);
    }

    /// Inlined text of every query run so far, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.shared.executed.lock().clone()
    }

    /// Sessions currently held.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.shared.open_sessions.load(Ordering::SeqCst)
    }

    /// Sessions acquired over the connector's lifetime.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.shared.sessions_opened.load(Ordering::SeqCst)
    }

    fn window(hits: &[HitRecord], page: Page) -> Vec<HitRecord> {
        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
        hits.iter().skip(offset).take(limit).cloned().collect()
    }

    fn ranked(&self, entity: Entity) -> Vec<HitRecord> {
        let mut hits = self
            .shared
            .fixtures
            .get(&entity)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance).then_with(|| a.id.cmp(&b.id)));
        hits
    }

    /// Group fixture rows on `dimension` the way the aggregation SQL does,
    /// decoded through the same row normalization as a live result set.
    fn aggregate(&self, dimension: AggregateDimension, page: Page) -> Vec<HitRecord> {
        let entity = match dimension {
            AggregateDimension::Rating => Entity::Review,
            _ => Entity::Product,
        };

        let mut groups: BTreeMap<String, (u64, f64)> = BTreeMap::new();
        for hit in self.ranked(entity) {
            let key = match dimension {
                AggregateDimension::PriceRange => hit
                    .field("price")
                    .and_then(Value::as_f64)
                    .map(|price| price_bucket(price).to_string()),
                other => hit.field(other.as_str()).map(|value| match value {
                    Value::String(s) => s.clone(),
                    value => value.to_string(),
                }),
            };
            if let Some(key) = key {
                let (count, total) = groups.entry(key).or_insert((0, 0.0));
                *count += 1;
                *total += hit.relevance;
            }
        }

        let mut rows: Vec<HitRecord> = groups
            .into_iter()
            .map(|(key, (count, total))| {
                normalize_row(BTreeMap::from([
                    ("group_key".to_string(), Value::from(key)),
                    ("count".to_string(), Value::from(count)),
                    ("avg_relevance".to_string(), Value::from(total / count as f64)),
                ]))
            })
            .collect();
        rows.sort_by(|a, b| b.relevance.total_cmp(&a.relevance).then_with(|| a.id.cmp(&b.id)));
        Self::window(&rows, page)
    }

    fn answer(&self, query: &SqlQuery, text: &str) -> Vec<HitRecord> {
        let scripted = self
            .shared
            .scripted
            .lock()
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, hits)| hits.clone());
        if let Some(hits) = scripted {
            return Self::window(&hits, query.page);
        }

        match query.kind {
            QueryKind::Relevance | QueryKind::Join => Self::window(&self.ranked(query.entity), query.page),
            QueryKind::Union => {
                let batches = Entity::ALL
                    .into_iter()
                    .filter(|entity| text.contains(&format!("'{}' AS source_type", entity.source_type())))
                    .map(|entity| (entity, self.ranked(entity)))
                    .collect::<Vec<_>>();
                merge_ranked(batches, query.page)
            }
            QueryKind::Aggregation(dimension) => self.aggregate(dimension, query.page),
        }
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn session(&self) -> Result<Box<dyn Session>, ConnectorError> {
        if self.shared.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectorError::Unavailable("connection refused".into()));
        }
        self.shared.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.shared.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemorySession {
            connector: self.clone(),
        }))
    }
}

struct InMemorySession {
    connector: InMemoryConnector,
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.connector.shared.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn ping(&mut self) -> Result<(), ConnectorError> {
        if self.connector.shared.stall_pings.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn fetch(&mut self, query: &SqlQuery) -> Result<Vec<HitRecord>, ConnectorError> {
        let text = query.inline();
        self.connector.shared.executed.lock().push(text.clone());

        let latency = *self.connector.shared.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.connector.shared.fail_queries.load(Ordering::SeqCst) {
            return Err(ConnectorError::Query("injected failure".into()));
        }
        Ok(self.connector.answer(query, &text))
    }
}
