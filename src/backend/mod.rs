// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Backend client.
//!
//! A [`SearchBackend`] pairs a [`Translator`] with a [`Connector`]. Every
//! search translates first, so a capability error never reaches the network,
//! then acquires a session, executes, and releases the session when it drops.
//! Results come back in backend order and are never cached.
//!
//! ```rust
//! use fulltext_bench::backend::{InMemoryConnector, SearchBackend};
//! use fulltext_bench::criteria::SearchCriteria;
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let sphinx = SearchBackend::sphinx(Arc::new(InMemoryConnector::new()));
//! let criteria = SearchCriteria::builder("laptop").json_filter("tags", "premium").build().unwrap();
//! assert!(sphinx.search(&criteria).await.is_err());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

mod memory;
mod sql;
mod traits;

pub use memory::InMemoryConnector;
pub use sql::{BindMode, SqlConnector};
pub use traits::{Connector, ConnectorError, Session, UnreachableConnector};

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::capability::{Capability, CapabilityDescriptor};
use crate::config::BackendConfig;
use crate::criteria::SearchCriteria;
use crate::error::SearchError;
use crate::hit::HitRecord;
use crate::metrics;
use crate::resilience::retry::RetryConfig;
use crate::search::{merge_ranked, Entity, PriceWeighting, QueryPlan, Translator};

/// A named search engine reachable through a connector.
pub struct SearchBackend {
    name: String,
    translator: Translator,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for SearchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchBackend")
            .field("name", &self.name)
            .field("kind", &self.translator.kind())
            .finish_non_exhaustive()
    }
}

impl SearchBackend {
    /// The translator's descriptor must report the same backend name.
    pub fn new(name: impl Into<String>, translator: Translator, connector: Arc<dyn Connector>) -> Self {
        Self {
            name: name.into(),
            translator,
            connector,
        }
    }

    #[must_use]
    pub fn mariadb(connector: Arc<dyn Connector>) -> Self {
        Self::new("MariaDB", Translator::mariadb(), connector)
    }

    #[must_use]
    pub fn sphinx(connector: Arc<dyn Connector>) -> Self {
        Self::new("Sphinx", Translator::sphinx(), connector)
    }

    /// Connect a configured backend: prepared statements for MariaDB,
    /// inlined text for SphinxQL.
    ///
    /// A backend that cannot be reached is still returned. Its sessions fail
    /// with the connect error, so a sweep reports it as a failed backend
    /// and the others still run.
    pub async fn from_config(
        config: &BackendConfig,
        price_weighting: PriceWeighting,
        retry_config: &RetryConfig,
    ) -> Self {
        let connector: Arc<dyn Connector> = match SqlConnector::from_config(config, retry_config).await {
            Ok(connector) => Arc::new(connector),
            Err(error) => {
                warn!(backend = %config.name, error = %error, "Backend unreachable, registering it as failed");
                Arc::new(UnreachableConnector::new(error))
            }
        };
        let translator = Translator::for_kind(config.kind, &config.name).with_price_weighting(price_weighting);
        Self::new(config.name.clone(), translator, connector)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    #[must_use]
    pub fn capabilities(&self) -> &CapabilityDescriptor {
        self.translator.capabilities()
    }

    #[must_use]
    pub fn supported_boolean_operators(&self) -> &[&'static str] {
        self.capabilities().boolean_operators()
    }

    #[must_use]
    pub fn supports_json_search(&self) -> bool {
        self.capabilities().supports(Capability::JsonFiltering)
    }

    #[must_use]
    pub fn supports_query_expansion(&self) -> bool {
        self.capabilities().supports(Capability::QueryExpansion)
    }

    #[must_use]
    pub fn supports_proximity_search(&self) -> bool {
        self.capabilities().supports(Capability::ProximitySearch)
    }

    /// Acquire a scoped session; released when the returned value drops.
    pub async fn open_session(&self) -> Result<BackendSession<'_>, SearchError> {
        let session = self.connector.session().await.map_err(|e| self.unavailable(e))?;
        Ok(BackendSession { backend: self, session })
    }

    /// Prime connections and caches with a trivial round trip.
    pub async fn warmup(&self) -> Result<(), SearchError> {
        let mut session = self.open_session().await?;
        session.warmup().await
    }

    /// Translate with the routed entry point without touching the network.
    pub fn plan(&self, criteria: &SearchCriteria) -> Result<QueryPlan, SearchError> {
        self.translate(|t| t.translate(criteria))
    }

    /// Routed search: aggregation, union, join or plain relevance.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<HitRecord>, SearchError> {
        let plan = self.plan(criteria)?;
        self.run(&plan).await
    }

    pub async fn search_with_aggregation(&self, criteria: &SearchCriteria) -> Result<Vec<HitRecord>, SearchError> {
        let plan = self.translate(|t| t.aggregation(criteria))?;
        self.run(&plan).await
    }

    pub async fn search_with_join(&self, criteria: &SearchCriteria) -> Result<Vec<HitRecord>, SearchError> {
        let plan = self.translate(|t| t.join(criteria))?;
        self.run(&plan).await
    }

    pub async fn search_union(&self, criteria: &SearchCriteria) -> Result<Vec<HitRecord>, SearchError> {
        let plan = self.translate(|t| t.union(criteria))?;
        self.run(&plan).await
    }

    pub async fn search_across_customers(&self, criteria: &SearchCriteria) -> Result<Vec<HitRecord>, SearchError> {
        let plan = self.translate(|t| t.entity(Entity::Customer, criteria))?;
        self.run(&plan).await
    }

    /// Honors `min_rating` and `verified_only`.
    pub async fn search_across_reviews(&self, criteria: &SearchCriteria) -> Result<Vec<HitRecord>, SearchError> {
        let plan = self.translate(|t| t.entity(Entity::Review, criteria))?;
        self.run(&plan).await
    }

    /// Honors `status`.
    pub async fn search_across_orders(&self, criteria: &SearchCriteria) -> Result<Vec<HitRecord>, SearchError> {
        let plan = self.translate(|t| t.entity(Entity::Order, criteria))?;
        self.run(&plan).await
    }

    fn translate<F>(&self, f: F) -> Result<QueryPlan, SearchError>
    where
        F: FnOnce(&Translator) -> Result<QueryPlan, SearchError>,
    {
        f(&self.translator).inspect_err(|e| {
            if let SearchError::CapabilityUnsupported { capability, .. } = e {
                metrics::record_capability_rejection(&self.name, capability.name());
            }
        })
    }

    async fn run(&self, plan: &QueryPlan) -> Result<Vec<HitRecord>, SearchError> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }
        let mut session = self.open_session().await?;
        session.execute(plan).await
    }

    fn unavailable(&self, error: ConnectorError) -> SearchError {
        metrics::record_backend_error(&self.name, "unavailable");
        SearchError::BackendUnavailable {
            backend: self.name.clone(),
            reason: error.to_string(),
        }
    }

    fn query_failed(&self, error: ConnectorError) -> SearchError {
        match error {
            ConnectorError::Unavailable(_) => self.unavailable(error),
            ConnectorError::Query(reason) => {
                metrics::record_backend_error(&self.name, "query");
                SearchError::Query {
                    backend: self.name.clone(),
                    reason,
                }
            }
        }
    }
}

/// An acquired connection bound to its backend.
pub struct BackendSession<'a> {
    backend: &'a SearchBackend,
    session: Box<dyn Session>,
}

impl BackendSession<'_> {
    #[must_use]
    pub fn backend(&self) -> &SearchBackend {
        self.backend
    }

    pub async fn warmup(&mut self) -> Result<(), SearchError> {
        let start = Instant::now();
        self.session.ping().await.map_err(|e| self.backend.query_failed(e))?;
        metrics::record_warmup(&self.backend.name, start.elapsed());
        Ok(())
    }

    /// Translate with the routed entry point and execute on this session.
    pub async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<HitRecord>, SearchError> {
        let plan = self.backend.plan(criteria)?;
        self.execute(&plan).await
    }

    /// Run a translated plan; fan-out plans are merged client-side.
    pub async fn execute(&mut self, plan: &QueryPlan) -> Result<Vec<HitRecord>, SearchError> {
        match plan {
            QueryPlan::Empty => Ok(Vec::new()),
            QueryPlan::Single(query) => {
                debug!(backend = %self.backend.name, sql = %query.inline(), "Executing query");
                self.session.fetch(query).await.map_err(|e| self.backend.query_failed(e))
            }
            QueryPlan::Fanout { parts, page } => {
                let mut batches = Vec::with_capacity(parts.len());
                for query in parts {
                    debug!(backend = %self.backend.name, sql = %query.inline(), "Executing union branch");
                    let hits = self.session.fetch(query).await.map_err(|e| self.backend.query_failed(e))?;
                    batches.push((query.entity, hits));
                }
                Ok(merge_ranked(batches, *page))
            }
        }
    }
}

/// Normalize one result row: `id` (or `group_key`) becomes the hit id;
/// `relevance`, else `avg_relevance`, else the sum of `*_relevance`
/// columns, becomes the score; everything else lands in `primary_fields`.
pub(crate) fn normalize_row(mut columns: BTreeMap<String, Value>) -> HitRecord {
    let id = columns
        .remove("id")
        .or_else(|| columns.remove("group_key"))
        .map(|value| match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default();

    let relevance = match columns.remove("relevance") {
        Some(value) => value.as_f64().unwrap_or(0.0),
        None => match columns.get("avg_relevance").and_then(Value::as_f64) {
            Some(avg) => avg,
            None => columns
                .iter()
                .filter(|(name, _)| name.ends_with("_relevance"))
                .filter_map(|(_, value)| value.as_f64())
                .sum(),
        },
    };

    HitRecord {
        id,
        primary_fields: columns,
        relevance,
    }
}
