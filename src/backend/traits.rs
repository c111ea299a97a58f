// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::hit::HitRecord;
use crate::search::SqlQuery;

/// Transport-level failure; [`SearchBackend`](super::SearchBackend) attaches
/// the backend name when converting to `SearchError`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectorError {
    #[error("connection unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// Hands out sessions against one search backend.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Acquire a session (a pooled connection). Released on drop.
    async fn session(&self) -> Result<Box<dyn Session>, ConnectorError>;
}

/// One acquired connection.
#[async_trait]
pub trait Session: Send {
    /// Cheapest round trip the backend accepts.
    async fn ping(&mut self) -> Result<(), ConnectorError>;

    /// Run one native query and normalize its rows, in backend order.
    async fn fetch(&mut self, query: &SqlQuery) -> Result<Vec<HitRecord>, ConnectorError>;
}

/// Stands in for a backend whose connection failed; every session request
/// returns that failure.
#[derive(Debug, Clone)]
pub struct UnreachableConnector {
    error: ConnectorError,
}

impl UnreachableConnector {
    #[must_use]
    pub fn new(error: ConnectorError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl Connector for UnreachableConnector {
    async fn session(&self) -> Result<Box<dyn Session>, ConnectorError> {
        Err(self.error.clone())
    }
}
