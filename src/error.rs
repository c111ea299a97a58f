// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy shared by criteria validation, translation, execution and
//! the benchmark runner.

use std::time::Duration;
use thiserror::Error;

use crate::capability::Capability;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// The criteria asks for a feature the backend's descriptor marks false.
    #[error("backend '{backend}' does not support {capability}")]
    CapabilityUnsupported {
        backend: String,
        capability: Capability,
    },

    /// Connection, session acquisition or warmup failure.
    #[error("backend '{backend}' unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// Rejected at construction time, before any backend is touched.
    #[error("invalid search criteria: {0}")]
    InvalidCriteria(String),

    /// The translator cannot express this combination natively.
    #[error("translation error: {0}")]
    Translation(String),

    /// The backend accepted the connection but the query failed.
    #[error("query failed on '{backend}': {reason}")]
    Query { backend: String, reason: String },

    #[error("trial on '{backend}' timed out after {after:?}")]
    Timeout { backend: String, after: Duration },

    #[error("benchmark cancelled")]
    Cancelled,
}

impl SearchError {
    pub(crate) fn unsupported(backend: &str, capability: Capability) -> Self {
        Self::CapabilityUnsupported {
            backend: backend.to_string(),
            capability,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidCriteria(reason.into())
    }

    pub(crate) fn translation(reason: impl Into<String>) -> Self {
        Self::Translation(reason.into())
    }

    /// Structural errors describe an invalid request and must reach the caller.
    /// Everything else is an execution fault scoped to one backend.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::CapabilityUnsupported { .. } | Self::InvalidCriteria(_) | Self::Translation(_)
        )
    }

    /// Short label used for metrics and failure reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CapabilityUnsupported { .. } => "capability_unsupported",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::InvalidCriteria(_) => "invalid_criteria",
            Self::Translation(_) => "translation",
            Self::Query { .. } => "query",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}
