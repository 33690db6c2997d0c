//! Source client boundary: the I/O seam between the engine and the
//! indexing backends.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use carousel_core::query::{EventQuery, QueryShape};
use carousel_core::types::{RawEventRecord, SourceId};

/// Failure of a single source client call. Every variant is treated as the
/// source being unavailable for this aggregation.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("source not configured: {0}")]
    NotConfigured(SourceId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A backend returning recent activity records for one source.
///
/// Implementations must return records newest first and treat
/// `query.limit` as an upper bound. Timeout policy belongs to the
/// implementation.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn query(
        &self,
        source: SourceId,
        shape: QueryShape,
        query: &EventQuery,
    ) -> Result<Vec<RawEventRecord>, SourceError>;
}
