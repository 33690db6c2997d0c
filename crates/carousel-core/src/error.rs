//! Error taxonomy shared by every carousel crate.

use thiserror::Error;

use crate::types::SourceId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CarouselError {
    /// Network failure, timeout or non-2xx reply from a source client call.
    /// Recovered locally: the source contributes zero events.
    #[error("source {source_id} unavailable: {reason}")]
    SourceUnavailable { source_id: SourceId, reason: String },

    /// A returned record is missing a required field. Only that record is dropped.
    #[error("malformed record from {source_id}: {reason}")]
    MalformedRecord { source_id: SourceId, reason: String },

    /// Unknown source identifier or invalid limit. Fatal to the call.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CarouselError {
    /// Whether the error must be surfaced to the caller instead of being
    /// absorbed by the aggregation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
