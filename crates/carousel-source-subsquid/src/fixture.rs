//! File-backed source client.
//!
//! Each source reads `<dir>/<source>.json`, holding either a bare array of
//! event records or a captured GraphQL response (`{"data":{"events":[..]}}`).
//! Records are served in file order, which must be newest first like the
//! live indexers. The query's filter is applied the way the indexers apply
//! it, so admission behaves the same against fixtures as against live data.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use carousel_core::query::{EventQuery, QueryShape};
use carousel_core::types::{RawEventRecord, SourceId};
use carousel_gateway::client::{SourceClient, SourceError};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FixtureFile {
    Records(Vec<RawEventRecord>),
    Response { data: FixtureData },
}

#[derive(Debug, Deserialize)]
struct FixtureData {
    #[serde(default)]
    events: Vec<RawEventRecord>,
}

impl FixtureFile {
    fn into_records(self) -> Vec<RawEventRecord> {
        match self {
            FixtureFile::Records(records) => records,
            FixtureFile::Response { data } => data.events,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixtureSourceClient {
    dir: PathBuf,
}

impl FixtureSourceClient {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, source: SourceId) -> PathBuf {
        self.dir.join(format!("{}.json", source.as_str()))
    }

    async fn load(&self, path: &Path) -> Result<Vec<RawEventRecord>, SourceError> {
        let content = tokio::fs::read_to_string(path).await?;
        let file: FixtureFile = serde_json::from_str(&content)
            .map_err(|e| SourceError::Decode(format!("{}: {e}", path.display())))?;
        Ok(file.into_records())
    }
}

#[async_trait]
impl SourceClient for FixtureSourceClient {
    async fn query(
        &self,
        source: SourceId,
        _shape: QueryShape,
        query: &EventQuery,
    ) -> Result<Vec<RawEventRecord>, SourceError> {
        let path = self.path_for(source);
        let records = self.load(&path).await?;
        let total = records.len();
        let selected: Vec<RawEventRecord> = records
            .into_iter()
            .filter(|record| matches_filter(record, query))
            .take(query.limit)
            .collect();
        tracing::debug!(
            source = %source,
            path = %path.display(),
            total,
            selected = selected.len(),
            "fixture query done"
        );
        Ok(selected)
    }
}

/// Indexer-side filter: interaction, price floor, excluded entities and
/// groups, and the optional group scope.
fn matches_filter(record: &RawEventRecord, query: &EventQuery) -> bool {
    let filter = &query.filter;
    if record.interaction.as_deref() != Some(filter.interaction_eq) {
        return false;
    }
    if let Some(floor) = filter.nft.price_gt {
        let priced = record
            .meta
            .as_deref()
            .and_then(|m| m.parse::<u128>().ok())
            .is_some_and(|price| price > u128::from(floor));
        if !priced {
            return false;
        }
    }

    let nft = record.nft.as_ref();
    let entity_id = nft.and_then(|n| n.id.as_deref());
    if entity_id.is_some_and(|id| filter.nft.id_not_in.iter().any(|x| x == id)) {
        return false;
    }

    let group_id = nft
        .and_then(|n| n.collection.as_ref())
        .and_then(|c| c.id.as_deref());
    let collection = &filter.nft.collection;
    if group_id.is_some_and(|id| collection.id_not_in.iter().any(|x| x == id)) {
        return false;
    }
    match &collection.id_in {
        Some(scope) => group_id.is_some_and(|id| scope.iter().any(|x| x == id)),
        None => true,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
