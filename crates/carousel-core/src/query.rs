//! Query shapes sent to source clients.
//!
//! The filter half of a query is the same for every source; the document it
//! is embedded in depends on the source family and is picked by
//! [`QueryShape::for_family`].

use std::collections::BTreeSet;

use serde::Serialize;

use crate::types::{EventType, SourceFamily};

// ─── Constants ───────────────────────────────────────────────────────

/// Results are always requested newest first.
pub const ORDER_BY_TIMESTAMP_DESC: &str = "timestamp_DESC";

// ─── Exclusion Predicate ─────────────────────────────────────────────

/// Entities and groups a request must leave out, plus the optional group
/// scope. Sets keep the predicate deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExclusionPredicate {
    pub exclude_entity_ids: BTreeSet<String>,
    pub exclude_group_ids: BTreeSet<String>,
    pub group_whitelist: Option<BTreeSet<String>>,
}

impl ExclusionPredicate {
    /// The predicate of a first request: nothing excluded yet.
    pub fn empty(group_whitelist: Option<BTreeSet<String>>) -> Self {
        Self {
            group_whitelist,
            ..Self::default()
        }
    }
}

// ─── Event Query ─────────────────────────────────────────────────────

/// Variables of an event query, serialized in the indexers' filter syntax.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventQuery {
    pub limit: usize,
    pub order_by: &'static str,
    #[serde(rename = "where")]
    pub filter: EventFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFilter {
    pub interaction_eq: &'static str,
    pub nft: NftFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NftFilter {
    /// Listings without a price are not shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_gt: Option<u64>,
    pub id_not_in: Vec<String>,
    pub collection: CollectionFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_in: Option<Vec<String>>,
    pub id_not_in: Vec<String>,
}

impl EventQuery {
    /// Build the query for one event type, limit and predicate.
    pub fn build(event_type: EventType, limit: usize, predicate: &ExclusionPredicate) -> Self {
        let id_in = predicate
            .group_whitelist
            .as_ref()
            .filter(|groups| !groups.is_empty())
            .map(|groups| groups.iter().cloned().collect());

        Self {
            limit,
            order_by: ORDER_BY_TIMESTAMP_DESC,
            filter: EventFilter {
                interaction_eq: event_type.interaction().as_wire(),
                nft: NftFilter {
                    price_gt: (event_type == EventType::NewestList).then_some(0),
                    id_not_in: predicate.exclude_entity_ids.iter().cloned().collect(),
                    collection: CollectionFilter {
                        id_in,
                        id_not_in: predicate.exclude_group_ids.iter().cloned().collect(),
                    },
                },
            },
        }
    }
}

// ─── Query Shape ─────────────────────────────────────────────────────

/// The query document used for a source family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    General,
    RmrkV2,
}

const GENERAL_DOCUMENT: &str = "\
query latestEvents($limit: Int, $orderBy: [EventOrderByInput!] = timestamp_DESC, $where: EventWhereInput) {
  events(limit: $limit, orderBy: $orderBy, where: $where) {
    id
    interaction
    timestamp
    meta
    nft {
      id
      name
      collection { id name }
    }
  }
}";

// The RMRK v2 indexer takes the same filter input; its events also carry
// the caller account.
const RMRK_V2_DOCUMENT: &str = "\
query latestEvents($limit: Int, $orderBy: [EventOrderByInput!] = timestamp_DESC, $where: EventWhereInput) {
  events(limit: $limit, orderBy: $orderBy, where: $where) {
    id
    interaction
    timestamp
    meta
    nft {
      id
      name
      collection { id name }
    }
    caller
  }
}";

impl QueryShape {
    pub fn for_family(family: SourceFamily) -> Self {
        match family {
            SourceFamily::General => Self::General,
            SourceFamily::RmrkV2 => Self::RmrkV2,
        }
    }

    pub fn document(self) -> &'static str {
        match self {
            Self::General => GENERAL_DOCUMENT,
            Self::RmrkV2 => RMRK_V2_DOCUMENT,
        }
    }

    pub fn operation_name(self) -> &'static str {
        "latestEvents"
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
