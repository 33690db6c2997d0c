//! Data model: sources, event records as received and as admitted, and
//! per-source aggregation requests.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CarouselError;

// ─── Source ───────────────────────────────────────────────────────

/// One independent indexing backend ("chain") providing activity records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Ahk,
    Ahp,
    Rmrk,
    Ksm,
    Ahr,
}

impl SourceId {
    pub const ALL: [Self; 5] = [Self::Ahk, Self::Ahp, Self::Rmrk, Self::Ksm, Self::Ahr];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ahk => "ahk",
            Self::Ahp => "ahp",
            Self::Rmrk => "rmrk",
            Self::Ksm => "ksm",
            Self::Ahr => "ahr",
        }
    }

    /// Map a source to the family that decides its query shape.
    pub fn family(self) -> SourceFamily {
        match self {
            Self::Ksm => SourceFamily::RmrkV2,
            Self::Ahk | Self::Ahp | Self::Rmrk | Self::Ahr => SourceFamily::General,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = CarouselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ahk" => Ok(Self::Ahk),
            "ahp" => Ok(Self::Ahp),
            "rmrk" => Ok(Self::Rmrk),
            "ksm" => Ok(Self::Ksm),
            "ahr" => Ok(Self::Ahr),
            _ => Err(CarouselError::Configuration(format!(
                "unknown source identifier: {s}"
            ))),
        }
    }
}

/// Sources sharing one query document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFamily {
    General,
    RmrkV2,
}

// ─── Interaction & Event Type ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionType {
    #[serde(rename = "BUY")]
    Sale,
    #[serde(rename = "LIST")]
    Listing,
}

impl InteractionType {
    /// Wire name used by the indexers.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Sale => "BUY",
            Self::Listing => "LIST",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Self::Sale),
            "LIST" => Some(Self::Listing),
            _ => None,
        }
    }
}

/// Which feed an aggregation builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    LatestSales,
    NewestList,
}

impl EventType {
    pub const ALL: [Self; 2] = [Self::LatestSales, Self::NewestList];

    pub fn interaction(self) -> InteractionType {
        match self {
            Self::LatestSales => InteractionType::Sale,
            Self::NewestList => InteractionType::Listing,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LatestSales => "latestSales",
            Self::NewestList => "newestList",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Event Record ─────────────────────────────────────────────────

/// A decoded activity event. Identity is `entity_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub entity_id: String,
    pub group_id: String,
    pub timestamp: DateTime<Utc>,
    pub interaction: InteractionType,
    /// Secondary metadata of the event (the price for sales and listings).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_meta: Option<String>,
    /// Set on admission into a `LatestSales` result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_sale_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

impl EventRecord {
    /// Epoch milliseconds of the event.
    pub fn unix_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// An event record as returned by a source client, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEventRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub interaction: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub meta: Option<String>,
    #[serde(default)]
    pub nft: Option<RawNft>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub collection: Option<RawCollection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCollection {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl RawEventRecord {
    /// Validate and convert into an [`EventRecord`].
    ///
    /// Fails with [`CarouselError::MalformedRecord`] when the entity id, group
    /// id, timestamp or interaction is missing or unparseable.
    pub fn decode(self, source_id: SourceId) -> Result<EventRecord, CarouselError> {
        let malformed = |reason: String| CarouselError::MalformedRecord { source_id, reason };

        let nft = self
            .nft
            .ok_or_else(|| malformed("missing nft".to_string()))?;
        let entity_id = nft
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| malformed("missing nft.id".to_string()))?;
        let collection = nft
            .collection
            .ok_or_else(|| malformed(format!("{entity_id}: missing nft.collection")))?;
        let group_id = collection
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| malformed(format!("{entity_id}: missing nft.collection.id")))?;
        let raw_ts = self
            .timestamp
            .ok_or_else(|| malformed(format!("{entity_id}: missing timestamp")))?;
        let timestamp = parse_timestamp(&raw_ts)
            .ok_or_else(|| malformed(format!("{entity_id}: bad timestamp {raw_ts:?}")))?;
        let raw_interaction = self
            .interaction
            .ok_or_else(|| malformed(format!("{entity_id}: missing interaction")))?;
        let interaction = InteractionType::from_wire(&raw_interaction).ok_or_else(|| {
            malformed(format!("{entity_id}: unknown interaction {raw_interaction:?}"))
        })?;

        Ok(EventRecord {
            entity_id,
            group_id,
            timestamp,
            interaction,
            price_meta: self.meta,
            latest_sale_price: None,
            entity_name: nft.name,
            group_name: collection.name,
        })
    }
}

/// Accepts RFC3339 strings and bare epoch-millisecond integers.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

// ─── Aggregation Request ──────────────────────────────────────────

/// Immutable description of one per-source aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRequest {
    pub source: SourceId,
    pub event_type: EventType,
    pub result_limit: usize,
    /// When set, the query is scoped to these groups and the per-group cap
    /// is waived.
    #[serde(default)]
    pub group_whitelist: Option<BTreeSet<String>>,
    /// Attach `latest_sale_price` to admitted `LatestSales` events.
    #[serde(default = "default_with_latest_sale")]
    pub with_latest_sale: bool,
}

fn default_with_latest_sale() -> bool {
    true
}

impl AggregationRequest {
    pub fn new(source: SourceId, event_type: EventType, result_limit: usize) -> Self {
        Self {
            source,
            event_type,
            result_limit,
            group_whitelist: None,
            with_latest_sale: true,
        }
    }

    #[must_use]
    pub fn with_whitelist<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_whitelist = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn without_latest_sale(mut self) -> Self {
        self.with_latest_sale = false;
        self
    }

    /// A limit of zero signals a caller bug and is never defaulted.
    pub fn validate(&self) -> Result<(), CarouselError> {
        if self.result_limit == 0 {
            return Err(CarouselError::Configuration(format!(
                "{} {}: result limit must be positive",
                self.source, self.event_type
            )));
        }
        Ok(())
    }

    /// The whitelist, if one with at least one group was given.
    pub fn whitelist(&self) -> Option<&BTreeSet<String>> {
        self.group_whitelist.as_ref().filter(|groups| !groups.is_empty())
    }

    /// Whether the per-group cap applies to this request.
    pub fn group_cap_applies(&self) -> bool {
        self.whitelist().is_none()
    }
}

// ─── Sourced Event ────────────────────────────────────────────────

/// An admitted event tagged with the source it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcedEvent {
    pub source: SourceId,
    #[serde(flatten)]
    pub event: EventRecord,
}

// ─── Tests ────────────────────────────────────────────────────────
