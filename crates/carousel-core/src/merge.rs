//! Cross-source merge step: dedup by entity, rank by recency, cap.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::types::{EventRecord, SourceId, SourcedEvent};

// ─── Constants ───────────────────────────────────────────────────────

/// Default number of events shown after the merge.
pub const DEFAULT_DISPLAY_CAP: usize = 30;

// ─── Merge ───────────────────────────────────────────────────────────

/// Deduplicate by `entity_id` (first occurrence wins), sort newest first
/// (stable, so ties keep input order) and truncate to `display_cap`.
///
/// Applying it to its own output returns the same sequence.
pub fn merge_events<I>(events: I, display_cap: usize) -> Vec<SourcedEvent>
where
    I: IntoIterator<Item = SourcedEvent>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<SourcedEvent> = events
        .into_iter()
        .filter(|e| seen.insert(e.event.entity_id.clone()))
        .collect();
    merged.sort_by(|a, b| b.event.timestamp.cmp(&a.event.timestamp));
    merged.truncate(display_cap);
    merged
}

// ─── Aggregated View ─────────────────────────────────────────────────

/// Immutable snapshot handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedView {
    pub events: Vec<SourcedEvent>,
    pub display_cap: usize,
}

impl AggregatedView {
    pub fn empty(display_cap: usize) -> Self {
        Self {
            events: Vec::new(),
            display_cap,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Entity ids of the view joined by `,`.
    pub fn ids(&self) -> String {
        self.events
            .iter()
            .map(|e| e.event.entity_id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Re-run the merge step over this view. Returns an equal view.
    #[must_use]
    pub fn remerge(&self) -> Self {
        Self {
            events: merge_events(self.events.iter().cloned(), self.display_cap),
            display_cap: self.display_cap,
        }
    }
}

// ─── Accumulator ─────────────────────────────────────────────────────

/// Append-only collection of every event contributed by completed sources,
/// in arrival order. Owned by a single merger.
#[derive(Debug, Default)]
pub struct Accumulator {
    events: Vec<SourcedEvent>,
    contributions: Vec<(SourceId, usize)>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one source's admitted events, tagged with the source.
    pub fn append(&mut self, source: SourceId, events: Vec<EventRecord>) {
        self.contributions.push((source, events.len()));
        self.events
            .extend(events.into_iter().map(|event| SourcedEvent { source, event }));
    }

    /// Number of events appended so far (before dedup).
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// `(source, admitted count)` per append, in arrival order.
    pub fn contributions(&self) -> &[(SourceId, usize)] {
        &self.contributions
    }

    /// Compute a fresh snapshot. Earlier snapshots are left untouched.
    pub fn snapshot(&self, display_cap: usize) -> Arc<AggregatedView> {
        Arc::new(AggregatedView {
            events: merge_events(self.events.iter().cloned(), display_cap),
            display_cap,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
