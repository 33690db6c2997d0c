//! Admission filter: decides which candidate events of one source batch make
//! it into that source's bounded result list.
//!
//! The filter is single-pass. Events rejected for group quota are not
//! backfilled by a second request; the result simply stays shorter than the
//! limit.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::query::ExclusionPredicate;
use crate::types::{AggregationRequest, EventRecord, EventType};

// ─── Constants ───────────────────────────────────────────────────────

/// Default maximum number of admitted events per group.
pub const DEFAULT_GROUP_CAP: u32 = 3;

// ─── Admission State ─────────────────────────────────────────────────

/// Bookkeeping of one filter run. Owned by exactly one filter and discarded
/// once `accepted` has been handed over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionState {
    #[serde(skip)]
    admitted_ids: HashSet<String>,
    group_counts: HashMap<String, u32>,
    excluded_groups: BTreeSet<String>,
    excluded_ids: BTreeSet<String>,
    accepted: Vec<EventRecord>,
}

impl AdmissionState {
    /// State of a source that contributed nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn accepted(&self) -> &[EventRecord] {
        &self.accepted
    }

    pub fn into_accepted(self) -> Vec<EventRecord> {
        self.accepted
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn is_admitted(&self, entity_id: &str) -> bool {
        self.admitted_ids.contains(entity_id)
    }

    /// Running count of events seen for a group (admitted or not).
    pub fn group_count(&self, group_id: &str) -> u32 {
        self.group_counts.get(group_id).copied().unwrap_or(0)
    }

    pub fn excluded_groups(&self) -> &BTreeSet<String> {
        &self.excluded_groups
    }

    /// Every entity considered so far.
    pub fn excluded_ids(&self) -> &BTreeSet<String> {
        &self.excluded_ids
    }

    /// Entities that were considered but never admitted.
    pub fn seen_but_rejected(&self) -> Vec<&str> {
        self.excluded_ids
            .iter()
            .filter(|id| !self.admitted_ids.contains(id.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Admitted entity ids joined by `,`. Changes whenever the admitted set
    /// or its order changes.
    pub fn ids(&self) -> String {
        self.accepted
            .iter()
            .map(|e| e.entity_id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Predicate a follow-up request would send to leave out everything
    /// this run has already seen.
    pub fn exclusion(&self, group_whitelist: Option<BTreeSet<String>>) -> ExclusionPredicate {
        ExclusionPredicate {
            exclude_entity_ids: self.excluded_ids.clone(),
            exclude_group_ids: self.excluded_groups.clone(),
            group_whitelist,
        }
    }
}

// ─── Admission Filter ────────────────────────────────────────────────

/// Stateful per-source filter enforcing the result limit, entity uniqueness
/// and the per-group quota.
#[derive(Debug)]
pub struct AdmissionFilter {
    event_type: EventType,
    result_limit: usize,
    /// `None` when a whitelist waives the cap.
    group_cap: Option<u32>,
    attach_latest_sale: bool,
    state: AdmissionState,
}

impl AdmissionFilter {
    pub fn new(request: &AggregationRequest, group_cap: u32) -> Self {
        Self {
            event_type: request.event_type,
            result_limit: request.result_limit,
            group_cap: request.group_cap_applies().then_some(group_cap),
            attach_latest_sale: request.with_latest_sale,
            state: AdmissionState::empty(),
        }
    }

    /// Run every event of `batch` (newest first) through the admission
    /// procedure. A batch must be fed exactly once.
    pub fn admit<I>(&mut self, batch: I) -> &AdmissionState
    where
        I: IntoIterator<Item = EventRecord>,
    {
        for event in batch {
            self.consider(event);
        }
        &self.state
    }

    pub fn state(&self) -> &AdmissionState {
        &self.state
    }

    pub fn into_state(self) -> AdmissionState {
        self.state
    }

    fn consider(&mut self, event: EventRecord) {
        let state = &mut self.state;

        if state.admitted_ids.contains(&event.entity_id) {
            return;
        }

        // Seen, not necessarily rejected.
        state.excluded_ids.insert(event.entity_id.clone());

        let count = state
            .group_counts
            .entry(event.group_id.clone())
            .or_insert(0);
        *count += 1;

        // The first event of a group is always eligible.
        let over_cap = *count > 1 && self.group_cap.is_some_and(|cap| *count > cap);
        if over_cap {
            state.excluded_groups.insert(event.group_id);
            return;
        }

        self.push(event);
    }

    fn push(&mut self, mut event: EventRecord) {
        let state = &mut self.state;
        if state.accepted.len() >= self.result_limit || state.admitted_ids.contains(&event.entity_id)
        {
            return;
        }
        if self.event_type == EventType::LatestSales && self.attach_latest_sale {
            event.latest_sale_price = event.price_meta.clone();
        }
        state.admitted_ids.insert(event.entity_id.clone());
        state.accepted.push(event);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InteractionType, SourceId};
    use chrono::{DateTime, TimeDelta, Utc};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-25T12:00:00Z")
            .expect("valid RFC3339")
            .with_timezone(&Utc)
    }

    /// Events are generated newest first, one second apart.
    fn event(entity: &str, group: &str, age_secs: i64) -> EventRecord {
        EventRecord {
            entity_id: entity.to_string(),
            group_id: group.to_string(),
            timestamp: t0() - TimeDelta::seconds(age_secs),
            interaction: InteractionType::Sale,
            price_meta: Some(format!("{age_secs}00")),
            latest_sale_price: None,
            entity_name: None,
            group_name: None,
        }
    }

    fn batch_in_group(group: &str, n: usize) -> Vec<EventRecord> {
        (0..n)
            .map(|i| event(&format!("n{i}"), group, i as i64))
            .collect()
    }

    fn request(limit: usize) -> AggregationRequest {
        AggregationRequest::new(SourceId::Ahk, EventType::LatestSales, limit)
    }

    #[test]
    fn group_cap_admits_three_of_five() {
        let mut filter = AdmissionFilter::new(&request(10), DEFAULT_GROUP_CAP);
        let state = filter.admit(batch_in_group("g1", 5));

        assert_eq!(state.len(), 3);
        assert_eq!(state.ids(), "n0,n1,n2");
        assert!(state.excluded_groups().contains("g1"));
        assert_eq!(state.seen_but_rejected(), vec!["n3", "n4"]);
        assert_eq!(state.excluded_ids().len(), 5);
    }

    #[test]
    fn whitelist_waives_cap_but_keeps_limit() {
        let req = request(4).with_whitelist(["g1"]);
        let mut filter = AdmissionFilter::new(&req, DEFAULT_GROUP_CAP);
        let state = filter.admit(batch_in_group("g1", 6));

        assert_eq!(state.len(), 4);
        assert!(state.excluded_groups().is_empty());
        assert_eq!(state.group_count("g1"), 6);
    }

    #[test]
    fn full_result_keeps_bookkeeping() {
        let mut filter = AdmissionFilter::new(&request(2), DEFAULT_GROUP_CAP);
        let batch = vec![
            event("a", "g1", 0),
            event("b", "g2", 1),
            event("c", "g3", 2),
            event("d", "g1", 3),
        ];
        let state = filter.admit(batch);

        assert_eq!(state.ids(), "a,b");
        assert_eq!(state.group_count("g3"), 1);
        assert_eq!(state.group_count("g1"), 2);
        assert!(state.excluded_ids().contains("d"));
    }

    #[test]
    fn duplicate_entity_is_skipped_without_counting() {
        let mut filter = AdmissionFilter::new(&request(10), DEFAULT_GROUP_CAP);
        let batch = vec![event("a", "g1", 0), event("a", "g1", 1), event("b", "g1", 2)];
        let state = filter.admit(batch);

        assert_eq!(state.ids(), "a,b");
        assert_eq!(state.group_count("g1"), 2);
        // The newest occurrence wins.
        assert_eq!(state.accepted()[0].timestamp, t0());
    }

    #[test]
    fn rejected_group_stays_rejected_for_later_events() {
        let mut filter = AdmissionFilter::new(&request(10), DEFAULT_GROUP_CAP);
        let mut batch = batch_in_group("g1", 4);
        batch.push(event("x", "g2", 10));
        batch.push(event("y", "g1", 11));
        let state = filter.admit(batch);

        assert_eq!(state.ids(), "n0,n1,n2,x");
        assert_eq!(state.group_count("g1"), 5);
    }

    #[test]
    fn latest_sale_price_attached_for_sales_only() {
        let mut sales = AdmissionFilter::new(&request(5), DEFAULT_GROUP_CAP);
        sales.admit(vec![event("a", "g1", 7)]);
        assert_eq!(
            sales.state().accepted()[0].latest_sale_price.as_deref(),
            Some("700")
        );

        let listings = AggregationRequest::new(SourceId::Ahk, EventType::NewestList, 5);
        let mut lists = AdmissionFilter::new(&listings, DEFAULT_GROUP_CAP);
        lists.admit(vec![event("a", "g1", 7)]);
        assert!(lists.state().accepted()[0].latest_sale_price.is_none());

        let opted_out = request(5).without_latest_sale();
        let mut plain = AdmissionFilter::new(&opted_out, DEFAULT_GROUP_CAP);
        plain.admit(vec![event("a", "g1", 7)]);
        assert!(plain.state().accepted()[0].latest_sale_price.is_none());
    }

    #[test]
    fn exclusion_predicate_reflects_state() {
        let mut filter = AdmissionFilter::new(&request(10), DEFAULT_GROUP_CAP);
        filter.admit(batch_in_group("g1", 4));
        let predicate = filter.state().exclusion(None);

        assert_eq!(predicate.exclude_entity_ids.len(), 4);
        assert_eq!(
            predicate.exclude_group_ids.iter().collect::<Vec<_>>(),
            vec!["g1"]
        );
        assert!(predicate.group_whitelist.is_none());
    }

    #[test]
    fn empty_state_has_empty_digest() {
        let state = AdmissionState::empty();
        assert!(state.is_empty());
        assert_eq!(state.ids(), "");
    }

    fn arb_batch() -> impl Strategy<Value = Vec<EventRecord>> {
        prop::collection::vec((0u8..12, 0u8..4), 0..40).prop_map(|pairs| {
            pairs
                .into_iter()
                .enumerate()
                .map(|(i, (entity, group))| {
                    event(&format!("n{entity}"), &format!("g{group}"), i as i64)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn accepted_respects_limit_uniqueness_and_cap(
            batch in arb_batch(),
            limit in 1usize..12,
        ) {
            let mut filter = AdmissionFilter::new(&request(limit), DEFAULT_GROUP_CAP);
            let state = filter.admit(batch);

            prop_assert!(state.len() <= limit);

            let unique: HashSet<&str> =
                state.accepted().iter().map(|e| e.entity_id.as_str()).collect();
            prop_assert_eq!(unique.len(), state.len());

            let mut per_group: HashMap<&str, u32> = HashMap::new();
            for e in state.accepted() {
                *per_group.entry(e.group_id.as_str()).or_default() += 1;
            }
            prop_assert!(per_group.values().all(|&n| n <= DEFAULT_GROUP_CAP));
        }

        #[test]
        fn whitelisted_batch_fills_up_to_limit(
            n in 0usize..20,
            limit in 1usize..12,
        ) {
            let req = request(limit).with_whitelist(["g1"]);
            let mut filter = AdmissionFilter::new(&req, DEFAULT_GROUP_CAP);
            let state = filter.admit(batch_in_group("g1", n));
            prop_assert_eq!(state.len(), n.min(limit));
        }
    }
}
