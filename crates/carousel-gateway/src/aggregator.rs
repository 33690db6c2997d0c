//! Source aggregator: drives one admission filter against exactly one
//! source client call.

use std::collections::HashSet;
use std::sync::Arc;

use carousel_core::CarouselError;
use carousel_core::admission::{AdmissionFilter, AdmissionState};
use carousel_core::query::{EventQuery, ExclusionPredicate, QueryShape};
use carousel_core::types::{AggregationRequest, EventRecord, SourceId};

use crate::client::SourceClient;
use crate::config::EngineConfig;

/// Runs per-source aggregations. Holds no per-call state: every `run`
/// creates and consumes its own [`AdmissionFilter`].
pub struct SourceAggregator {
    client: Arc<dyn SourceClient>,
    disabled: HashSet<SourceId>,
    group_cap: u32,
    overfetch_margin: usize,
}

impl SourceAggregator {
    pub fn new(client: Arc<dyn SourceClient>, config: &EngineConfig) -> Self {
        Self {
            client,
            disabled: config
                .disabled_sources
                .for_tier(config.tier)
                .iter()
                .copied()
                .collect(),
            group_cap: config.group_cap,
            overfetch_margin: config.overfetch_margin.max(1),
        }
    }

    pub fn is_disabled(&self, source: SourceId) -> bool {
        self.disabled.contains(&source)
    }

    /// Run one aggregation, absorbing source failures.
    ///
    /// An unavailable source yields an empty state; only configuration
    /// errors are returned.
    pub async fn run(&self, request: &AggregationRequest) -> Result<AdmissionState, CarouselError> {
        match self.try_run(request).await {
            Err(e @ CarouselError::SourceUnavailable { .. }) => {
                tracing::warn!(
                    source = %request.source,
                    event_type = %request.event_type,
                    error = %e,
                    "source contributes no events"
                );
                Ok(AdmissionState::empty())
            }
            other => other,
        }
    }

    /// Run one aggregation, surfacing [`CarouselError::SourceUnavailable`].
    pub async fn try_run(
        &self,
        request: &AggregationRequest,
    ) -> Result<AdmissionState, CarouselError> {
        request.validate()?;

        if self.is_disabled(request.source) {
            tracing::debug!(source = %request.source, "source disabled for this tier, skipping");
            return Ok(AdmissionState::empty());
        }

        let predicate = ExclusionPredicate::empty(request.whitelist().cloned());
        let limit = request.result_limit.saturating_mul(self.overfetch_margin);
        let query = EventQuery::build(request.event_type, limit, &predicate);
        let shape = QueryShape::for_family(request.source.family());

        let raw = self
            .client
            .query(request.source, shape, &query)
            .await
            .map_err(|e| CarouselError::SourceUnavailable {
                source_id: request.source,
                reason: e.to_string(),
            })?;

        let fetched = raw.len();
        let batch: Vec<EventRecord> = raw
            .into_iter()
            .filter_map(|record| match record.decode(request.source) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed record");
                    None
                }
            })
            .collect();

        let mut filter = AdmissionFilter::new(request, self.group_cap);
        filter.admit(batch);
        let state = filter.into_state();

        tracing::debug!(
            source = %request.source,
            event_type = %request.event_type,
            fetched,
            admitted = state.len(),
            excluded_groups = state.excluded_groups().len(),
            "source aggregation finished"
        );
        Ok(state)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use carousel_core::types::{EventType, RawCollection, RawEventRecord, RawNft};

    use crate::client::SourceError;
    use crate::config::Tier;

    // ── Test Helpers ─────────────────────────────────────────────────

    /// Replays a fixed batch and records every query it receives.
    struct ScriptedClient {
        batch: Result<Vec<RawEventRecord>, u16>,
        calls: Mutex<Vec<(SourceId, QueryShape, EventQuery)>>,
    }

    impl ScriptedClient {
        fn ok(batch: Vec<RawEventRecord>) -> Arc<Self> {
            Arc::new(Self {
                batch: Ok(batch),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                batch: Err(status),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(SourceId, QueryShape, EventQuery)> {
            self.calls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl SourceClient for ScriptedClient {
        async fn query(
            &self,
            source: SourceId,
            shape: QueryShape,
            query: &EventQuery,
        ) -> Result<Vec<RawEventRecord>, SourceError> {
            self.calls
                .lock()
                .expect("lock")
                .push((source, shape, query.clone()));
            match &self.batch {
                Ok(batch) => Ok(batch.iter().take(query.limit).cloned().collect()),
                Err(status) => Err(SourceError::Status(*status)),
            }
        }
    }

    fn raw(entity: &str, group: &str, millis: i64) -> RawEventRecord {
        RawEventRecord {
            id: Some(format!("ev-{entity}")),
            interaction: Some("BUY".to_string()),
            timestamp: Some(millis.to_string()),
            meta: Some("42".to_string()),
            nft: Some(RawNft {
                id: Some(entity.to_string()),
                name: None,
                collection: Some(RawCollection {
                    id: Some(group.to_string()),
                    name: None,
                }),
            }),
        }
    }

    fn same_group(n: usize) -> Vec<RawEventRecord> {
        (0..n)
            .map(|i| raw(&format!("n{i}"), "g1", 1_000_000 - i as i64))
            .collect()
    }

    fn aggregator(client: Arc<ScriptedClient>, config: &EngineConfig) -> SourceAggregator {
        SourceAggregator::new(client, config)
    }

    // ── Tests ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn issues_exactly_one_query_with_empty_exclusions() {
        let client = ScriptedClient::ok(same_group(5));
        let agg = aggregator(client.clone(), &EngineConfig::default());
        let req = AggregationRequest::new(SourceId::Ksm, EventType::NewestList, 10);

        agg.run(&req).await.expect("run");

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        let (source, shape, query) = &calls[0];
        assert_eq!(*source, SourceId::Ksm);
        assert_eq!(*shape, QueryShape::RmrkV2);
        assert_eq!(query.limit, 10);
        assert!(query.filter.nft.id_not_in.is_empty());
        assert!(query.filter.nft.collection.id_not_in.is_empty());
    }

    #[tokio::test]
    async fn group_cap_applies_to_fetched_batch() {
        let client = ScriptedClient::ok(same_group(5));
        let agg = aggregator(client, &EngineConfig::default());
        let req = AggregationRequest::new(SourceId::Ahk, EventType::LatestSales, 10);

        let state = agg.run(&req).await.expect("run");
        assert_eq!(state.len(), 3);
        assert!(state.excluded_groups().contains("g1"));
        assert_eq!(state.seen_but_rejected().len(), 2);
        assert_eq!(state.accepted()[0].latest_sale_price.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn whitelist_is_sent_and_waives_cap() {
        let client = ScriptedClient::ok(same_group(6));
        let agg = aggregator(client.clone(), &EngineConfig::default());
        let req =
            AggregationRequest::new(SourceId::Ahp, EventType::LatestSales, 4).with_whitelist(["g1"]);

        let state = agg.run(&req).await.expect("run");
        assert_eq!(state.len(), 4);
        assert!(state.excluded_groups().is_empty());
        assert_eq!(
            client.calls()[0].2.filter.nft.collection.id_in,
            Some(vec!["g1".to_string()])
        );
    }

    #[tokio::test]
    async fn overfetch_margin_scales_query_limit() {
        let client = ScriptedClient::ok(Vec::new());
        let config = EngineConfig {
            overfetch_margin: 3,
            ..EngineConfig::default()
        };
        let agg = aggregator(client.clone(), &config);
        agg.run(&AggregationRequest::new(SourceId::Ahk, EventType::LatestSales, 5))
            .await
            .expect("run");
        assert_eq!(client.calls()[0].2.limit, 15);
    }

    #[tokio::test]
    async fn failing_source_yields_empty_state() {
        let client = ScriptedClient::failing(502);
        let agg = aggregator(client, &EngineConfig::default());
        let req = AggregationRequest::new(SourceId::Rmrk, EventType::LatestSales, 5);

        let state = agg.run(&req).await.expect("failure is absorbed");
        assert!(state.is_empty());

        let err = agg.try_run(&req).await.unwrap_err();
        assert!(matches!(
            err,
            CarouselError::SourceUnavailable { source_id: SourceId::Rmrk, .. }
        ));
    }

    #[tokio::test]
    async fn disabled_source_is_not_contacted() {
        let client = ScriptedClient::ok(same_group(3));
        let config = EngineConfig {
            tier: Tier::Production,
            ..EngineConfig::default()
        };
        let agg = aggregator(client.clone(), &config);
        let req = AggregationRequest::new(SourceId::Ahr, EventType::LatestSales, 5);

        let state = agg.run(&req).await.expect("run");
        assert!(state.is_empty());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn zero_limit_is_surfaced() {
        let client = ScriptedClient::ok(same_group(3));
        let agg = aggregator(client.clone(), &EngineConfig::default());
        let req = AggregationRequest::new(SourceId::Ahk, EventType::LatestSales, 0);

        let err = agg.run(&req).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_records_are_dropped_individually() {
        let mut batch = same_group(2);
        batch.insert(1, RawEventRecord::default());
        let client = ScriptedClient::ok(batch);
        let agg = aggregator(client, &EngineConfig::default());
        let req = AggregationRequest::new(SourceId::Ahk, EventType::LatestSales, 10);

        let state = agg.run(&req).await.expect("run");
        assert_eq!(state.ids(), "n0,n1");
    }
}
