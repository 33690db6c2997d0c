//! Request sets of the two stock carousels.

use carousel_core::types::{AggregationRequest, EventType, SourceId};

use crate::config::EngineConfig;

/// Latest activity across every carousel source: one request per source,
/// default tier limit, per-group cap in force.
pub fn latest_feed(config: &EngineConfig, event_type: EventType) -> Vec<AggregationRequest> {
    let limit = config.feed_limit(event_type);
    config
        .carousel_sources
        .iter()
        .map(|&source| AggregationRequest::new(source, event_type, limit))
        .collect()
}

/// Generative-drop carousel: sales and listings of the given groups on the
/// two asset-hub sources, cap waived by the whitelist. A source with no
/// groups gets no requests, so nothing outside the drop can leak in.
pub fn generative_feed(
    config: &EngineConfig,
    ahk_groups: &[String],
    ahp_groups: &[String],
) -> Vec<AggregationRequest> {
    let limit = config.limits.generative;
    let scoped = [(SourceId::Ahk, ahk_groups), (SourceId::Ahp, ahp_groups)];
    EventType::ALL
        .iter()
        .flat_map(|&event_type| {
            scoped
                .iter()
                .filter(|(_, groups)| !groups.is_empty())
                .map(move |&(source, groups)| {
                    AggregationRequest::new(source, event_type, limit)
                        .with_whitelist(groups.iter().cloned())
                })
        })
        .collect()
}
