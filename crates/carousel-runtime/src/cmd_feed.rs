//! `carousel feed` and `carousel generative`: build the request set, run
//! the merger and print the final view.

use std::path::Path;
use std::sync::Arc;

use carousel_core::types::AggregationRequest;
use carousel_gateway::aggregator::SourceAggregator;
use carousel_gateway::client::SourceClient;
use carousel_gateway::merger::CrossSourceMerger;
use carousel_gateway::presets;
use carousel_source_subsquid::{FixtureSourceClient, SubsquidClient};

use crate::cli::{FeedOpts, GenerativeOpts};
use crate::config::FileConfig;
use crate::render;

/// Fixture directory wins over configured endpoints.
pub(crate) fn build_client(
    config: &FileConfig,
    fixtures: Option<&Path>,
) -> anyhow::Result<Arc<dyn SourceClient>> {
    if let Some(dir) = fixtures {
        tracing::info!(dir = %dir.display(), "serving sources from fixtures");
        return Ok(Arc::new(FixtureSourceClient::new(dir)));
    }
    let endpoints = config.endpoints()?;
    if endpoints.is_empty() {
        tracing::warn!("no source endpoints configured; every source will be empty");
    }
    let client = SubsquidClient::new(endpoints, config.http.timeout())?;
    Ok(Arc::new(client))
}

pub(crate) fn build_merger(config: &FileConfig, client: Arc<dyn SourceClient>) -> CrossSourceMerger {
    let aggregator = SourceAggregator::new(client, &config.engine);
    CrossSourceMerger::new(Arc::new(aggregator), config.engine.display_cap)
}

async fn run(
    merger: &CrossSourceMerger,
    requests: Vec<AggregationRequest>,
    json: bool,
) -> anyhow::Result<()> {
    let mut snapshots = merger.subscribe();
    let watcher = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let view = snapshots.borrow_and_update().clone();
            tracing::debug!(events = view.len(), ids = %view.ids(), "snapshot");
        }
    });

    let view = merger.aggregate(requests).await?;
    watcher.abort();

    if json {
        println!("{}", render::format_view_json(&view)?);
    } else {
        print!("{}", render::format_view(&view));
    }
    Ok(())
}

pub async fn cmd_feed(
    config: &FileConfig,
    fixtures: Option<&Path>,
    opts: &FeedOpts,
) -> anyhow::Result<()> {
    let client = build_client(config, fixtures)?;
    let merger = build_merger(config, client);
    let requests = presets::latest_feed(&config.engine, opts.kind.into());
    run(&merger, requests, opts.json).await
}

pub async fn cmd_generative(
    config: &FileConfig,
    fixtures: Option<&Path>,
    opts: &GenerativeOpts,
) -> anyhow::Result<()> {
    if opts.ahk.is_empty() && opts.ahp.is_empty() {
        anyhow::bail!("generative feed needs at least one group id (--ahk or --ahp)");
    }
    let client = build_client(config, fixtures)?;
    let merger = build_merger(config, client);
    let requests = presets::generative_feed(&config.engine, &opts.ahk, &opts.ahp);
    run(&merger, requests, opts.json).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use carousel_core::types::{EventType, SourceId};

    fn write(dir: &Path, source: SourceId, body: &str) {
        std::fs::write(dir.join(format!("{source}.json")), body).expect("write fixture");
    }

    fn sale(entity: &str, group: &str, ts: &str) -> String {
        format!(
            r#"{{"interaction":"BUY","timestamp":"{ts}","meta":"7",
                "nft":{{"id":"{entity}","collection":{{"id":"{group}"}}}}}}"#
        )
    }

    #[tokio::test]
    async fn fixture_feed_merges_available_sources() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write(
            tmp.path(),
            SourceId::Ahk,
            &format!("[{}]", sale("a", "g1", "2026-01-01T00:02:00Z")),
        );
        write(
            tmp.path(),
            SourceId::Rmrk,
            &format!("[{}]", sale("r", "g2", "2026-01-01T00:03:00Z")),
        );
        // ahp and ksm have no fixture file: unavailable, not fatal.

        let config = FileConfig::default();
        let client = build_client(&config, Some(tmp.path())).expect("client");
        let merger = build_merger(&config, client);
        let view = merger
            .aggregate(presets::latest_feed(&config.engine, EventType::LatestSales))
            .await
            .expect("aggregate");

        assert_eq!(view.ids(), "r,a");
    }

    #[test]
    fn no_endpoints_still_builds_a_client() {
        assert!(build_client(&FileConfig::default(), None).is_ok());
    }

    #[tokio::test]
    async fn generative_requires_groups() {
        let opts = GenerativeOpts {
            ahk: Vec::new(),
            ahp: Vec::new(),
            json: false,
        };
        let err = cmd_generative(&FileConfig::default(), None, &opts)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least one group"));
    }
}
