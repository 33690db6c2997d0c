//! Cross-source merger: fans out one aggregation per request, appends each
//! completed source into an accumulator it owns, and republishes a fresh
//! snapshot after every append.
//!
//! Snapshots are `Arc<AggregatedView>` values published on a `watch`
//! channel. A snapshot is never modified after publication, so a consumer
//! holding an older one never observes a torn state.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;

use carousel_core::CarouselError;
use carousel_core::admission::AdmissionState;
use carousel_core::merge::{Accumulator, AggregatedView};
use carousel_core::types::{AggregationRequest, SourceId};

use crate::aggregator::SourceAggregator;

pub struct CrossSourceMerger {
    aggregator: Arc<SourceAggregator>,
    display_cap: usize,
    snapshots: watch::Sender<Arc<AggregatedView>>,
}

impl CrossSourceMerger {
    pub fn new(aggregator: Arc<SourceAggregator>, display_cap: usize) -> Self {
        let (snapshots, _) = watch::channel(Arc::new(AggregatedView::empty(display_cap)));
        Self {
            aggregator,
            display_cap,
            snapshots,
        }
    }

    pub fn display_cap(&self) -> usize {
        self.display_cap
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AggregatedView>> {
        self.snapshots.subscribe()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<AggregatedView> {
        self.snapshots.borrow().clone()
    }

    /// Aggregate `requests` concurrently and return the final view.
    ///
    /// The returned view is built from this call's accumulator alone;
    /// concurrent calls on one merger only share the snapshot channel.
    ///
    /// Requests are validated before anything is dispatched; an invalid one
    /// fails the whole call. Source failures never do: a failing source
    /// contributes nothing and the view is built from the others, down to
    /// an empty view when every source fails.
    ///
    /// Dropping the returned future aborts the in-flight aggregations.
    pub async fn aggregate(
        &self,
        requests: Vec<AggregationRequest>,
    ) -> Result<Arc<AggregatedView>, CarouselError> {
        for request in &requests {
            request.validate()?;
        }

        let mut accumulator = Accumulator::new();
        let mut view = self.publish(&accumulator);

        let total = requests.len();
        let mut tasks: JoinSet<(SourceId, Result<AdmissionState, CarouselError>)> = JoinSet::new();
        for request in requests {
            let aggregator = Arc::clone(&self.aggregator);
            tasks.spawn(async move {
                let result = aggregator.run(&request).await;
                (request.source, result)
            });
        }

        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source, Ok(state))) => {
                    accumulator.append(source, state.into_accepted());
                    view = self.publish(&accumulator);
                }
                Ok((source, Err(e))) => {
                    failed += 1;
                    tracing::warn!(source = %source, error = %e, "aggregation failed");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(error = %e, "aggregation task did not complete");
                }
            }
        }

        tracing::info!(
            requests = total,
            failed,
            contributed = accumulator.len(),
            shown = view.len(),
            "aggregation complete"
        );
        Ok(view)
    }

    /// Publish this call's current snapshot and hand it back.
    fn publish(&self, accumulator: &Accumulator) -> Arc<AggregatedView> {
        let view = accumulator.snapshot(self.display_cap);
        self.snapshots.send_replace(Arc::clone(&view));
        view
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
