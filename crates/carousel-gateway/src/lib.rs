//! carousel-gateway: fans aggregation requests out to source clients,
//! admits each source's batch independently and merges the bounded results
//! into one capped, recency-ordered view.

pub mod aggregator;
pub mod client;
pub mod config;
pub mod merger;
pub mod presets;

pub use carousel_core::types;
