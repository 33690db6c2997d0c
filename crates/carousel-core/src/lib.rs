//! carousel-core: data model and pure algorithms of the marketplace activity
//! carousel.
//!
//! - [`admission`]: per-source admission filter (result limit, entity
//!   uniqueness, per-group quota).
//! - [`merge`]: cross-source dedup / recency sort / display cap.
//! - [`query`]: query variables and per-family query documents.
//! - [`chart`]: price-history binning and outlier trimming.
//!
//! Nothing here performs I/O; orchestration lives in `carousel-gateway`.

pub mod admission;
pub mod chart;
pub mod error;
pub mod merge;
pub mod query;
pub mod types;

pub use error::CarouselError;
