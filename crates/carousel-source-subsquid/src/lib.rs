//! carousel-source-subsquid: source clients for the Subsquid indexers.
//! `graphql` talks to live endpoints over HTTP; `fixture` replays JSON
//! files from disk with the same filter semantics.

pub mod fixture;
pub mod graphql;

pub use fixture::FixtureSourceClient;
pub use graphql::SubsquidClient;
