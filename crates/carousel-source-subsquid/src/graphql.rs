//! GraphQL-over-HTTP client for the Subsquid indexers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use carousel_core::query::{EventQuery, QueryShape};
use carousel_core::types::{RawEventRecord, SourceId};
use carousel_gateway::client::{SourceClient, SourceError};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

// ─── Wire Types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphqlRequest<'a> {
    pub operation_name: &'static str,
    pub query: &'static str,
    pub variables: &'a EventQuery,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<EventsData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct EventsData {
    #[serde(default)]
    events: Vec<RawEventRecord>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

pub(crate) fn request_body(shape: QueryShape, query: &EventQuery) -> GraphqlRequest<'_> {
    GraphqlRequest {
        operation_name: shape.operation_name(),
        query: shape.document(),
        variables: query,
    }
}

/// Extract the event list from a response body.
///
/// A response carrying `errors` but no `data` is a decode failure; partial
/// data alongside errors is accepted.
pub(crate) fn parse_events(body: &str) -> Result<Vec<RawEventRecord>, SourceError> {
    let response: GraphqlResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;
    match response.data {
        Some(data) => {
            if !response.errors.is_empty() {
                tracing::warn!(
                    errors = response.errors.len(),
                    first = %response.errors[0].message,
                    "partial graphql response"
                );
            }
            Ok(data.events)
        }
        None => {
            let message = response
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "response has no data".to_string());
            Err(SourceError::Decode(message))
        }
    }
}

// ─── Client ──────────────────────────────────────────────────────────

/// Queries one GraphQL endpoint per source.
#[derive(Debug, Clone)]
pub struct SubsquidClient {
    client: Client,
    endpoints: HashMap<SourceId, String>,
    timeout: Duration,
}

impl SubsquidClient {
    pub fn new(
        endpoints: HashMap<SourceId, String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("carousel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Transport(format!("cannot build http client: {e}")))?;
        Ok(Self {
            client,
            endpoints,
            timeout,
        })
    }

    pub fn endpoint(&self, source: SourceId) -> Option<&str> {
        self.endpoints.get(&source).map(String::as_str)
    }
}

#[async_trait]
impl SourceClient for SubsquidClient {
    async fn query(
        &self,
        source: SourceId,
        shape: QueryShape,
        query: &EventQuery,
    ) -> Result<Vec<RawEventRecord>, SourceError> {
        let url = self
            .endpoint(source)
            .ok_or(SourceError::NotConfigured(source))?;

        let response = self
            .client
            .post(url)
            .json(&request_body(shape, query))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout(self.timeout)
                } else {
                    SourceError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(self.timeout)
            } else {
                SourceError::Transport(e.to_string())
            }
        })?;

        let events = parse_events(&body)?;
        tracing::debug!(source = %source, limit = query.limit, fetched = events.len(), "graphql query done");
        Ok(events)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use carousel_core::query::ExclusionPredicate;
    use carousel_core::types::EventType;

    #[test]
    fn body_carries_document_and_variables() {
        let query = EventQuery::build(EventType::NewestList, 8, &ExclusionPredicate::default());
        let body = serde_json::to_value(request_body(QueryShape::RmrkV2, &query)).expect("json");

        assert_eq!(body["operationName"], "latestEvents");
        assert!(body["query"].as_str().expect("doc").contains("caller"));
        assert_eq!(body["variables"]["limit"], 8);
        assert_eq!(body["variables"]["where"]["interaction_eq"], "LIST");
        assert_eq!(body["variables"]["where"]["nft"]["price_gt"], 0);
    }

    #[test]
    fn parses_event_list() {
        let body = r#"{"data":{"events":[
            {"id":"1","interaction":"BUY","timestamp":"2026-01-01T00:00:00Z","meta":"10",
             "nft":{"id":"n1","name":"One","collection":{"id":"g1","name":"G"}}}
        ]}}"#;
        let events = parse_events(body).expect("parse");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].meta.as_deref(), Some("10"));
        assert_eq!(
            events[0].nft.as_ref().and_then(|n| n.id.as_deref()),
            Some("n1")
        );
    }

    #[test]
    fn errors_without_data_are_decode_failures() {
        let body = r#"{"errors":[{"message":"bad where"}]}"#;
        let err = parse_events(body).unwrap_err();
        assert!(matches!(err, SourceError::Decode(ref m) if m == "bad where"));
    }

    #[test]
    fn partial_data_is_kept() {
        let body = r#"{"data":{"events":[]},"errors":[{"message":"slow"}]}"#;
        assert!(parse_events(body).expect("parse").is_empty());
    }

    #[test]
    fn garbage_is_a_decode_failure() {
        assert!(matches!(
            parse_events("<html>"),
            Err(SourceError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn unknown_source_is_not_configured() {
        let client = SubsquidClient::new(HashMap::new(), DEFAULT_REQUEST_TIMEOUT).expect("client");
        let query = EventQuery::build(EventType::LatestSales, 5, &ExclusionPredicate::default());
        let err = client
            .query(SourceId::Ahk, QueryShape::General, &query)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured(SourceId::Ahk)));
    }
}
