//! HTTP client for the record backend.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::RecordStoreError;
use crate::models::{ParentUpdate, SearchRequest, SearchResponse};

/// Read/write access to the record backend.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Run an AQL search.
    async fn search(&self, aql: &str) -> Result<SearchResponse, RecordStoreError>;

    /// Apply a partial attribute update to a parent record.
    ///
    /// Returns the backend's response body.
    async fn update_parent(&self, update: &ParentUpdate) -> Result<String, RecordStoreError>;
}

/// reqwest-backed [`RecordStore`].
#[derive(Debug, Clone)]
pub struct RecordsClient {
    client: reqwest::Client,
    base_url: Url,
}

impl RecordsClient {
    /// Create a client for `base_url` authenticating with `access_token`.
    ///
    /// # Errors
    /// Returns error if headers cannot be constructed
    pub fn new(base_url: &str, access_token: &str) -> Result<Self> {
        Self::build(base_url, access_token, reqwest::Client::builder())
    }

    /// Create a client from service configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::build(
            &config.endpoint_domain,
            &config.access_token,
            reqwest::Client::builder().timeout(config.request_timeout),
        )
    }

    fn build(base_url: &str, access_token: &str, builder: reqwest::ClientBuilder) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid endpoint domain: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("Endpoint domain cannot be used as a base URL: {base_url}");
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .context("Invalid access token")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = builder
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Base URL extended with path segments; segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Read the body of a response, turning non-2xx into an error.
    async fn checked_body(response: reqwest::Response) -> Result<String, RecordStoreError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RecordStoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl RecordStore for RecordsClient {
    #[instrument(skip(self))]
    async fn search(&self, aql: &str) -> Result<SearchResponse, RecordStoreError> {
        let response = self
            .client
            .post(self.endpoint(&["records", "search"]))
            .json(&SearchRequest {
                aql: aql.to_string(),
            })
            .send()
            .await?;

        let body = Self::checked_body(response).await?;
        let parsed: SearchResponse = serde_json::from_str(&body)?;
        debug!(records = parsed.records().len(), "Search completed");
        Ok(parsed)
    }

    #[instrument(skip(self, update), fields(parent_id = %update.parent_id()))]
    async fn update_parent(&self, update: &ParentUpdate) -> Result<String, RecordStoreError> {
        let response = self
            .client
            .patch(self.endpoint(&["records", update.parent_id().as_str()]))
            .json(update)
            .send()
            .await?;

        Self::checked_body(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DueDates, ParentId};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_sends_aql_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/records/search"))
            .and(header("authorization", "Bearer token-1"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({ "aql": "select id from __main__" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": 1, "attributes": { "cf_next_pm_due_date": "2024-05-01" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RecordsClient::new(&format!("{}/", server.uri()), "token-1").unwrap();
        let response = client.search("select id from __main__").await.unwrap();

        assert_eq!(response.records().len(), 1);
        assert_eq!(
            response.records()[0].attribute_str("cf_next_pm_due_date"),
            Some("2024-05-01")
        );
    }

    #[tokio::test]
    async fn test_search_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/records/search"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = RecordsClient::new(&server.uri(), "token-1").unwrap();
        let err = client.search("select id from __main__").await.unwrap_err();

        assert_eq!(err.status(), Some(403));
        assert_eq!(err.body(), Some("forbidden"));
    }

    #[tokio::test]
    async fn test_search_undecodable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/records/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = RecordsClient::new(&server.uri(), "token-1").unwrap();
        let err = client.search("select id from __main__").await.unwrap_err();
        assert!(matches!(err, RecordStoreError::Decode(_)));
    }

    #[tokio::test]
    async fn test_update_patches_record() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/records/42"))
            .and(header("authorization", "Bearer token-1"))
            .and(body_json(json!({
                "data": {
                    "type": "records",
                    "id": "42",
                    "attributes": { "cf_next_calibration_due": "2024-06-01" }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = RecordsClient::new(&server.uri(), "token-1").unwrap();
        let update = ParentUpdate::sparse(
            &ParentId::new("42"),
            &DueDates {
                calibration: Some("2024-06-01".to_string()),
                ..DueDates::default()
            },
        );

        let body = client.update_parent(&update).await.unwrap();
        assert_eq!(body, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_base_path_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/records/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RecordsClient::new(&format!("{}/api/v1/", server.uri()), "t").unwrap();
        let response = client.search("select id from __main__").await.unwrap();
        assert!(response.records().is_empty());
    }

    #[test]
    fn test_identifier_is_a_single_path_segment() {
        let client = RecordsClient::new("https://records.example.com/api", "t").unwrap();
        let url = client.endpoint(&["records", "a/b c"]);
        assert_eq!(url.as_str(), "https://records.example.com/api/records/a%2Fb%20c");
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        assert!(RecordsClient::new("not a url", "t").is_err());
        assert!(RecordsClient::new("mailto:ops@example.com", "t").is_err());
    }

    #[tokio::test]
    async fn test_update_failure_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/records/42"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid attribute"))
            .mount(&server)
            .await;

        let client = RecordsClient::new(&server.uri(), "token-1").unwrap();
        let update = ParentUpdate::sparse(&ParentId::new("42"), &DueDates::default());
        let err = client.update_parent(&update).await.unwrap_err();

        assert_eq!(err.status(), Some(422));
        assert_eq!(err.body(), Some("invalid attribute"));
    }
}
