use std::time::Duration;

use insight_core::config::{ApiConfig, ExecutionContext};
use insight_core::finding::{DailyTrend, Finding, FindingSummary, WeeklyReport};
use insight_core::{ActionStatus, RemediationAction};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ClientError, Result};

/// Typed client for the insight HTTP API.
///
/// Every request carries `Cache-Control: no-cache` and is bounded by the
/// configured timeout. Responses are always decoded from the server; nothing
/// here derives state locally.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: reqwest::Url,
}

/// Error body shape produced by the server.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    current_status: Option<String>,
}

impl ApiClient {
    /// Build a client for the base URL that `ctx` should use.
    pub fn new(config: &ApiConfig, ctx: ExecutionContext) -> Result<Self> {
        Self::with_base_url(
            config.base_url(ctx),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let http = reqwest::Client::builder()
            .user_agent(concat!("insight/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        let base_url = base_url.into();
        let base = reqwest::Url::parse(&base_url)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url));
        }
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Base URL extended by `segments`, each percent-encoded as one path
    /// segment so ids cannot alter the route.
    fn endpoint(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// `GET /actions/`, optionally filtered by status.
    pub async fn list_actions(
        &self,
        status: Option<ActionStatus>,
    ) -> Result<Vec<RemediationAction>> {
        let mut url = self.endpoint(&["actions", ""]);
        if let Some(s) = status {
            url.query_pairs_mut().append_pair("status", s.as_str());
        }
        let resp = self.http.get(url).send().await?;
        decode(resp, None).await
    }

    pub async fn get_action(&self, id: &str) -> Result<RemediationAction> {
        let resp = self
            .http
            .get(self.endpoint(&["actions", id]))
            .send()
            .await?;
        decode(resp, Some(id)).await
    }

    /// `POST /actions/{id}/approve`. Returns the server's updated record.
    pub async fn approve(&self, id: &str, approved_by: &str) -> Result<RemediationAction> {
        self.transition(id, "approve", approved_by).await
    }

    /// `POST /actions/{id}/reject`. Returns the server's updated record.
    pub async fn reject(&self, id: &str, approved_by: &str) -> Result<RemediationAction> {
        self.transition(id, "reject", approved_by).await
    }

    async fn transition(&self, id: &str, verb: &str, approved_by: &str) -> Result<RemediationAction> {
        let resp = self
            .http
            .post(self.endpoint(&["actions", id, verb]))
            .json(&serde_json::json!({ "approved_by": approved_by }))
            .send()
            .await?;
        decode(resp, Some(id)).await
    }

    // -----------------------------------------------------------------------
    // Findings and reports
    // -----------------------------------------------------------------------

    pub async fn list_findings(&self, limit: usize) -> Result<Vec<FindingSummary>> {
        let mut url = self.endpoint(&["findings"]);
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        let resp = self.http.get(url).send().await?;
        decode(resp, None).await
    }

    pub async fn get_finding(&self, id: &str) -> Result<Finding> {
        let resp = self
            .http
            .get(self.endpoint(&["findings", id]))
            .send()
            .await?;
        decode(resp, Some(id)).await
    }

    pub async fn daily_trends(&self, days: u32) -> Result<Vec<DailyTrend>> {
        let mut url = self.endpoint(&["findings", "trends", "daily"]);
        url.query_pairs_mut().append_pair("days", &days.to_string());
        let resp = self.http.get(url).send().await?;
        decode(resp, None).await
    }

    pub async fn weekly_report(&self) -> Result<WeeklyReport> {
        let resp = self.http.get(self.endpoint(&["reports", "weekly"])).send().await?;
        decode(resp, None).await
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        let resp = self.http.get(self.endpoint(&["health"])).send().await?;
        decode(resp, None).await
    }
}

/// Map a response to `T` or a typed error. `id` is the resource the request
/// addressed, used to tag not-found and conflict errors.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response, id: Option<&str>) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        let bytes = resp.bytes().await?;
        return serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()));
    }

    let body = resp.text().await.unwrap_or_default();
    let parsed: Option<ErrorBody> = serde_json::from_str(&body).ok();

    if let (Some(id), Some(err)) = (id, parsed.as_ref()) {
        if err.kind.as_deref() == Some("invalid_transition") {
            if let Some(current) = err
                .current_status
                .as_deref()
                .and_then(|s| s.parse::<ActionStatus>().ok())
            {
                return Err(ClientError::InvalidTransition {
                    id: id.to_string(),
                    current_status: current,
                });
            }
        }
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return Err(ClientError::NotFound(id.to_string()));
        }
    }
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action_json(id: &str, status: &str) -> String {
        serde_json::json!({
            "id": id,
            "finding_id": "f1",
            "action_type": "restart_pods",
            "status": status,
            "title": "Restart pods",
            "description": null,
            "params": {},
            "result": null,
            "error_message": null,
            "proposed_at": "2026-01-05T10:00:00Z",
            "approved_at": "2026-01-05T10:05:00Z",
            "approved_by": "alice",
            "executed_at": null,
            "completed_at": null,
        })
        .to_string()
    }

    #[test]
    fn base_url_is_chosen_by_context() {
        let cfg = ApiConfig::default();
        let server = ApiClient::new(&cfg, ExecutionContext::Server).unwrap();
        let client = ApiClient::new(&cfg, ExecutionContext::Client).unwrap();
        assert_eq!(server.base_url(), "http://api:8000");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let c = ApiClient::with_base_url("http://x:1/", Duration::from_secs(1)).unwrap();
        assert_eq!(c.base_url(), "http://x:1");
        assert_eq!(c.endpoint(&["actions", ""]).as_str(), "http://x:1/actions/");
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let c = ApiClient::with_base_url("https://x/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            c.endpoint(&["actions", "a1", "approve"]).as_str(),
            "https://x/api/actions/a1/approve"
        );
    }

    #[test]
    fn ids_are_encoded_as_one_segment() {
        let c = ApiClient::with_base_url("http://x:1", Duration::from_secs(1)).unwrap();
        assert_eq!(
            c.endpoint(&["actions", "../health?x#y", "approve"]).as_str(),
            "http://x:1/actions/..%2Fhealth%3Fx%23y/approve"
        );
    }

    #[test]
    fn unusable_base_url_is_rejected() {
        let err = ApiClient::with_base_url("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidBaseUrl(_)));
    }

    #[tokio::test]
    async fn id_with_slash_stays_on_action_route() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/actions/a%2Fb")
            .with_status(200)
            .with_body(action_json("a/b", "proposed"))
            .create_async()
            .await;

        let client = ApiClient::with_base_url(server.url(), Duration::from_secs(5)).unwrap();
        let action = client.get_action("a/b").await.unwrap();
        assert_eq!(action.id, "a/b");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn approve_posts_reviewer_with_no_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/actions/a1/approve")
            .match_header("cache-control", "no-cache")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({ "approved_by": "alice" }),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(action_json("a1", "approved"))
            .create_async()
            .await;

        let client = ApiClient::with_base_url(server.url(), Duration::from_secs(5)).unwrap();
        let action = client.approve("a1", "alice").await.unwrap();
        assert_eq!(action.status, ActionStatus::Approved);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn conflict_body_becomes_invalid_transition() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/actions/a1/reject")
            .with_status(409)
            .with_body(
                serde_json::json!({
                    "error": "invalid transition",
                    "kind": "invalid_transition",
                    "current_status": "approved",
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::with_base_url(server.url(), Duration::from_secs(5)).unwrap();
        let err = client.reject("a1", "bob").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidTransition { ref id, current_status: ActionStatus::Approved } if id == "a1"
        ));
    }

    #[tokio::test]
    async fn missing_action_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/actions/zz")
            .with_status(404)
            .with_body(r#"{"error":"action not found: zz","kind":"not_found"}"#)
            .create_async()
            .await;

        let client = ApiClient::with_base_url(server.url(), Duration::from_secs(5)).unwrap();
        let err = client.get_action("zz").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(ref id) if id == "zz"));
    }

    #[tokio::test]
    async fn server_error_is_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/actions/")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = ApiClient::with_base_url(server.url(), Duration::from_secs(5)).unwrap();
        let err = client.list_actions(None).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 500, ref body } if body == "boom"));
    }

    #[tokio::test]
    async fn garbage_success_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/actions/")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = ApiClient::with_base_url(server.url(), Duration::from_secs(5)).unwrap();
        let err = client.list_actions(None).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn status_filter_goes_in_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/actions/")
            .match_query(mockito::Matcher::UrlEncoded(
                "status".into(),
                "proposed".into(),
            ))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::with_base_url(server.url(), Duration::from_secs(5)).unwrap();
        let actions = client
            .list_actions(Some(ActionStatus::Proposed))
            .await
            .unwrap();
        assert!(actions.is_empty());
        mock.assert_async().await;
    }
}
