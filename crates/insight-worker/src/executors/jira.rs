//! `close_jira_tickets`: move each issue through its done/closed transition.
//!
//! Params: `{ "issue_keys": ["OPS-1", ...] }`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::BatchReport;
use crate::error::{ExecutorError, Result};

/// Transition names accepted as "closing" the issue, compared lowercase.
const CLOSING_TRANSITIONS: &[&str] = &["done", "closed", "close"];

#[derive(Debug, Clone)]
pub struct JiraClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
    email: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CloseParams {
    #[serde(default)]
    issue_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TransitionList {
    transitions: Vec<Transition>,
}

#[derive(Debug, Deserialize)]
struct Transition {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
pub struct IssueOutcome {
    pub issue_key: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JiraClient {
    pub fn new(
        base_url: &str,
        email: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = reqwest::Url::parse(base_url)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| ExecutorError::NotConfigured(format!("jira base url {base_url:?}")))?;
        Ok(Self {
            http,
            base_url,
            email: email.to_string(),
            token: token.into(),
        })
    }

    /// Close every issue in `params.issue_keys`. Per-issue failures land in
    /// the report; only malformed params fail the whole action.
    pub async fn close_tickets(&self, params: &serde_json::Value) -> Result<serde_json::Value> {
        let params: CloseParams = serde_json::from_value(params.clone())
            .map_err(|e| ExecutorError::params("close_jira_tickets", e))?;

        let mut details = Vec::with_capacity(params.issue_keys.len());
        for key in params.issue_keys {
            let outcome = match self.close_one(&key).await {
                Ok(transition) => IssueOutcome {
                    issue_key: key,
                    success: true,
                    transition: Some(transition),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(issue = %key, error = %e, "could not close issue");
                    IssueOutcome {
                        issue_key: key,
                        success: false,
                        transition: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            details.push(outcome);
        }
        BatchReport::new(details, |d| d.success).into_value()
    }

    /// Returns the name of the transition that was applied.
    async fn close_one(&self, key: &str) -> Result<String> {
        let url = self.transitions_url(key);

        let resp = self
            .http
            .get(url.clone())
            .basic_auth(&self.email, Some(&self.token))
            .send()
            .await?;
        let list: TransitionList = check(resp).await?.json().await?;

        let done = list
            .transitions
            .into_iter()
            .find(|t| CLOSING_TRANSITIONS.contains(&t.name.to_lowercase().as_str()))
            .ok_or_else(|| ExecutorError::NoClosingTransition(key.to_string()))?;

        let resp = self
            .http
            .post(url)
            .basic_auth(&self.email, Some(&self.token))
            .json(&serde_json::json!({ "transition": { "id": done.id } }))
            .send()
            .await?;
        check(resp).await?;
        Ok(done.name)
    }

    /// `{base}/rest/api/3/issue/{key}/transitions` with `key` encoded as a
    /// single path segment.
    fn transitions_url(&self, key: &str) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["rest", "api", "3", "issue", key, "transitions"]);
        }
        url
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    Err(ExecutorError::Jira {
        status: resp.status().as_u16(),
        body: resp.text().await.unwrap_or_default(),
    })
}
