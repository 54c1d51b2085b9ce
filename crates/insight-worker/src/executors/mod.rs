pub mod jira;
pub mod kubernetes;

use std::str::FromStr;
use std::time::Duration;

use insight_core::config::{Config, KubernetesConfig};
use insight_core::RemediationAction;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::error::{ExecutorError, Result};
use jira::JiraClient;

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// Action types the worker knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    CloseJiraTickets,
    RestartPods,
    ScaleDeployment,
}

impl ActionKind {
    pub fn all() -> &'static [ActionKind] {
        &[
            ActionKind::CloseJiraTickets,
            ActionKind::RestartPods,
            ActionKind::ScaleDeployment,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::CloseJiraTickets => "close_jira_tickets",
            ActionKind::RestartPods => "restart_pods",
            ActionKind::ScaleDeployment => "scale_deployment",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self> {
        ActionKind::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ExecutorError::UnknownActionType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Batch results
// ---------------------------------------------------------------------------

/// Result shape for executors that act on several targets. A per-target
/// failure is reported in `details`; it does not fail the action.
#[derive(Debug, Serialize)]
pub struct BatchReport<T> {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub details: Vec<T>,
}

impl<T: Serialize> BatchReport<T> {
    pub fn new(details: Vec<T>, is_success: impl Fn(&T) -> bool) -> Self {
        let succeeded = details.iter().filter(|d| is_success(d)).count();
        Self {
            total: details.len(),
            succeeded,
            failed: details.len() - succeeded,
            details,
        }
    }

    pub fn into_value(self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// ---------------------------------------------------------------------------
// Executors
// ---------------------------------------------------------------------------

/// Everything needed to run any [`ActionKind`]. The Kubernetes client is
/// connected on first use and reused afterwards.
pub struct Executors {
    jira: Option<JiraClient>,
    kubernetes: KubernetesConfig,
    kube_client: OnceCell<kube::Client>,
}

impl Executors {
    /// Build from config. The Jira token is read from the environment variable
    /// named by `jira.api_token_env`; a configured Jira without a token is an
    /// error rather than a client that gets 401 on every issue.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let jira = match (&cfg.jira.base_url, &cfg.jira.email) {
            (Some(base_url), Some(email)) => {
                let token = std::env::var(&cfg.jira.api_token_env)
                    .ok()
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        ExecutorError::NotConfigured(format!(
                            "jira api token (${})",
                            cfg.jira.api_token_env
                        ))
                    })?;
                Some(JiraClient::new(
                    base_url,
                    email,
                    token,
                    Duration::from_secs(cfg.api.request_timeout_secs),
                )?)
            }
            _ => None,
        };
        Ok(Self {
            jira,
            kubernetes: cfg.kubernetes.clone(),
            kube_client: OnceCell::new(),
        })
    }

    pub fn with_jira(mut self, jira: JiraClient) -> Self {
        self.jira = Some(jira);
        self
    }

    /// No Jira client and default Kubernetes settings.
    pub fn unconfigured() -> Self {
        Self {
            jira: None,
            kubernetes: KubernetesConfig::default(),
            kube_client: OnceCell::new(),
        }
    }

    /// Run `action` and return the JSON stored as its `result`.
    pub async fn execute(&self, action: &RemediationAction) -> Result<serde_json::Value> {
        let kind: ActionKind = action.action_type.parse()?;
        match kind {
            ActionKind::CloseJiraTickets => {
                let jira = self
                    .jira
                    .as_ref()
                    .ok_or_else(|| ExecutorError::NotConfigured("jira".to_string()))?;
                jira.close_tickets(&action.params).await
            }
            ActionKind::RestartPods => {
                let targets = kubernetes::parse_restart(&action.params)?;
                kubernetes::restart_pods(self.kube().await?, targets).await
            }
            ActionKind::ScaleDeployment => {
                let target = kubernetes::parse_scale(&action.params)?;
                kubernetes::scale_deployment(self.kube().await?, target).await
            }
        }
    }

    async fn kube(&self) -> Result<&kube::Client> {
        self.kube_client
            .get_or_try_init(|| kubernetes::connect(&self.kubernetes))
            .await
    }
}
