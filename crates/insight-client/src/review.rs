//! Operator review session.
//!
//! The session never computes a next status. A successful transition replaces
//! the cached record with the one the server returned; a failed one leaves the
//! cache exactly as it was. At most one transition request per action id is in
//! flight at a time; a second command for the same id returns
//! [`Outcome::Busy`] without touching the network. A refresh that was already
//! under way when a transition applied keeps the applied record.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use insight_core::{ActionStatus, RemediationAction};

use crate::api::ApiClient;
use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Approve,
    Reject,
}

/// What the result area of an action shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPanel {
    Success(serde_json::Value),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The server accepted the transition; this is its record.
    Applied(RemediationAction),
    /// A request for this id is already outstanding; nothing was sent.
    Busy,
}

#[derive(Debug, Clone, Copy)]
enum Verb {
    Approve,
    Reject,
}

#[derive(Debug, Default)]
struct SessionState {
    /// Server order (newest first) is preserved.
    actions: Vec<RemediationAction>,
    in_flight: HashSet<String>,
    /// Bumped on every applied transition.
    generation: u64,
    /// Generation at which each id was last replaced by a transition response.
    applied: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct ReviewSession {
    api: ApiClient,
    reviewer: String,
    state: Arc<Mutex<SessionState>>,
}

/// Releases the in-flight claim for `id` when dropped, so every exit path
/// (success, error, timeout, cancelled future) re-enables the controls.
struct InFlight {
    state: Arc<Mutex<SessionState>>,
    id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.state).in_flight.remove(&self.id);
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ReviewSession {
    /// `reviewer` is sent as `approved_by` on every transition.
    pub fn new(api: ApiClient, reviewer: impl Into<String>) -> Self {
        Self {
            api,
            reviewer: reviewer.into(),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn reviewer(&self) -> &str {
        &self.reviewer
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Re-fetch the full list and replace the cache. Records replaced by a
    /// transition after the fetch started are newer than the snapshot and are
    /// kept. Returns the action count.
    pub async fn refresh(&self) -> Result<usize> {
        let started = lock(&self.state).generation;
        let fetched = self.api.list_actions(None).await?;
        let count = fetched.len();

        let mut state = lock(&self.state);
        let merged: Vec<RemediationAction> = fetched
            .into_iter()
            .map(|fresh| {
                let applied_since = state
                    .applied
                    .get(&fresh.id)
                    .is_some_and(|&generation| generation > started);
                if applied_since {
                    if let Some(local) = state.actions.iter().find(|a| a.id == fresh.id) {
                        return local.clone();
                    }
                }
                fresh
            })
            .collect();
        state.actions = merged;
        state.applied.retain(|_, generation| *generation > started);
        tracing::debug!(count, "action list refreshed");
        Ok(count)
    }

    /// Snapshot of the cached actions.
    pub fn actions(&self) -> Vec<RemediationAction> {
        lock(&self.state).actions.clone()
    }

    pub fn get(&self, id: &str) -> Option<RemediationAction> {
        lock(&self.state)
            .actions
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        lock(&self.state).in_flight.contains(id)
    }

    /// Controls offered for `id`: approve and reject while `proposed` and no
    /// request is outstanding, nothing otherwise.
    pub fn controls(&self, id: &str) -> Vec<Control> {
        let state = lock(&self.state);
        let proposed = state
            .actions
            .iter()
            .any(|a| a.id == id && a.status == ActionStatus::Proposed);
        if proposed && !state.in_flight.contains(id) {
            vec![Control::Approve, Control::Reject]
        } else {
            Vec::new()
        }
    }

    pub fn panel(&self, id: &str) -> Option<ResultPanel> {
        let action = self.get(id)?;
        match action.status {
            ActionStatus::Completed => Some(ResultPanel::Success(
                action.result.unwrap_or(serde_json::Value::Null),
            )),
            ActionStatus::Failed => Some(ResultPanel::Error(
                action.error_message.unwrap_or_default(),
            )),
            _ => None,
        }
    }

    pub async fn approve(&self, id: &str) -> Result<Outcome> {
        self.review(id, Verb::Approve).await
    }

    pub async fn reject(&self, id: &str) -> Result<Outcome> {
        self.review(id, Verb::Reject).await
    }

    async fn review(&self, id: &str, verb: Verb) -> Result<Outcome> {
        let _claim = {
            let mut state = lock(&self.state);
            if !state.actions.iter().any(|a| a.id == id) {
                return Err(ClientError::UnknownAction(id.to_string()));
            }
            if !state.in_flight.insert(id.to_string()) {
                tracing::debug!(id, "transition already in flight");
                return Ok(Outcome::Busy);
            }
            InFlight {
                state: Arc::clone(&self.state),
                id: id.to_string(),
            }
        };

        let response = match verb {
            Verb::Approve => self.api.approve(id, &self.reviewer).await,
            Verb::Reject => self.api.reject(id, &self.reviewer).await,
        };

        match response {
            Ok(updated) => {
                let mut state = lock(&self.state);
                if let Some(slot) = state.actions.iter_mut().find(|a| a.id == id) {
                    *slot = updated.clone();
                }
                state.generation += 1;
                let generation = state.generation;
                state.applied.insert(id.to_string(), generation);
                tracing::info!(id, status = %updated.status, "transition applied");
                Ok(Outcome::Applied(updated))
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "transition failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn action(id: &str, status: ActionStatus) -> RemediationAction {
        let mut a = RemediationAction::propose(insight_core::NewAction {
            finding_id: "f1".into(),
            action_type: "scale_deployment".into(),
            title: "Scale web".into(),
            description: None,
            params: serde_json::json!({ "deployment": "web", "namespace": "default", "replicas": 3 }),
        })
        .unwrap();
        a.id = id.to_string();
        match status {
            ActionStatus::Proposed => {}
            ActionStatus::Completed => {
                a.approve("alice").unwrap();
                a.begin_execution().unwrap();
                a.complete(serde_json::json!({ "success": true })).unwrap();
            }
            ActionStatus::Failed => {
                a.approve("alice").unwrap();
                a.begin_execution().unwrap();
                a.fail("deployment not found").unwrap();
            }
            _ => a.approve("alice").unwrap(),
        }
        a
    }

    fn seeded(actions: Vec<RemediationAction>) -> ReviewSession {
        let api = ApiClient::with_base_url("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let session = ReviewSession::new(api, "alice");
        lock(&session.state).actions = actions;
        session
    }

    #[test]
    fn controls_only_for_proposed() {
        let s = seeded(vec![
            action("p", ActionStatus::Proposed),
            action("a", ActionStatus::Approved),
        ]);
        assert_eq!(s.controls("p"), vec![Control::Approve, Control::Reject]);
        assert!(s.controls("a").is_empty());
        assert!(s.controls("missing").is_empty());
    }

    #[test]
    fn controls_hidden_while_in_flight() {
        let s = seeded(vec![action("p", ActionStatus::Proposed)]);
        lock(&s.state).in_flight.insert("p".into());
        assert!(s.controls("p").is_empty());
    }

    #[test]
    fn panel_by_status() {
        let s = seeded(vec![
            action("ok", ActionStatus::Completed),
            action("bad", ActionStatus::Failed),
            action("p", ActionStatus::Proposed),
        ]);
        assert_eq!(
            s.panel("ok"),
            Some(ResultPanel::Success(serde_json::json!({ "success": true })))
        );
        assert_eq!(
            s.panel("bad"),
            Some(ResultPanel::Error("deployment not found".into()))
        );
        assert_eq!(s.panel("p"), None);
    }

    #[tokio::test]
    async fn unknown_id_is_rejected_locally() {
        let s = seeded(Vec::new());
        let err = s.approve("nope").await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownAction(_)));
        assert!(!s.is_in_flight("nope"));
    }

    #[tokio::test]
    async fn network_failure_keeps_record_and_releases_guard() {
        let s = seeded(vec![action("p", ActionStatus::Proposed)]);
        let before = s.get("p").unwrap();
        let err = s.approve("p").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(s.get("p").unwrap(), before);
        assert!(!s.is_in_flight("p"));
        assert_eq!(s.controls("p").len(), 2);
    }
}
