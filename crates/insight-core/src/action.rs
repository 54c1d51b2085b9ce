//! Remediation action record and its lifecycle transitions.
//!
//! Every mutation of [`RemediationAction::status`] goes through one of the
//! transition methods here, which consult [`ActionStatus::can_transition_to`]
//! before touching any field. The store (`db.rs`) applies them inside a single
//! write transaction so each call is a compare-and-set on `status`.

use crate::error::{InsightError, Result};
use crate::types::ActionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// NewAction
// ---------------------------------------------------------------------------

/// Input for proposing an action. Produced by the detection pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAction {
    pub finding_id: String,
    pub action_type: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

fn empty_params() -> serde_json::Value {
    serde_json::json!({})
}

// ---------------------------------------------------------------------------
// RemediationAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub id: String,
    pub finding_id: String,
    pub action_type: String,
    pub status: ActionStatus,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub proposed_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RemediationAction {
    /// Create a new action in `proposed` state with a fresh id.
    pub fn propose(new: NewAction) -> Result<Self> {
        if new.finding_id.trim().is_empty() {
            return Err(InsightError::InvalidInput(
                "finding_id must not be empty".to_string(),
            ));
        }
        if new.action_type.trim().is_empty() {
            return Err(InsightError::InvalidInput(
                "action_type must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            finding_id: new.finding_id,
            action_type: new.action_type,
            status: ActionStatus::Proposed,
            title: new.title,
            description: new.description,
            params: new.params,
            result: None,
            error_message: None,
            proposed_at: Utc::now(),
            approved_at: None,
            approved_by: None,
            executed_at: None,
            completed_at: None,
        })
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    pub fn can_transition_to(&self, target: ActionStatus) -> Result<()> {
        if self.status.can_transition_to(target) {
            return Ok(());
        }
        let reason = if self.status == target {
            format!("action is already {target}")
        } else if self.status.is_terminal() {
            format!("'{}' is a terminal state", self.status)
        } else {
            format!("only {} actions can become {target}", required_source(target))
        };
        Err(InsightError::InvalidTransition {
            from: self.status.to_string(),
            to: target.to_string(),
            reason,
        })
    }

    /// `proposed → approved`. Records who approved and when.
    pub fn approve(&mut self, approved_by: impl Into<String>) -> Result<()> {
        self.can_transition_to(ActionStatus::Approved)?;
        self.status = ActionStatus::Approved;
        self.approved_at = Some(Utc::now());
        self.approved_by = Some(approved_by.into());
        Ok(())
    }

    /// `proposed → rejected`. The reviewer lands in `approved_by`/`approved_at`;
    /// those fields record whoever moved the action out of `proposed`.
    pub fn reject(&mut self, rejected_by: impl Into<String>) -> Result<()> {
        self.can_transition_to(ActionStatus::Rejected)?;
        self.status = ActionStatus::Rejected;
        self.approved_at = Some(Utc::now());
        self.approved_by = Some(rejected_by.into());
        Ok(())
    }

    /// `approved → executing`.
    pub fn begin_execution(&mut self) -> Result<()> {
        self.can_transition_to(ActionStatus::Executing)?;
        self.status = ActionStatus::Executing;
        self.executed_at = Some(Utc::now());
        Ok(())
    }

    /// `executing → completed`.
    pub fn complete(&mut self, result: serde_json::Value) -> Result<()> {
        self.can_transition_to(ActionStatus::Completed)?;
        self.status = ActionStatus::Completed;
        self.result = Some(result);
        self.error_message = None;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `executing → failed`.
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<()> {
        self.can_transition_to(ActionStatus::Failed)?;
        self.status = ActionStatus::Failed;
        self.result = None;
        self.error_message = Some(error_message.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Invariants
    // -----------------------------------------------------------------------

    /// Check the field-level invariants that must hold in every status.
    ///
    /// Used when records enter the store from outside (imports) and by tests.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> {
            Err(InsightError::InvalidInput(format!("{}: {msg}", self.id)))
        };

        if self.finding_id.is_empty() {
            return invalid("finding_id is empty");
        }
        if self.result.is_some() != (self.status == ActionStatus::Completed) {
            return invalid("result must be present exactly when status is completed");
        }
        if self.error_message.is_some() != (self.status == ActionStatus::Failed) {
            return invalid("error_message must be present exactly when status is failed");
        }
        let reviewed = self.status != ActionStatus::Proposed;
        if reviewed != (self.approved_by.is_some() && self.approved_at.is_some()) {
            return invalid("approved_by/approved_at must be set exactly once the action leaves proposed");
        }
        Ok(())
    }
}

fn required_source(target: ActionStatus) -> &'static str {
    match target {
        ActionStatus::Approved | ActionStatus::Rejected => "proposed",
        ActionStatus::Executing => "approved",
        ActionStatus::Completed | ActionStatus::Failed => "executing",
        ActionStatus::Proposed => "new",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
