use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a remediation action.
///
/// ```text
/// proposed ──▶ approved ──▶ executing ──▶ completed
///     │                          └──────▶ failed
///     └──────▶ rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Proposed,
    Approved,
    Executing,
    Completed,
    Failed,
    Rejected,
}

impl ActionStatus {
    pub fn all() -> &'static [ActionStatus] {
        &[
            ActionStatus::Proposed,
            ActionStatus::Approved,
            ActionStatus::Executing,
            ActionStatus::Completed,
            ActionStatus::Failed,
            ActionStatus::Rejected,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Proposed => "proposed",
            ActionStatus::Approved => "approved",
            ActionStatus::Executing => "executing",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
            ActionStatus::Rejected => "rejected",
        }
    }

    /// No edge leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionStatus::Completed | ActionStatus::Failed | ActionStatus::Rejected
        )
    }

    /// The only edges of the lifecycle graph. Every mutation checks this first.
    pub fn can_transition_to(self, target: ActionStatus) -> bool {
        matches!(
            (self, target),
            (ActionStatus::Proposed, ActionStatus::Approved)
                | (ActionStatus::Proposed, ActionStatus::Rejected)
                | (ActionStatus::Approved, ActionStatus::Executing)
                | (ActionStatus::Executing, ActionStatus::Completed)
                | (ActionStatus::Executing, ActionStatus::Failed)
        )
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = crate::error::InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proposed" => Ok(ActionStatus::Proposed),
            "approved" => Ok(ActionStatus::Approved),
            "executing" => Ok(ActionStatus::Executing),
            "completed" => Ok(ActionStatus::Completed),
            "failed" => Ok(ActionStatus::Failed),
            "rejected" => Ok(ActionStatus::Rejected),
            _ => Err(crate::error::InsightError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Highest-urgency severity level. Findings carry `0..=MAX_SEVERITY`.
pub const MAX_SEVERITY: u8 = 3;

/// Bucket label for a severity level (`0` → `"p0"`).
pub fn severity_label(severity: u8) -> String {
    format!("p{severity}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
