//! Authoritative store for remediation actions and findings, backed by redb.
//!
//! # Table design
//!
//! ```text
//! actions   id (str) -> JSON-encoded RemediationAction
//! findings  id (str) -> JSON-encoded Finding
//! ```
//!
//! Every status change runs read → check → write inside one write
//! transaction. redb admits a single writer at a time, so two transitions on
//! the same id serialize and the second one observes the first one's result:
//! exactly one of two racing Approve/Reject calls succeeds.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};

use crate::action::{NewAction, RemediationAction};
use crate::error::{InsightError, Result};
use crate::finding::{Finding, FindingInput};
use crate::types::ActionStatus;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const ACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("actions");
const FINDINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("findings");

/// Message recorded on actions recovered by [`InsightDb::recover_stale`].
pub const RECOVERED_MESSAGE: &str = "recovered: execution did not finish";

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub status: Option<ActionStatus>,
    pub finding_id: Option<String>,
}

impl ActionFilter {
    fn matches(&self, action: &RemediationAction) -> bool {
        self.status.map_or(true, |s| s == action.status)
            && self
                .finding_id
                .as_deref()
                .map_or(true, |f| f == action.finding_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
}

// ---------------------------------------------------------------------------
// InsightDb
// ---------------------------------------------------------------------------

pub struct InsightDb {
    db: Database,
}

impl InsightDb {
    /// Open or create the database at `path`, creating both tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(InsightError::db)?;
        let wt = db.begin_write().map_err(InsightError::db)?;
        wt.open_table(ACTIONS).map_err(InsightError::db)?;
        wt.open_table(FINDINGS).map_err(InsightError::db)?;
        wt.commit().map_err(InsightError::db)?;
        Ok(Self { db })
    }

    // -----------------------------------------------------------------------
    // Actions: writes
    // -----------------------------------------------------------------------

    /// Create a `proposed` action from detector output.
    pub fn propose(&self, new: NewAction) -> Result<RemediationAction> {
        let action = RemediationAction::propose(new)?;
        self.insert_action(&action)?;
        Ok(action)
    }

    /// Insert a fully-formed action. Fails if the id is taken or the record
    /// violates a field invariant.
    pub fn insert_action(&self, action: &RemediationAction) -> Result<()> {
        action.validate()?;
        let value = serde_json::to_vec(action)?;
        let wt = self.db.begin_write().map_err(InsightError::db)?;
        {
            let mut table = wt.open_table(ACTIONS).map_err(InsightError::db)?;
            let exists = table
                .get(action.id.as_str())
                .map_err(InsightError::db)?
                .is_some();
            if exists {
                return Err(InsightError::ActionExists(action.id.clone()));
            }
            table
                .insert(action.id.as_str(), value.as_slice())
                .map_err(InsightError::db)?;
        }
        wt.commit().map_err(InsightError::db)?;
        Ok(())
    }

    pub fn approve(&self, id: &str, approved_by: &str) -> Result<RemediationAction> {
        self.update_action(id, |a| a.approve(approved_by))
    }

    pub fn reject(&self, id: &str, rejected_by: &str) -> Result<RemediationAction> {
        self.update_action(id, |a| a.reject(rejected_by))
    }

    /// Claim an approved action for execution.
    pub fn begin_execution(&self, id: &str) -> Result<RemediationAction> {
        self.update_action(id, RemediationAction::begin_execution)
    }

    pub fn complete(&self, id: &str, result: serde_json::Value) -> Result<RemediationAction> {
        self.update_action(id, |a| a.complete(result))
    }

    pub fn fail(&self, id: &str, error_message: &str) -> Result<RemediationAction> {
        self.update_action(id, |a| a.fail(error_message))
    }

    /// Mark every `executing` action whose `executed_at` is older than
    /// `max_age` as `failed`. Returns the number of actions recovered.
    pub fn recover_stale(&self, max_age: Duration) -> Result<u32> {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).map_err(InsightError::db)?;

        let wt = self.db.begin_write().map_err(InsightError::db)?;
        let mut count = 0u32;
        {
            let mut table = wt.open_table(ACTIONS).map_err(InsightError::db)?;
            let mut stale = Vec::new();
            for entry in table.iter().map_err(InsightError::db)? {
                let (_, v) = entry.map_err(InsightError::db)?;
                let action: RemediationAction = serde_json::from_slice(v.value())?;
                let expired = action.executed_at.map_or(true, |at| at < cutoff);
                if action.status == ActionStatus::Executing && expired {
                    stale.push(action);
                }
            }
            for mut action in stale {
                action.fail(RECOVERED_MESSAGE)?;
                let value = serde_json::to_vec(&action)?;
                table
                    .insert(action.id.as_str(), value.as_slice())
                    .map_err(InsightError::db)?;
                count += 1;
            }
        }
        wt.commit().map_err(InsightError::db)?;
        Ok(count)
    }

    /// Compare-and-set: load `id`, apply `transition`, write back, all in one
    /// write transaction. A failed transition aborts without writing.
    fn update_action<F>(&self, id: &str, transition: F) -> Result<RemediationAction>
    where
        F: FnOnce(&mut RemediationAction) -> Result<()>,
    {
        let wt = self.db.begin_write().map_err(InsightError::db)?;
        let updated = {
            let mut table = wt.open_table(ACTIONS).map_err(InsightError::db)?;
            let raw = table
                .get(id)
                .map_err(InsightError::db)?
                .map(|guard| guard.value().to_vec())
                .ok_or_else(|| InsightError::ActionNotFound(id.to_string()))?;
            let mut action: RemediationAction = serde_json::from_slice(&raw)?;
            transition(&mut action)?;
            let value = serde_json::to_vec(&action)?;
            table
                .insert(id, value.as_slice())
                .map_err(InsightError::db)?;
            action
        };
        wt.commit().map_err(InsightError::db)?;
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Actions: reads
    // -----------------------------------------------------------------------

    pub fn get_action(&self, id: &str) -> Result<RemediationAction> {
        let rt = self.db.begin_read().map_err(InsightError::db)?;
        let table = rt.open_table(ACTIONS).map_err(InsightError::db)?;
        let guard = table
            .get(id)
            .map_err(InsightError::db)?
            .ok_or_else(|| InsightError::ActionNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(guard.value())?)
    }

    /// List actions matching `filter`, newest proposal first.
    pub fn list_actions(&self, filter: &ActionFilter) -> Result<Vec<RemediationAction>> {
        let rt = self.db.begin_read().map_err(InsightError::db)?;
        let table = rt.open_table(ACTIONS).map_err(InsightError::db)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(InsightError::db)? {
            let (_, v) = entry.map_err(InsightError::db)?;
            let action: RemediationAction = serde_json::from_slice(v.value())?;
            if filter.matches(&action) {
                result.push(action);
            }
        }
        result.sort_by(|a, b| b.proposed_at.cmp(&a.proposed_at));
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Findings
    // -----------------------------------------------------------------------

    /// Insert or refresh findings, deduplicated on `(type, fingerprint)`.
    pub fn import_findings(&self, inputs: Vec<FindingInput>) -> Result<ImportSummary> {
        for input in &inputs {
            input.validate()?;
        }

        let wt = self.db.begin_write().map_err(InsightError::db)?;
        let mut summary = ImportSummary::default();
        {
            let mut table = wt.open_table(FINDINGS).map_err(InsightError::db)?;
            let mut existing = Vec::new();
            for entry in table.iter().map_err(InsightError::db)? {
                let (_, v) = entry.map_err(InsightError::db)?;
                existing.push(serde_json::from_slice::<Finding>(v.value())?);
            }

            for input in inputs {
                let key = (input.finding_type.as_str(), input.fingerprint.as_str());
                let finding = match existing.iter_mut().find(|f| f.dedup_key() == key) {
                    Some(found) => {
                        found.refresh(input)?;
                        summary.updated += 1;
                        found.clone()
                    }
                    None => {
                        let created = Finding::create(input)?;
                        existing.push(created.clone());
                        summary.created += 1;
                        created
                    }
                };
                let value = serde_json::to_vec(&finding)?;
                table
                    .insert(finding.id.as_str(), value.as_slice())
                    .map_err(InsightError::db)?;
            }
        }
        wt.commit().map_err(InsightError::db)?;
        Ok(summary)
    }

    pub fn get_finding(&self, id: &str) -> Result<Finding> {
        let rt = self.db.begin_read().map_err(InsightError::db)?;
        let table = rt.open_table(FINDINGS).map_err(InsightError::db)?;
        let guard = table
            .get(id)
            .map_err(InsightError::db)?
            .ok_or_else(|| InsightError::FindingNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(guard.value())?)
    }

    /// All findings, newest first.
    pub fn list_findings(&self) -> Result<Vec<Finding>> {
        let rt = self.db.begin_read().map_err(InsightError::db)?;
        let table = rt.open_table(FINDINGS).map_err(InsightError::db)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(InsightError::db)? {
            let (_, v) = entry.map_err(InsightError::db)?;
            result.push(serde_json::from_slice::<Finding>(v.value())?);
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, InsightDb) {
        let dir = TempDir::new().unwrap();
        let db = InsightDb::open(&dir.path().join("insight.db")).unwrap();
        (dir, db)
    }

    fn new_action(finding: &str) -> NewAction {
        NewAction {
            finding_id: finding.to_string(),
            action_type: "restart_pods".to_string(),
            title: "Restart pods".to_string(),
            description: Some("crashloop detected".to_string()),
            params: serde_json::json!({ "pods": [] }),
        }
    }

    fn finding_input(fingerprint: &str, severity: u8) -> FindingInput {
        FindingInput {
            finding_type: "backlog_aging".to_string(),
            fingerprint: fingerprint.to_string(),
            severity,
            confidence: 90,
            service_id: None,
            title: format!("Backlog {fingerprint}"),
            summary: None,
            evidence: serde_json::json!({}),
            remediation: serde_json::json!({}),
        }
    }

    #[test]
    fn propose_and_get() {
        let (_dir, db) = open_tmp();
        let a = db.propose(new_action("f1")).unwrap();
        let loaded = db.get_action(&a.id).unwrap();
        assert_eq!(loaded, a);
    }

    #[test]
    fn get_missing_action_is_not_found() {
        let (_dir, db) = open_tmp();
        let err = db.get_action("nope").unwrap_err();
        assert!(matches!(err, InsightError::ActionNotFound(_)));
    }

    #[test]
    fn insert_duplicate_id_fails() {
        let (_dir, db) = open_tmp();
        let a = db.propose(new_action("f1")).unwrap();
        let err = db.insert_action(&a).unwrap_err();
        assert!(matches!(err, InsightError::ActionExists(_)));
    }

    #[test]
    fn approve_persists_authoritative_record() {
        let (_dir, db) = open_tmp();
        let a = db.propose(new_action("f1")).unwrap();
        let approved = db.approve(&a.id, "alice").unwrap();
        assert_eq!(approved.status, ActionStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("alice"));
        assert_eq!(db.get_action(&a.id).unwrap(), approved);
    }

    #[test]
    fn second_transition_fails_and_leaves_record_untouched() {
        let (_dir, db) = open_tmp();
        let a = db.propose(new_action("f1")).unwrap();
        let approved = db.approve(&a.id, "alice").unwrap();

        let err = db.reject(&a.id, "bob").unwrap_err();
        assert!(matches!(err, InsightError::InvalidTransition { .. }));
        let err = db.approve(&a.id, "bob").unwrap_err();
        assert!(matches!(err, InsightError::InvalidTransition { .. }));

        assert_eq!(db.get_action(&a.id).unwrap(), approved);
    }

    #[test]
    fn transition_on_missing_action_is_not_found() {
        let (_dir, db) = open_tmp();
        let err = db.approve("ghost", "alice").unwrap_err();
        assert!(matches!(err, InsightError::ActionNotFound(_)));
    }

    #[test]
    fn concurrent_reviews_admit_exactly_one_winner() {
        let (_dir, db) = open_tmp();
        let db = Arc::new(db);
        let a = db.propose(new_action("f1")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = Arc::clone(&db);
                let id = a.id.clone();
                std::thread::spawn(move || {
                    let who = format!("reviewer-{i}");
                    if i % 2 == 0 {
                        db.approve(&id, &who)
                    } else {
                        db.reject(&id, &who)
                    }
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, InsightError::InvalidTransition { .. })));

        let stored = db.get_action(&a.id).unwrap();
        let winner = results.into_iter().find_map(|r| r.ok()).unwrap();
        assert_eq!(stored, winner);
    }

    #[test]
    fn execution_lifecycle() {
        let (_dir, db) = open_tmp();
        let a = db.propose(new_action("f1")).unwrap();
        db.approve(&a.id, "alice").unwrap();
        let running = db.begin_execution(&a.id).unwrap();
        assert_eq!(running.status, ActionStatus::Executing);
        assert!(running.executed_at.is_some());

        let done = db
            .complete(&a.id, serde_json::json!({ "restarted": true }))
            .unwrap();
        assert_eq!(done.status, ActionStatus::Completed);
        done.validate().unwrap();

        let err = db.begin_execution(&a.id).unwrap_err();
        assert!(matches!(err, InsightError::InvalidTransition { .. }));
    }

    #[test]
    fn begin_execution_requires_approval() {
        let (_dir, db) = open_tmp();
        let a = db.propose(new_action("f1")).unwrap();
        let err = db.begin_execution(&a.id).unwrap_err();
        assert!(matches!(err, InsightError::InvalidTransition { .. }));
    }

    #[test]
    fn list_filters_and_orders_newest_first() {
        let (_dir, db) = open_tmp();
        let first = db.propose(new_action("f1")).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = db.propose(new_action("f2")).unwrap();
        db.approve(&second.id, "alice").unwrap();

        let all = db.list_actions(&ActionFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);

        let proposed = db
            .list_actions(&ActionFilter {
                status: Some(ActionStatus::Proposed),
                finding_id: None,
            })
            .unwrap();
        assert_eq!(proposed.len(), 1);
        assert_eq!(proposed[0].id, first.id);

        let for_f2 = db
            .list_actions(&ActionFilter {
                status: None,
                finding_id: Some("f2".to_string()),
            })
            .unwrap();
        assert_eq!(for_f2.len(), 1);
    }

    #[test]
    fn recover_stale_fails_old_executing_actions() {
        let (_dir, db) = open_tmp();
        let a = db.propose(new_action("f1")).unwrap();
        db.approve(&a.id, "alice").unwrap();
        db.begin_execution(&a.id).unwrap();

        // Fresh execution is left alone.
        assert_eq!(db.recover_stale(Duration::from_secs(600)).unwrap(), 0);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(db.recover_stale(Duration::from_millis(10)).unwrap(), 1);

        let recovered = db.get_action(&a.id).unwrap();
        assert_eq!(recovered.status, ActionStatus::Failed);
        assert_eq!(recovered.error_message.as_deref(), Some(RECOVERED_MESSAGE));
        recovered.validate().unwrap();
    }

    #[test]
    fn recover_stale_on_empty_db_returns_zero() {
        let (_dir, db) = open_tmp();
        assert_eq!(db.recover_stale(Duration::from_secs(1)).unwrap(), 0);
    }

    #[test]
    fn import_deduplicates_on_type_and_fingerprint() {
        let (_dir, db) = open_tmp();
        let first = db
            .import_findings(vec![finding_input("OPS", 2), finding_input("WEB", 1)])
            .unwrap();
        assert_eq!(first, ImportSummary { created: 2, updated: 0 });

        let second = db
            .import_findings(vec![finding_input("OPS", 0), finding_input("API", 3)])
            .unwrap();
        assert_eq!(second, ImportSummary { created: 1, updated: 1 });

        let all = db.list_findings().unwrap();
        assert_eq!(all.len(), 3);
        let ops = all.iter().find(|f| f.fingerprint == "OPS").unwrap();
        assert_eq!(ops.severity, 0);
        assert!(ops.updated_at.is_some());
        assert_eq!(db.get_finding(&ops.id).unwrap(), *ops);
    }

    #[test]
    fn import_rejects_invalid_batch_atomically() {
        let (_dir, db) = open_tmp();
        let err = db
            .import_findings(vec![finding_input("OK", 1), finding_input("BAD", 9)])
            .unwrap_err();
        assert!(matches!(err, InsightError::InvalidInput(_)));
        assert!(db.list_findings().unwrap().is_empty());
    }

    #[test]
    fn get_missing_finding_is_not_found() {
        let (_dir, db) = open_tmp();
        let err = db.get_finding("nope").unwrap_err();
        assert!(matches!(err, InsightError::FindingNotFound(_)));
    }
}
