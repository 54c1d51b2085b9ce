use std::sync::Arc;
use std::time::Duration;

use insight_core::config::WorkerConfig;
use insight_core::{ActionStatus, InsightDb, InsightError, NewAction, RemediationAction};
use insight_worker::executors::jira::JiraClient;
use insight_worker::{run_action, run_loop, run_once, Executors, RunSummary};
use tempfile::TempDir;

fn open_db(dir: &TempDir) -> Arc<InsightDb> {
    Arc::new(InsightDb::open(&dir.path().join("insight.db")).unwrap())
}

fn approved(db: &InsightDb, action_type: &str, params: serde_json::Value) -> RemediationAction {
    let a = db
        .propose(NewAction {
            finding_id: "f1".to_string(),
            action_type: action_type.to_string(),
            title: format!("{action_type} test"),
            description: None,
            params,
        })
        .unwrap();
    db.approve(&a.id, "alice").unwrap()
}

async fn jira_executors(server: &mockito::ServerGuard) -> Executors {
    let jira = JiraClient::new(&server.url(), "bot@example.com", "t", Duration::from_secs(5)).unwrap();
    Executors::unconfigured().with_jira(jira)
}

#[tokio::test]
async fn approved_jira_action_completes_with_report() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/rest/api/3/issue/OPS-7/transitions")
        .with_status(200)
        .with_body(r#"{"transitions":[{"id":"2","name":"Closed"}]}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/rest/api/3/issue/OPS-7/transitions")
        .with_status(204)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let action = approved(&db, "close_jira_tickets", serde_json::json!({ "issue_keys": ["OPS-7"] }));
    let untouched = db
        .propose(NewAction {
            finding_id: "f2".to_string(),
            action_type: "close_jira_tickets".to_string(),
            title: "still proposed".to_string(),
            description: None,
            params: serde_json::json!({ "issue_keys": ["OPS-8"] }),
        })
        .unwrap();

    let summary = run_once(&db, &jira_executors(&server).await).await.unwrap();
    assert_eq!(summary, RunSummary { executed: 1, failed: 0 });

    let done = db.get_action(&action.id).unwrap();
    assert_eq!(done.status, ActionStatus::Completed);
    assert_eq!(done.result.as_ref().unwrap()["succeeded"], 1);
    assert!(done.error_message.is_none());
    assert!(done.executed_at.is_some());
    assert!(done.completed_at.is_some());
    done.validate().unwrap();

    assert_eq!(db.get_action(&untouched.id).unwrap(), untouched);
}

#[tokio::test]
async fn unknown_action_type_fails_the_action() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let action = approved(&db, "reboot_cluster", serde_json::json!({}));

    let summary = run_once(&db, &Executors::unconfigured()).await.unwrap();
    assert_eq!(summary, RunSummary { executed: 0, failed: 1 });

    let failed = db.get_action(&action.id).unwrap();
    assert_eq!(failed.status, ActionStatus::Failed);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("unknown action type: reboot_cluster")
    );
    assert!(failed.result.is_none());
}

#[tokio::test]
async fn malformed_params_fail_before_touching_the_cluster() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let action = approved(&db, "scale_deployment", serde_json::json!({ "deployment": "web" }));

    let done = run_action(&db, &Executors::unconfigured(), &action.id)
        .await
        .unwrap();
    assert_eq!(done.status, ActionStatus::Failed);
    assert!(done
        .error_message
        .unwrap()
        .starts_with("invalid params for scale_deployment"));
}

#[tokio::test]
async fn run_action_requires_approved() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let proposed = db
        .propose(NewAction {
            finding_id: "f1".to_string(),
            action_type: "restart_pods".to_string(),
            title: "t".to_string(),
            description: None,
            params: serde_json::json!({ "pods": [] }),
        })
        .unwrap();

    let err = run_action(&db, &Executors::unconfigured(), &proposed.id)
        .await
        .unwrap_err();
    assert!(matches!(err, InsightError::InvalidTransition { .. }));
    assert_eq!(db.get_action(&proposed.id).unwrap(), proposed);
}

#[tokio::test]
async fn loop_recovers_stale_then_drains_and_stops() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);

    let stuck = approved(&db, "restart_pods", serde_json::json!({ "pods": [] }));
    db.begin_execution(&stuck.id).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let pending = approved(&db, "reboot_cluster", serde_json::json!({}));

    let cfg = WorkerConfig {
        poll_interval_secs: 60,
        stale_after_minutes: 0,
    };
    run_loop(
        Arc::clone(&db),
        Executors::unconfigured(),
        cfg,
        tokio::time::sleep(Duration::from_millis(300)),
    )
    .await
    .unwrap();

    let stuck = db.get_action(&stuck.id).unwrap();
    assert_eq!(stuck.status, ActionStatus::Failed);
    assert_eq!(
        stuck.error_message.as_deref(),
        Some(insight_core::db::RECOVERED_MESSAGE)
    );
    assert_eq!(db.get_action(&pending.id).unwrap().status, ActionStatus::Failed);
}
